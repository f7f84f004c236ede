use std::time::Duration;

/// Configuration for transfer operations
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Uploads larger than this go through the chunked path
    pub chunk_threshold_bytes: u64,

    /// Exact size of every chunk except the final one
    pub part_size_bytes: u64,

    /// Maximum successful download issuances per file
    pub max_download_count: u32,

    /// How long an uploaded file stays available
    pub retention_days: i64,

    /// How long Deleted/Failed rows linger before being purged
    pub purge_after_days: i64,

    /// Maximum uploads per client address per hour
    pub max_uploads_per_hour: u32,

    /// Per-operation remote call timeouts
    pub timeouts: CallTimeouts,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_threshold_bytes: 10 * 1024 * 1024, // 10 MiB
            part_size_bytes: 512 * 1024,             // 512 KiB
            max_download_count: 50,
            retention_days: 7,
            purge_after_days: 30,
            max_uploads_per_hour: 5,
            timeouts: CallTimeouts::default(),
        }
    }
}

impl TransferConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the chunked-upload threshold
    pub fn with_chunk_threshold(mut self, bytes: u64) -> Self {
        self.chunk_threshold_bytes = bytes;
        self
    }

    /// Set the chunk part size
    pub fn with_part_size(mut self, bytes: u64) -> Self {
        self.part_size_bytes = bytes;
        self
    }

    /// Set the per-file download cap
    pub fn with_max_download_count(mut self, count: u32) -> Self {
        self.max_download_count = count;
        self
    }

    /// Set the retention window in days
    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention_days = days;
        self
    }

    /// Set the per-client hourly upload allowance
    pub fn with_max_uploads_per_hour(mut self, count: u32) -> Self {
        self.max_uploads_per_hour = count;
        self
    }

    /// Set custom call timeouts
    pub fn with_timeouts(mut self, timeouts: CallTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

/// Per-operation timeouts for bridged remote calls.
///
/// These are policy constants, not structural: every remote operation has
/// exactly one timeout, shipped with these defaults and overridable here.
#[derive(Debug, Clone)]
pub struct CallTimeouts {
    /// Single chunk send
    pub chunk: Duration,
    /// Small single-shot document send
    pub document: Duration,
    /// Large-file finalize
    pub finalize: Duration,
    /// Message lookup by handle
    pub lookup: Duration,
    /// Content fetch (download staging)
    pub fetch: Duration,
    /// Remote delete
    pub delete: Duration,
    /// Auth readiness probe
    pub auth_probe: Duration,
}

impl Default for CallTimeouts {
    fn default() -> Self {
        Self {
            chunk: Duration::from_secs(30),
            document: Duration::from_secs(60),
            finalize: Duration::from_secs(90),
            lookup: Duration::from_secs(30),
            fetch: Duration::from_secs(90),
            delete: Duration::from_secs(30),
            auth_probe: Duration::from_secs(5),
        }
    }
}

impl CallTimeouts {
    /// Create timeouts with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the chunk send timeout
    pub fn with_chunk(mut self, timeout: Duration) -> Self {
        self.chunk = timeout;
        self
    }

    /// Set the single-shot document timeout
    pub fn with_document(mut self, timeout: Duration) -> Self {
        self.document = timeout;
        self
    }

    /// Set the finalize timeout
    pub fn with_finalize(mut self, timeout: Duration) -> Self {
        self.finalize = timeout;
        self
    }

    /// Set the lookup timeout
    pub fn with_lookup(mut self, timeout: Duration) -> Self {
        self.lookup = timeout;
        self
    }

    /// Set the content fetch timeout
    pub fn with_fetch(mut self, timeout: Duration) -> Self {
        self.fetch = timeout;
        self
    }

    /// Set the delete timeout
    pub fn with_delete(mut self, timeout: Duration) -> Self {
        self.delete = timeout;
        self
    }

    /// Set the auth probe timeout
    pub fn with_auth_probe(mut self, timeout: Duration) -> Self {
        self.auth_probe = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_policy() {
        let config = TransferConfig::default();
        assert_eq!(config.chunk_threshold_bytes, 10 * 1024 * 1024);
        assert_eq!(config.part_size_bytes, 512 * 1024);
        assert_eq!(config.max_download_count, 50);
        assert_eq!(config.timeouts.chunk, Duration::from_secs(30));
        assert_eq!(config.timeouts.document, Duration::from_secs(60));
        assert_eq!(config.timeouts.finalize, Duration::from_secs(90));
        assert_eq!(config.timeouts.auth_probe, Duration::from_secs(5));
    }

    #[test]
    fn builders_override_defaults() {
        let config = TransferConfig::new()
            .with_chunk_threshold(1024)
            .with_part_size(256)
            .with_timeouts(CallTimeouts::new().with_chunk(Duration::from_millis(50)));
        assert_eq!(config.chunk_threshold_bytes, 1024);
        assert_eq!(config.part_size_bytes, 256);
        assert_eq!(config.timeouts.chunk, Duration::from_millis(50));
    }
}
