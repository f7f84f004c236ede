//! Per-client upload rate limiting.
//!
//! The allowance is counted against the metadata store; the in-memory
//! last-attempt map is an explicitly owned cache behind a single mutex,
//! fully decoupled from the bridge/upload/download core.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::MetadataError;
use crate::metadata::{Clock, MetadataStore};

/// Hourly upload allowance per client address
pub struct RateLimiter {
    store: Arc<dyn MetadataStore>,
    clock: Arc<dyn Clock>,
    max_per_hour: u32,
    last_attempts: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl RateLimiter {
    /// Create a limiter counting against the given store
    pub fn new(store: Arc<dyn MetadataStore>, clock: Arc<dyn Clock>, max_per_hour: u32) -> Self {
        Self {
            store,
            clock,
            max_per_hour,
            last_attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Whether an upload from this client is currently allowed.
    ///
    /// A missing client address is allowed through: the boundary layer is
    /// expected to always supply one.
    pub async fn is_allowed(&self, client_addr: &str) -> Result<bool, MetadataError> {
        if client_addr.is_empty() {
            warn!("no client address provided for rate limiting");
            return Ok(true);
        }
        let recent = self.recent_uploads(client_addr).await?;
        let allowed = recent < self.max_per_hour as u64;
        if !allowed {
            warn!(
                client_addr,
                recent, "rate limit exceeded ({} uploads in the last hour)", recent
            );
        }
        Ok(allowed)
    }

    /// Uploads left in the current hour window
    pub async fn remaining(&self, client_addr: &str) -> Result<u32, MetadataError> {
        if client_addr.is_empty() {
            return Ok(self.max_per_hour);
        }
        let recent = self.recent_uploads(client_addr).await?;
        Ok((self.max_per_hour as u64).saturating_sub(recent) as u32)
    }

    /// Note an upload attempt in the local cache
    pub fn record_attempt(&self, client_addr: &str) {
        if !client_addr.is_empty() {
            self.last_attempts
                .lock()
                .insert(client_addr.to_string(), self.clock.now());
        }
    }

    /// Drop cache entries older than one hour
    pub fn purge_stale(&self) {
        let cutoff = self.clock.now() - Duration::hours(1);
        let mut attempts = self.last_attempts.lock();
        let before = attempts.len();
        attempts.retain(|_, at| *at >= cutoff);
        debug!(purged = before - attempts.len(), "rate limit cache purged");
    }

    /// Entries currently in the local cache
    pub fn cached_clients(&self) -> usize {
        self.last_attempts.lock().len()
    }

    async fn recent_uploads(&self, client_addr: &str) -> Result<u64, MetadataError> {
        let one_hour_ago = self.clock.now() - Duration::hours(1);
        self.store
            .count_recent_by_client(client_addr, one_hour_ago)
            .await
    }
}
