//! Async-to-blocking call adapter over the remote transport.
//!
//! Every remote operation in the system is one [`RemoteBridge::call`] with
//! its own timeout. The bridge keeps the only state shared across
//! concurrent calls: a correlation table from call token to a
//! single-resolution signal. A pending entry is resolved exactly once, by
//! the response callback or by the timeout, whichever clears the entry
//! first; the loser finds the entry gone and is discarded silently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::config::CallTimeouts;
use crate::error::BridgeError;
use crate::transport::{RemoteOutcome, RemoteRequest, RemoteResponse, RemoteTransport};
use crate::types::{CallToken, TokenMint};

type PendingTable = Mutex<HashMap<CallToken, oneshot::Sender<RemoteOutcome>>>;

/// Turns the backend's callback API into bounded calls
pub struct RemoteBridge {
    transport: Arc<dyn RemoteTransport>,
    pending: Arc<PendingTable>,
    tokens: TokenMint,
    timeouts: CallTimeouts,
}

impl RemoteBridge {
    /// Create a bridge over a transport with the given timeouts
    pub fn new<T: RemoteTransport>(transport: T, timeouts: CallTimeouts) -> Self {
        Self::from_arc(Arc::new(transport), timeouts)
    }

    /// Create a bridge over a shared transport
    pub fn from_arc(transport: Arc<dyn RemoteTransport>, timeouts: CallTimeouts) -> Self {
        Self {
            transport,
            pending: Arc::new(Mutex::new(HashMap::new())),
            tokens: TokenMint::default(),
            timeouts,
        }
    }

    /// The underlying transport (staged reads go straight to it)
    pub fn transport(&self) -> &Arc<dyn RemoteTransport> {
        &self.transport
    }

    /// Configured per-operation timeouts
    pub fn timeouts(&self) -> &CallTimeouts {
        &self.timeouts
    }

    /// Number of calls currently awaiting resolution
    pub fn pending_calls(&self) -> usize {
        self.pending.lock().len()
    }

    /// Issue one remote call and wait for its resolution.
    ///
    /// The correlation entry is registered before dispatch, so a response
    /// arriving before this method starts waiting still finds its entry.
    /// On timeout the entry is removed and a late callback becomes a
    /// no-op; tokens are never reused, so a stale response cannot leak
    /// into a later call.
    pub async fn call(
        &self,
        request: RemoteRequest,
        timeout: Duration,
    ) -> Result<RemoteResponse, BridgeError> {
        let token = self.tokens.next();
        let kind = request.kind();
        let (tx, rx) = oneshot::channel();

        self.pending.lock().insert(token, tx);
        trace!(%token, kind, "dispatching remote call");

        let pending = Arc::clone(&self.pending);
        self.transport.dispatch(
            token,
            request,
            Box::new(move |outcome| {
                // Remove-then-send: whoever clears the entry delivers the
                // one and only resolution for this call.
                match pending.lock().remove(&token) {
                    Some(tx) => {
                        let _ = tx.send(outcome);
                    }
                    None => trace!(%token, "late response discarded"),
                }
            }),
        );

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(response))) => {
                trace!(%token, kind, "remote call resolved");
                Ok(response)
            }
            Ok(Ok(Err(fault))) => {
                debug!(%token, kind, %fault, "remote call failed");
                Err(BridgeError::remote(fault.to_string()))
            }
            Ok(Err(_recv)) => {
                // The transport destroyed the callback without invoking it.
                self.pending.lock().remove(&token);
                warn!(%token, kind, "transport dropped the call without responding");
                Err(BridgeError::remote("transport dropped the call without responding"))
            }
            Err(_elapsed) => {
                self.pending.lock().remove(&token);
                debug!(%token, kind, ?timeout, "remote call timed out");
                Err(BridgeError::timeout(timeout))
            }
        }
    }

    /// Probe backend auth readiness. Errors and timeouts read as not ready.
    pub async fn is_ready(&self) -> bool {
        match self
            .call(RemoteRequest::ProbeAuth, self.timeouts.auth_probe)
            .await
        {
            Ok(RemoteResponse::AuthState { ready }) => ready,
            Ok(_) => false,
            Err(e) => {
                warn!("auth probe failed: {e}");
                false
            }
        }
    }
}
