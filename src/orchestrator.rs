//! Call-to-stream handoff orchestration.
//!
//! The orchestrator joins two independent flows — the locally placed call
//! and the remotely delivered call-ready notification — and enforces the one
//! invariant everything else leans on: per call identifier, at most one
//! authorization attempt and at most one stream session, with the session
//! started only after authorization succeeds. Session tasks are retained and
//! joined at shutdown rather than detached.

use crate::authorize::Authorizer;
use crate::config::Config;
use crate::stream::{LogFrames, StreamSession};
use crate::webhook::CallReadyNotification;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Seam for starting a stream session task. The production launcher spawns
/// [`StreamSession::run`]; tests substitute a recorder.
pub trait StreamLauncher: Send + Sync {
    fn launch(&self, call_id: &str, cancel: CancellationToken) -> JoinHandle<()>;
}

/// Launches real realtime sessions with the baseline logging frame handler.
pub struct RealtimeStreamLauncher {
    config: Arc<Config>,
}

impl RealtimeStreamLauncher {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

impl StreamLauncher for RealtimeStreamLauncher {
    fn launch(&self, call_id: &str, cancel: CancellationToken) -> JoinHandle<()> {
        let config = self.config.clone();
        let session = StreamSession::new(call_id.to_string(), cancel, Arc::new(LogFrames));
        tokio::spawn(async move {
            session
                .run(
                    &config.streaming_base,
                    &config.api_key,
                    &config.instructions,
                )
                .await;
        })
    }
}

/// Sequencing and idempotency for the call-to-stream handoff.
pub struct Orchestrator {
    authorizer: Arc<dyn Authorizer>,
    launcher: Arc<dyn StreamLauncher>,
    /// Call identifiers already handled. Check-and-insert happens under one
    /// lock acquisition, before any I/O for that call.
    guard: Mutex<HashSet<String>>,
    sessions: Mutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        authorizer: Arc<dyn Authorizer>,
        launcher: Arc<dyn StreamLauncher>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            authorizer,
            launcher,
            guard: Mutex::new(HashSet::new()),
            sessions: Mutex::new(Vec::new()),
            cancel,
        }
    }

    /// Consumes notifications until the channel closes or the process-wide
    /// cancellation fires, then tears down every live session.
    pub async fn run(self: Arc<Self>, mut notifications: mpsc::Receiver<CallReadyNotification>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("orchestrator cancelled");
                    break;
                }
                maybe = notifications.recv() => match maybe {
                    Some(notification) => self.handle_notification(notification).await,
                    None => {
                        info!("notification channel closed");
                        break;
                    }
                }
            }
        }
        self.shutdown().await;
    }

    /// Processes one call-ready notification: guard check, authorization,
    /// and at most one session launch. Safe to call concurrently.
    pub async fn handle_notification(&self, notification: CallReadyNotification) {
        let call_id = notification.call_id;
        if call_id.is_empty() {
            // The webhook boundary rejects these; a second check keeps the
            // invariant local.
            warn!("ignoring notification with empty call_id");
            return;
        }

        if !lock(&self.guard).insert(call_id.clone()) {
            info!(%call_id, "duplicate notification for known call, ignoring");
            return;
        }

        let result = self.authorizer.authorize(&call_id).await;
        if !result.authorized {
            // The guard entry stays: a redelivered notification must not
            // re-authorize a call the control plane already refused.
            warn!(
                %call_id,
                reason = result.failure_reason.as_deref().unwrap_or("unknown"),
                "authorization failed, call will not be bridged"
            );
            return;
        }

        info!(%call_id, "authorization granted, starting stream session");
        let handle = self.launcher.launch(&call_id, self.cancel.child_token());
        lock(&self.sessions).push(handle);
    }

    /// Cancels and joins every retained session task. Session panics are
    /// logged, never propagated.
    async fn shutdown(&self) {
        self.cancel.cancel();
        let handles: Vec<JoinHandle<()>> = lock(&self.sessions).drain(..).collect();
        info!(sessions = handles.len(), "waiting for stream sessions to close");
        for handle in handles {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!(error = ?e, "stream session task panicked");
                }
            }
        }
        info!("orchestrator shut down");
    }

    #[cfg(test)]
    fn guard_contains(&self, call_id: &str) -> bool {
        lock(&self.guard).contains(call_id)
    }

    #[cfg(test)]
    fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
