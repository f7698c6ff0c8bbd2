//! Outbound call placement.
//!
//! The SIP stack itself lives behind the [`SignalingBackend`] trait; this
//! module owns the call attempt lifecycle around it: address validation,
//! attaching the audio transport, the dial timeout, and reporting the
//! outcome. The remote party signals readiness out of band (via the webhook),
//! so the local dial result is never correlated with notification handling.

use crate::audio::AudioTransport;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Transport requested for the signaling leg.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportHint {
    Tls,
    Udp,
}

impl TransportHint {
    fn as_param(self) -> &'static str {
        match self {
            TransportHint::Tls => "tls",
            TransportHint::Udp => "udp",
        }
    }
}

/// Formats the dial target for a given identity and signaling host,
/// e.g. `proj_abc@sip.example.com;transport=tls`.
pub fn sip_target(identity: &str, host: &str, transport: TransportHint) -> String {
    format!("{}@{};transport={}", identity, host, transport.as_param())
}

/// Progress of a single outbound call attempt. Owned and mutated only by the
/// initiator task; dropped when the call ends.
#[derive(Debug)]
pub struct CallAttempt {
    pub remote_address: String,
    pub transport: TransportHint,
    pub status: CallStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallStatus {
    Pending,
    Connected,
    Failed,
}

/// Terminal result of one call attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Connected,
    Failed(String),
}

/// Seam to the actual signaling stack. `dial` resolves once the call is
/// established (or fails), holding the audio transport for the call's
/// duration.
#[async_trait]
pub trait SignalingBackend: Send + Sync {
    async fn dial(
        &self,
        target: &str,
        transport: TransportHint,
        audio: AudioTransport,
    ) -> Result<()>;
}

/// A backend for local runs and tests: reports the call as connected and
/// echoes every PCM frame back until the peer hangs up.
pub struct LoopbackBackend;

#[async_trait]
impl SignalingBackend for LoopbackBackend {
    async fn dial(
        &self,
        target: &str,
        _transport: TransportHint,
        mut audio: AudioTransport,
    ) -> Result<()> {
        info!(%target, "loopback backend answering call");
        tokio::spawn(async move {
            while let Some(frame) = audio.recv().await {
                if audio.send(frame).await.is_err() {
                    break;
                }
            }
        });
        Ok(())
    }
}

/// Places the single outbound call at startup.
pub struct CallInitiator {
    backend: Arc<dyn SignalingBackend>,
    dial_timeout: Duration,
}

impl CallInitiator {
    pub fn new(backend: Arc<dyn SignalingBackend>, dial_timeout: Duration) -> Self {
        Self {
            backend,
            dial_timeout,
        }
    }

    /// Dials `remote_address` with the audio transport attached. Any failure
    /// is terminal for the attempt and reported in the outcome; nothing here
    /// is allowed to abort notification handling.
    #[instrument(name = "place_call", skip(self, audio))]
    pub async fn place_call(
        &self,
        remote_address: &str,
        transport: TransportHint,
        audio: AudioTransport,
    ) -> CallOutcome {
        if let Err(reason) = validate_address(remote_address) {
            warn!(%reason, "rejecting call attempt");
            return CallOutcome::Failed(reason);
        }

        let mut attempt = CallAttempt {
            remote_address: remote_address.to_string(),
            transport,
            status: CallStatus::Pending,
        };
        info!("placing outbound call");

        match tokio::time::timeout(
            self.dial_timeout,
            self.backend.dial(remote_address, transport, audio),
        )
        .await
        {
            Ok(Ok(())) => {
                attempt.status = CallStatus::Connected;
                info!("call connected");
                CallOutcome::Connected
            }
            Ok(Err(e)) => {
                attempt.status = CallStatus::Failed;
                warn!(error = ?e, "call failed");
                CallOutcome::Failed(e.to_string())
            }
            Err(_) => {
                attempt.status = CallStatus::Failed;
                let reason = format!("dial timed out after {:?}", self.dial_timeout);
                warn!(%reason);
                CallOutcome::Failed(reason)
            }
        }
    }
}

fn validate_address(addr: &str) -> Result<(), String> {
    if addr.is_empty() {
        return Err("remote address is empty".to_string());
    }
    if addr.chars().any(char::is_whitespace) {
        return Err("remote address contains whitespace".to_string());
    }
    Ok(())
}
