//! Call authorization against the control plane.
//!
//! A ringing call must be accepted before it can be bridged into a streaming
//! session. Acceptance is one bounded HTTP round trip; any failure is
//! terminal for that call — the orchestrator never retries, and the
//! idempotency guard keeps a redelivered notification from re-authorizing.

use crate::config::Config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Outcome of one authorization attempt. Failure is data, not an error:
/// the orchestrator consumes it to decide whether a session starts.
#[derive(Debug, Clone)]
pub struct AuthorizationResult {
    pub call_id: String,
    pub authorized: bool,
    pub failure_reason: Option<String>,
}

impl AuthorizationResult {
    fn granted(call_id: &str) -> Self {
        Self {
            call_id: call_id.to_string(),
            authorized: true,
            failure_reason: None,
        }
    }

    fn denied(call_id: &str, reason: String) -> Self {
        Self {
            call_id: call_id.to_string(),
            authorized: false,
            failure_reason: Some(reason),
        }
    }
}

/// Seam between the orchestrator and the control plane.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, call_id: &str) -> AuthorizationResult;
}

/// Body of the accept request.
#[derive(Serialize)]
struct AcceptRequest<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    instructions: &'a str,
    model: &'a str,
}

/// Production authorizer: `POST {base}/v1/realtime/calls/{call_id}/accept`
/// with a bearer credential and a bounded timeout.
pub struct RealtimeAuthorizer {
    http: reqwest::Client,
    base: String,
    api_key: String,
    instructions: String,
    model: String,
}

impl RealtimeAuthorizer {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.accept_timeout)
            .build()
            .context("Failed to build HTTP client for authorizer")?;
        Ok(Self {
            http,
            base: config.control_plane_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            instructions: config.instructions.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Authorizer for RealtimeAuthorizer {
    #[instrument(name = "authorize_call", skip(self))]
    async fn authorize(&self, call_id: &str) -> AuthorizationResult {
        let url = format!("{}/v1/realtime/calls/{}/accept", self.base, call_id);
        let body = AcceptRequest {
            kind: "realtime",
            instructions: &self.instructions,
            model: &self.model,
        };

        match self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                info!("call accepted by control plane");
                AuthorizationResult::granted(call_id)
            }
            Ok(resp) => {
                let reason = format!("control plane returned {}", resp.status());
                warn!(%reason);
                AuthorizationResult::denied(call_id, reason)
            }
            Err(e) if e.is_timeout() => {
                let reason = "accept request timed out".to_string();
                warn!(%reason);
                AuthorizationResult::denied(call_id, reason)
            }
            Err(e) => {
                let reason = format!("accept request failed: {}", e);
                warn!(%reason);
                AuthorizationResult::denied(call_id, reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Path, State},
        http::StatusCode,
        routing::post,
    };
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone)]
    struct Recorded {
        calls: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
        status: StatusCode,
    }

    async fn accept_handler(
        State(recorded): State<Recorded>,
        Path(call_id): Path<String>,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        recorded.calls.lock().unwrap().push((call_id, body));
        recorded.status
    }

    /// Runs a one-route control-plane stand-in, returning its address and
    /// the record of accept requests it saw.
    async fn spawn_control_plane(
        status: StatusCode,
    ) -> (SocketAddr, Arc<Mutex<Vec<(String, serde_json::Value)>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = Recorded {
            calls: calls.clone(),
            status,
        };
        let app = Router::new()
            .route("/v1/realtime/calls/{call_id}/accept", post(accept_handler))
            .with_state(recorded);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, calls)
    }

    fn authorizer_for(addr: SocketAddr) -> RealtimeAuthorizer {
        let config = Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            api_key: "test-key".to_string(),
            project_id: "proj_test".to_string(),
            control_plane_base: format!("http://{}", addr),
            streaming_base: "ws://127.0.0.1:1".to_string(),
            sip_domain: "sip.example.com".to_string(),
            instructions: "Say Hi.".to_string(),
            model: "gpt-realtime".to_string(),
            accept_timeout: Duration::from_secs(2),
            dial_timeout: Duration::from_secs(2),
            log_level: tracing::Level::INFO,
        };
        RealtimeAuthorizer::new(&config).unwrap()
    }

    #[tokio::test]
    async fn successful_accept_grants_authorization() {
        let (addr, calls) = spawn_control_plane(StatusCode::OK).await;
        let authorizer = authorizer_for(addr);

        let result = authorizer.authorize("call_123").await;

        assert!(result.authorized);
        assert_eq!(result.call_id, "call_123");
        assert!(result.failure_reason.is_none());

        let seen = calls.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "call_123");
        assert_eq!(seen[0].1["type"], "realtime");
        assert_eq!(seen[0].1["instructions"], "Say Hi.");
        assert_eq!(seen[0].1["model"], "gpt-realtime");
    }

    #[tokio::test]
    async fn forbidden_accept_denies_authorization() {
        let (addr, _calls) = spawn_control_plane(StatusCode::FORBIDDEN).await;
        let authorizer = authorizer_for(addr);

        let result = authorizer.authorize("call_abc").await;

        assert!(!result.authorized);
        assert!(result.failure_reason.unwrap().contains("403"));
    }

    #[tokio::test]
    async fn unreachable_control_plane_denies_authorization() {
        // Bind then drop a listener so the port refuses connections.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let authorizer = authorizer_for(addr);
        let result = authorizer.authorize("call_abc").await;

        assert!(!result.authorized);
        assert!(result.failure_reason.is_some());
    }
}
