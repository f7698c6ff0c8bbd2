//! Manages the lifetime of one realtime WebSocket session.
//!
//! A session moves through `Connecting -> Open -> Closing -> Closed`, with
//! `Connecting -> Closed` on handshake failure and `Open -> Closed` on
//! transport error. `Closed` is terminal; there is no retry at this layer —
//! a call that loses its session cannot be re-accepted from here.

use crate::stream::protocol::{ClientFrame, ServerFrame};
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{client::IntoClientRequest, handshake::client::Request, protocol::Message},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Lifecycle state of a stream session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Receives every complete logical frame the session reads. The baseline
/// handler logs; tests and future event dispatch plug in here.
pub trait FrameHandler: Send + Sync {
    fn on_frame(&self, call_id: &str, frame: &ServerFrame, raw: &str);
}

/// Baseline policy: structured logging per frame kind.
pub struct LogFrames;

impl FrameHandler for LogFrames {
    fn on_frame(&self, call_id: &str, frame: &ServerFrame, raw: &str) {
        match frame {
            ServerFrame::ResponseDone => info!(%call_id, "response completed"),
            ServerFrame::Error { error } => {
                warn!(%call_id, code = ?error.code, message = %error.message, "realtime error frame")
            }
            ServerFrame::Other => debug!(%call_id, %raw, "realtime event"),
        }
    }
}

/// One streaming session for one accepted call.
pub struct StreamSession {
    call_id: String,
    state: SessionState,
    cancel: CancellationToken,
    handler: Arc<dyn FrameHandler>,
}

impl StreamSession {
    pub fn new(
        call_id: String,
        cancel: CancellationToken,
        handler: Arc<dyn FrameHandler>,
    ) -> Self {
        Self {
            call_id,
            state: SessionState::Connecting,
            cancel,
            handler,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn handshake_request(&self, streaming_base: &str, api_key: &str) -> Result<Request> {
        let url = format!(
            "{}/v1/realtime?call_id={}",
            streaming_base.trim_end_matches('/'),
            self.call_id
        );
        let mut request = url.into_client_request()?;
        request
            .headers_mut()
            .insert("Authorization", format!("Bearer {}", api_key).parse()?);
        Ok(request)
    }

    /// Runs the session to completion and returns the terminal state, which
    /// is always `Closed`. The connection handle is dropped on every exit
    /// path; teardown failures are logged and swallowed.
    #[instrument(name = "stream_session", skip_all, fields(call_id = %self.call_id))]
    pub async fn run(
        mut self,
        streaming_base: &str,
        api_key: &str,
        instructions: &str,
    ) -> SessionState {
        let ws = match self.connect(streaming_base, api_key).await {
            Some(ws) => ws,
            None => {
                self.state = SessionState::Closed;
                return self.state;
            }
        };

        self.state = SessionState::Open;
        info!("stream session open");
        let (mut ws_tx, mut ws_rx) = ws.split();

        // Entry action for Open: exactly one initial instruction. A send
        // failure is logged only; the remote may still be reachable for
        // further frames.
        match serde_json::to_string(&ClientFrame::initial_instruction(instructions)) {
            Ok(text) => {
                if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                    warn!(error = ?e, "failed to send initial instruction");
                }
            }
            Err(e) => warn!(error = ?e, "failed to encode initial instruction"),
        }

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.state = SessionState::Closing;
                    info!("cancellation received, closing stream session");
                    if let Err(e) = ws_tx.send(Message::Close(None)).await {
                        debug!(error = ?e, "best-effort close failed");
                    }
                    break;
                }
                msg = ws_rx.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.dispatch(&text),
                    Some(Ok(Message::Binary(payload))) => {
                        debug!(bytes = payload.len(), "opaque binary payload");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        self.state = SessionState::Closing;
                        match frame {
                            Some(f) => info!(code = %f.code, reason = %f.reason, "remote closed stream"),
                            None => info!("remote closed stream without close frame"),
                        }
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(error = ?e, "stream transport error");
                        break;
                    }
                    None => {
                        info!("stream ended");
                        break;
                    }
                }
            }
        }

        self.state = SessionState::Closed;
        info!("stream session closed");
        self.state
    }

    /// Performs the WebSocket handshake, honoring cancellation while the
    /// connect is in flight. Returns `None` when the session should go
    /// straight to `Closed`.
    async fn connect(
        &mut self,
        streaming_base: &str,
        api_key: &str,
    ) -> Option<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>> {
        let request = match self
            .handshake_request(streaming_base, api_key)
            .context("Failed to build realtime handshake request")
        {
            Ok(request) => request,
            Err(e) => {
                error!(error = ?e, "stream connect failed");
                return None;
            }
        };

        tokio::select! {
            _ = self.cancel.cancelled() => {
                info!("cancelled before stream connect completed");
                None
            }
            connected = connect_async(request) => match connected {
                Ok((ws, _)) => Some(ws),
                Err(e) => {
                    error!(error = ?e, "stream connect failed");
                    None
                }
            }
        }
    }

    fn dispatch(&self, raw: &str) {
        match serde_json::from_str::<ServerFrame>(raw) {
            Ok(frame) => self.handler.on_frame(&self.call_id, &frame, raw),
            Err(e) => warn!(error = ?e, %raw, "unparseable frame from realtime endpoint"),
        }
    }
}
