//! Callbridge Library Crate
//!
//! This library contains all the core logic for bridging an outbound SIP call
//! into an OpenAI realtime streaming session: the webhook receipt point, the
//! call-accept authorization request, the handoff orchestration, and the
//! long-lived WebSocket session. The `bridge` binary is a thin wrapper around
//! this library.

pub mod audio;
pub mod authorize;
pub mod config;
pub mod orchestrator;
pub mod router;
pub mod sip;
pub mod state;
pub mod stream;
pub mod webhook;
