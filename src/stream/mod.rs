//! Realtime Stream Session Management
//!
//! One accepted call gets exactly one long-lived WebSocket session. The
//! module is split for clarity:
//!
//! - `protocol`: the JSON frame shapes exchanged with the realtime endpoint.
//! - `session`: the session state machine, from handshake to teardown.

pub mod protocol;
pub mod session;

pub use session::{FrameHandler, LogFrames, SessionState, StreamSession};
