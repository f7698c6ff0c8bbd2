//! Defines the JSON frame shapes exchanged with the realtime endpoint.

use serde::{Deserialize, Serialize};

/// Frames sent by the bridge. Only the initial instruction is sent today.
#[derive(Serialize, Debug)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "response.create")]
    ResponseCreate { response: ResponseSpec },
}

#[derive(Serialize, Debug)]
pub struct ResponseSpec {
    pub instructions: String,
}

impl ClientFrame {
    /// The single instruction frame sent on entering `Open`.
    pub fn initial_instruction(instructions: &str) -> Self {
        ClientFrame::ResponseCreate {
            response: ResponseSpec {
                instructions: instructions.to_string(),
            },
        }
    }
}

/// Frames received from the realtime endpoint. The baseline policy only
/// distinguishes the events worth logging differently; everything else falls
/// through to `Other`.
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "response.done")]
    ResponseDone,
    #[serde(rename = "error")]
    Error { error: ErrorDetail },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}
