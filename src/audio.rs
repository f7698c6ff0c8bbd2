//! Abstract duplex PCM audio channel.
//!
//! The bridge never touches real capture/render devices; it only moves raw
//! PCM16 frames between a local endpoint and the signaling backend's media
//! session. Both sides of the bridge hold one end of a [`AudioTransport`]
//! pair.

use bytes::Bytes;
use tokio::sync::mpsc;

/// Sample encoding supported by the media layer. PCM16 only; codec
/// negotiation happens below this layer and is not modeled here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    Pcm16,
}

/// Capability descriptor the Call Initiator hands to the signaling backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioCapabilities {
    pub format: SampleFormat,
    pub sample_rate_hz: u32,
    pub channels: u16,
}

impl Default for AudioCapabilities {
    fn default() -> Self {
        Self {
            format: SampleFormat::Pcm16,
            sample_rate_hz: 8_000,
            channels: 1,
        }
    }
}

/// One end of a bidirectional PCM frame channel.
pub struct AudioTransport {
    caps: AudioCapabilities,
    tx: mpsc::Sender<Bytes>,
    rx: mpsc::Receiver<Bytes>,
}

impl AudioTransport {
    /// Creates two cross-wired ends: frames sent on one end arrive at the
    /// other.
    pub fn pair(caps: AudioCapabilities) -> (AudioTransport, AudioTransport) {
        let (a_tx, a_rx) = mpsc::channel(64);
        let (b_tx, b_rx) = mpsc::channel(64);
        (
            AudioTransport {
                caps,
                tx: a_tx,
                rx: b_rx,
            },
            AudioTransport {
                caps,
                tx: b_tx,
                rx: a_rx,
            },
        )
    }

    pub fn capabilities(&self) -> AudioCapabilities {
        self.caps
    }

    /// Sends one PCM frame to the peer. Fails only when the peer end has
    /// been dropped.
    pub async fn send(&self, frame: Bytes) -> anyhow::Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| anyhow::anyhow!("audio peer closed"))
    }

    /// Receives the next PCM frame, or `None` once the peer end is dropped.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}
