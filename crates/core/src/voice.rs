use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::fmt;

/// Settings sent to the voice channel when it is opened.
#[derive(Debug, Clone, Default)]
pub struct ChannelConfig {
    pub instructions: String,
    /// Sample rate of the PCM16 frames passed to `send_audio`.
    pub input_sample_rate: u32,
}

/// Events any voice channel implementation reports back to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Opened,
    /// A fragment of the player's speech, in arrival order.
    Transcription(String),
    /// The current turn is over; fragments received so far form one answer.
    TurnComplete,
    Speaking,
    SpeakingDone,
    Error(String),
    PermissionDenied,
    Closed,
}

/// Status signal rendered by the UI while a session is connecting or broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Error,
    Closed,
    PermissionDenied,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
            ConnectionState::Closed => "closed",
            ConnectionState::PermissionDenied => "permission_denied",
        };
        f.write_str(s)
    }
}

/// A real-time speech-to-text service boundary.
///
/// The session only pushes audio frames in and reads events out; connection
/// details stay inside the implementation.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VoiceChannel: Send + Sync {
    /// Connects (if needed) and configures the channel. `Opened` follows on
    /// the event stream once the service is ready.
    async fn open(&mut self, config: ChannelConfig) -> Result<()>;

    /// Forwards one frame of 16-bit mono PCM.
    async fn send_audio(&mut self, pcm: Vec<i16>) -> Result<()>;

    /// Hands out the event receiver. Can only be taken once.
    async fn events(&mut self) -> Result<tokio::sync::mpsc::Receiver<ChannelEvent>>;

    /// Tears the channel down. Must be safe to call more than once.
    fn close(&mut self);
}

/// Joins transcription fragments until the turn completes.
#[derive(Debug, Default)]
pub struct TranscriptAssembler {
    pending: String,
}

impl TranscriptAssembler {
    pub fn push(&mut self, fragment: &str) {
        self.pending.push_str(fragment);
    }

    /// Returns the trimmed transcript for the finished turn, or `None` when
    /// nothing was said.
    pub fn finish_turn(&mut self) -> Option<String> {
        let text = self.pending.trim().to_string();
        self.pending.clear();
        if text.is_empty() { None } else { Some(text) }
    }
}
