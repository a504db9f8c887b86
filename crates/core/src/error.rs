use crate::voice::ConnectionState;

/// Errors surfaced by the round controller and the session driver.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("deck has {available} usable item(s); a round needs at least two")]
    InsufficientItems { available: usize },
    #[error("invalid deck: {0}")]
    InvalidDeck(String),
    #[error("voice channel unavailable ({state}): {reason}")]
    ChannelUnavailable {
        state: ConnectionState,
        reason: String,
    },
}

impl GameError {
    pub fn channel(state: ConnectionState, reason: impl Into<String>) -> Self {
        Self::ChannelUnavailable {
            state,
            reason: reason.into(),
        }
    }
}
