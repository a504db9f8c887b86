pub mod deck;
pub mod error;
pub mod matching;
pub mod phrases;
pub mod round;
pub mod session;
pub mod speech;
pub mod voice;

pub use error::GameError;

use round::{RoundState, Verdict};
use session::SessionStatus;
use voice::ConnectionState;

/// Represents commands that the session issues to whatever renders the game.
///
/// Rounds are sent as snapshots; the renderer never gets a handle on the
/// controller's own state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status(SessionStatus),
    Connection(ConnectionState),
    /// A round is on screen, either freshly started or reopened after a miss.
    ShowRound(RoundState),
    /// Caption for the line that is about to be spoken.
    SpeakText(String),
    Feedback(Verdict),
    /// The session is over, with the reason it ended.
    SessionComplete(String),
}
