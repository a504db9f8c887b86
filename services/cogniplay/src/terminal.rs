use cogniplay_core::Command;
use cogniplay_core::matching::Answer;
use cogniplay_core::round::{RoundState, Verdict};
use cogniplay_core::session::SessionStatus;
use cogniplay_core::voice::ConnectionState;

/// What a line typed at the board means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineInput {
    Answer(Answer),
    Quit,
    Ignored,
}

/// Reads a typed line: a number taps that option on the current board,
/// `q` ends the game, anything else is taken as a spoken answer.
pub fn parse_line(line: &str, round: Option<&RoundState>) -> LineInput {
    let text = line.trim();
    if text.is_empty() {
        return LineInput::Ignored;
    }
    if matches!(text.to_lowercase().as_str(), "q" | "quit" | "exit") {
        return LineInput::Quit;
    }
    if let Ok(n) = text.parse::<usize>() {
        return match round.and_then(|r| n.checked_sub(1).and_then(|i| r.options().get(i))) {
            Some(item) => LineInput::Answer(Answer::Selection(item.id.clone())),
            None => LineInput::Ignored,
        };
    }
    LineInput::Answer(Answer::Transcript(text.to_string()))
}

pub fn is_yes(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Renders session commands as terminal text.
pub struct Board {
    /// Print what is being said. Off when the speech output already prints.
    captions: bool,
}

impl Board {
    pub fn new(captions: bool) -> Self {
        Self { captions }
    }

    pub fn render(&self, command: &Command) -> Option<String> {
        match command {
            Command::Status(SessionStatus::Connecting) => Some("Getting ready...".to_string()),
            Command::Status(_) => None,
            Command::Connection(ConnectionState::Connected) => Some(
                "Connected. Say the name, type it, or tap a number. 'q' stops the game."
                    .to_string(),
            ),
            Command::Connection(ConnectionState::Connecting) => None,
            Command::Connection(state) => Some(format!("[voice {state}]")),
            Command::ShowRound(round) => Some(render_round(round)),
            Command::SpeakText(text) if self.captions => Some(format!("  💬 {text}")),
            Command::SpeakText(_) => None,
            Command::Feedback(Verdict::Correct) => Some("  ⭐ Yes!".to_string()),
            Command::Feedback(Verdict::Incorrect) => Some("  ✗ Not that one".to_string()),
            Command::SessionComplete(reason) => Some(format!("Session finished: {reason}")),
        }
    }
}

pub fn render_round(round: &RoundState) -> String {
    let mut out = format!("\nRound {}", round.number());
    for (i, item) in round.options().iter().enumerate() {
        out.push_str(&format!("\n  [{}] {}  <{}>", i + 1, item.canonical_name(), item.display_url));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogniplay_core::deck::{Deck, Item};
    use cogniplay_core::matching::MatchPolicy;
    use cogniplay_core::round::RoundController;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn round() -> RoundState {
        let deck = Deck::new(
            "pets",
            "Pets",
            1,
            vec![
                Item::new("cat", "cat.png", &["Cat"]),
                Item::new("dog", "dog.png", &["Dog"]),
            ],
        );
        let mut controller = RoundController::new(StdRng::seed_from_u64(7), MatchPolicy::Substring);
        controller.start_round(&deck).unwrap().clone()
    }

    #[test]
    fn test_numbers_tap_options() {
        let round = round();
        let second = round.options()[1].id.clone();

        assert_eq!(
            parse_line(" 2 ", Some(&round)),
            LineInput::Answer(Answer::Selection(second))
        );
        assert_eq!(parse_line("3", Some(&round)), LineInput::Ignored);
        assert_eq!(parse_line("0", Some(&round)), LineInput::Ignored);
        assert_eq!(parse_line("1", None), LineInput::Ignored);
    }

    #[test]
    fn test_words_are_answers_and_q_quits() {
        assert_eq!(
            parse_line("the doggy\n", None),
            LineInput::Answer(Answer::Transcript("the doggy".to_string()))
        );
        assert_eq!(parse_line("Q", None), LineInput::Quit);
        assert_eq!(parse_line("   ", None), LineInput::Ignored);
        assert!(is_yes(" Y\n"));
        assert!(!is_yes("nope"));
    }

    #[test]
    fn test_board_lists_numbered_options() {
        let round = round();
        let text = render_round(&round);

        assert!(text.contains("Round 1"));
        assert!(text.contains("[1]"));
        assert!(text.contains("[2]"));
        assert!(!text.contains("[3]"));
    }

    #[test]
    fn test_captions_follow_setting() {
        let speak = Command::SpeakText("Find the Cat".to_string());
        assert_eq!(Board::new(true).render(&speak).as_deref(), Some("  💬 Find the Cat"));
        assert_eq!(Board::new(false).render(&speak), None);
        assert_eq!(
            Board::new(false)
                .render(&Command::Connection(ConnectionState::PermissionDenied))
                .as_deref(),
            Some("[voice permission_denied]")
        );
    }
}
