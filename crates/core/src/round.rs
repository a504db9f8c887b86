use crate::deck::{Deck, Item};
use crate::error::GameError;
use crate::matching::{Answer, AnswerMatcher, MatchPolicy};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingAnswer,
    /// An answer was accepted and is being scored. Further answers are dropped.
    Evaluating,
    Feedback(Verdict),
    /// Feedback was given; waiting out the settle delay before the next step.
    Transitioning(Verdict),
}

/// One question-answer cycle. Only the controller mutates it; everyone else
/// sees clones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundState {
    target: Item,
    options: Vec<Item>,
    phase: Phase,
    number: u64,
}

impl RoundState {
    pub fn target(&self) -> &Item {
        &self.target
    }

    pub fn options(&self) -> &[Item] {
        &self.options
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// 1-based count of rounds started in this controller.
    pub fn number(&self) -> u64 {
        self.number
    }
}

/// What happened when a transition's delay ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    /// A fresh round was started after a correct answer.
    Advanced,
    /// The same round is open again after a wrong answer.
    Retried,
}

/// Owns the quiz state machine for one session.
///
/// All randomness comes from the injected `R`, so a seeded generator makes
/// every round reproducible.
pub struct RoundController<R> {
    rng: R,
    matcher: AnswerMatcher,
    round: Option<RoundState>,
    rounds_started: u64,
}

impl<R> RoundController<R> {
    pub fn round(&self) -> Option<&RoundState> {
        self.round.as_ref()
    }

    pub fn rounds_started(&self) -> u64 {
        self.rounds_started
    }

    pub fn match_policy(&self) -> MatchPolicy {
        self.matcher.policy()
    }

    /// Drops the in-flight round, if any.
    pub fn end(&mut self) -> Option<RoundState> {
        self.round.take()
    }
}

impl<R: Rng> RoundController<R> {
    pub fn new(rng: R, policy: MatchPolicy) -> Self {
        Self {
            rng,
            matcher: AnswerMatcher::new(policy),
            round: None,
            rounds_started: 0,
        }
    }

    /// Picks a target and builds a shuffled option set for it.
    ///
    /// The previous round is discarded. On error no round is left behind.
    pub fn start_round(&mut self, deck: &Deck) -> Result<&RoundState, GameError> {
        self.round = None;
        deck.ensure_playable()?;

        let target = deck.items[self.rng.gen_range(0..deck.items.len())].clone();

        let candidates: Vec<&Item> = {
            let mut seen = HashSet::from([target.id.as_str()]);
            deck.items
                .iter()
                .filter(|item| seen.insert(item.id.as_str()))
                .collect()
        };
        if candidates.is_empty() {
            return Err(GameError::InsufficientItems { available: 1 });
        }

        let wanted = deck.option_count().min(candidates.len() + 1);
        let mut options: Vec<Item> = candidates
            .choose_multiple(&mut self.rng, wanted - 1)
            .map(|item| (*item).clone())
            .collect();
        options.push(target.clone());
        options.shuffle(&mut self.rng);

        self.rounds_started += 1;
        tracing::debug!(
            "Round {} started: target '{}' among {} options",
            self.rounds_started,
            target.id,
            options.len()
        );

        Ok(self.round.insert(RoundState {
            target,
            options,
            phase: Phase::AwaitingAnswer,
            number: self.rounds_started,
        }))
    }

    /// Scores an answer for the open round.
    ///
    /// Returns `None` without touching anything when no round is waiting for
    /// an answer; late or duplicate submissions end up here.
    pub fn evaluate_answer(&mut self, answer: &Answer) -> Option<Verdict> {
        let round = self.round.as_mut()?;
        if round.phase != Phase::AwaitingAnswer {
            tracing::trace!("Dropping answer in phase {:?}", round.phase);
            return None;
        }
        round.phase = Phase::Evaluating;

        let correct = match answer {
            Answer::Transcript(text) => self.matcher.matches(text, &round.target.accepted_names),
            Answer::Selection(id) => *id == round.target.id,
        };
        let verdict = if correct {
            Verdict::Correct
        } else {
            Verdict::Incorrect
        };
        round.phase = Phase::Feedback(verdict);
        Some(verdict)
    }

    /// Marks feedback as delivered; the settle delay starts now.
    pub fn begin_transition(&mut self) -> Option<Verdict> {
        let round = self.round.as_mut()?;
        match round.phase {
            Phase::Feedback(verdict) => {
                round.phase = Phase::Transitioning(verdict);
                Some(verdict)
            }
            _ => None,
        }
    }

    /// Runs the step that follows a transition: a new round after a correct
    /// answer, the same round again after a wrong one.
    pub fn settle(&mut self, deck: &Deck) -> Result<Option<Settled>, GameError> {
        let Some(round) = self.round.as_mut() else {
            return Ok(None);
        };
        let phase = round.phase;
        match phase {
            Phase::Transitioning(Verdict::Correct) => {
                self.start_round(deck)?;
                Ok(Some(Settled::Advanced))
            }
            Phase::Transitioning(Verdict::Incorrect) => {
                round.phase = Phase::AwaitingAnswer;
                Ok(Some(Settled::Retried))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::builtin_decks;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn deck_of(count: usize, difficulty: u8) -> Deck {
        let items = (0..count)
            .map(|i| Item::new(&format!("item-{i}"), "u", &[&format!("Name{i}")]))
            .collect();
        Deck::new("test", "Test", difficulty, items)
    }

    fn controller(seed: u64) -> RoundController<StdRng> {
        RoundController::new(StdRng::seed_from_u64(seed), MatchPolicy::Substring)
    }

    fn animals() -> Deck {
        builtin_decks()
            .into_iter()
            .find(|d| d.id == "collection-2")
            .expect("animal deck")
    }

    fn answer_for(round: &RoundState) -> Answer {
        Answer::Selection(round.target().id.clone())
    }

    fn wrong_answer_for(round: &RoundState) -> Answer {
        let other = round
            .options()
            .iter()
            .find(|o| o.id != round.target().id)
            .expect("a distractor");
        Answer::Selection(other.id.clone())
    }

    #[test]
    fn test_option_invariant_holds_for_every_size_and_difficulty() {
        for count in 2..=7 {
            for difficulty in 1..=5 {
                for seed in 0..25 {
                    let deck = deck_of(count, difficulty);
                    let mut rc = controller(seed);
                    let round = rc.start_round(&deck).expect("round should start");

                    let target_hits = round
                        .options()
                        .iter()
                        .filter(|o| o.id == round.target().id)
                        .count();
                    assert_eq!(target_hits, 1, "target must appear exactly once");

                    let expected = crate::deck::option_count(difficulty).min(count);
                    assert_eq!(round.options().len(), expected);

                    let ids: HashSet<&str> =
                        round.options().iter().map(|o| o.id.as_str()).collect();
                    assert_eq!(ids.len(), round.options().len(), "no duplicate ids");
                    assert_eq!(round.phase(), Phase::AwaitingAnswer);
                }
            }
        }
    }

    #[test]
    fn test_duplicate_ids_in_deck_do_not_leak_into_options() {
        let deck = Deck::new(
            "dupes",
            "Dupes",
            5,
            vec![
                Item::new("a", "u", &["Apple"]),
                Item::new("a", "u", &["Apple again"]),
                Item::new("b", "u", &["Ball"]),
            ],
        );
        for seed in 0..20 {
            let mut rc = controller(seed);
            let round = rc.start_round(&deck).expect("round should start");
            let ids: HashSet<&str> = round.options().iter().map(|o| o.id.as_str()).collect();
            assert_eq!(ids.len(), round.options().len());
            assert_eq!(round.options().len(), 2);
        }
    }

    #[test]
    fn test_same_seed_gives_same_round() {
        let deck = animals();
        let mut first = controller(7);
        let mut second = controller(7);

        let a = first.start_round(&deck).expect("round").clone();
        let b = second.start_round(&deck).expect("round").clone();

        assert_eq!(a, b);
    }

    #[test]
    fn test_start_round_rejects_small_decks() {
        for count in 0..2 {
            let mut rc = controller(1);
            let result = rc.start_round(&deck_of(count, 3));
            assert!(matches!(
                result,
                Err(GameError::InsufficientItems { available }) if available == count
            ));
            assert!(rc.round().is_none(), "no round should be created");
            assert_eq!(rc.rounds_started(), 0);
        }
    }

    #[test]
    fn test_transcript_answers_use_substring_matching() {
        let deck = Deck::new(
            "dogs",
            "Dogs",
            1,
            vec![
                Item::new("dog", "u", &["Dog", "Puppy"]),
                Item::new("cat", "u", &["Cat"]),
            ],
        );

        let cases = [
            ("I see a puppy over there", Verdict::Correct),
            ("doghouse", Verdict::Correct),
            ("cat", Verdict::Incorrect),
        ];
        for (transcript, expected) in cases {
            // Find a seed that makes the dog the target.
            let mut rc = (0..)
                .map(controller)
                .find_map(|mut rc| {
                    let is_dog = rc.start_round(&deck).ok()?.target().id == "dog";
                    is_dog.then_some(rc)
                })
                .expect("some seed targets the dog");

            let verdict = rc.evaluate_answer(&Answer::Transcript(transcript.to_string()));
            assert_eq!(verdict, Some(expected), "transcript {transcript:?}");
        }
    }

    #[test]
    fn test_selection_compares_item_ids() {
        let deck = animals();
        let mut rc = controller(3);
        let round = rc.start_round(&deck).expect("round").clone();

        assert_eq!(
            rc.evaluate_answer(&wrong_answer_for(&round)),
            Some(Verdict::Incorrect)
        );
        rc.begin_transition();
        rc.settle(&deck).expect("settle");
        assert_eq!(rc.evaluate_answer(&answer_for(&round)), Some(Verdict::Correct));
    }

    #[test]
    fn test_wrong_answer_retries_the_same_round() {
        let deck = animals();
        let mut rc = controller(11);
        let before = rc.start_round(&deck).expect("round").clone();

        assert_eq!(
            rc.evaluate_answer(&wrong_answer_for(&before)),
            Some(Verdict::Incorrect)
        );
        assert_eq!(
            rc.round().map(RoundState::phase),
            Some(Phase::Feedback(Verdict::Incorrect))
        );
        assert_eq!(rc.begin_transition(), Some(Verdict::Incorrect));
        assert_eq!(rc.settle(&deck).expect("settle"), Some(Settled::Retried));

        let after = rc.round().expect("round survives");
        assert_eq!(after.target(), before.target());
        assert_eq!(after.options(), before.options());
        assert_eq!(after.phase(), Phase::AwaitingAnswer);
        assert_eq!(rc.rounds_started(), 1, "no new round on a wrong answer");
    }

    #[test]
    fn test_correct_answer_starts_a_new_round() {
        let deck = animals();
        let mut rc = controller(5);
        let first = rc.start_round(&deck).expect("round").clone();

        assert_eq!(rc.evaluate_answer(&answer_for(&first)), Some(Verdict::Correct));
        assert_eq!(rc.begin_transition(), Some(Verdict::Correct));
        assert_eq!(rc.settle(&deck).expect("settle"), Some(Settled::Advanced));

        assert_eq!(rc.rounds_started(), 2);
        let next = rc.round().expect("new round");
        assert_eq!(next.number(), 2);
        assert_eq!(next.phase(), Phase::AwaitingAnswer);
    }

    #[test]
    fn test_targets_may_repeat_between_rounds() {
        let deck = deck_of(2, 1);
        let mut rc = controller(0);
        let mut repeated = false;
        let mut last = rc.start_round(&deck).expect("round").target().id.clone();
        for _ in 0..50 {
            let round = rc.round().expect("round").clone();
            rc.evaluate_answer(&answer_for(&round));
            rc.begin_transition();
            rc.settle(&deck).expect("settle");
            let current = rc.round().expect("round").target().id.clone();
            repeated |= current == last;
            last = current;
        }
        assert!(repeated, "consecutive rounds are allowed to share a target");
    }

    #[test]
    fn test_second_answer_is_dropped_while_first_is_pending() {
        let deck = animals();
        let mut rc = controller(9);
        let round = rc.start_round(&deck).expect("round").clone();

        assert_eq!(rc.evaluate_answer(&answer_for(&round)), Some(Verdict::Correct));
        assert_eq!(rc.evaluate_answer(&wrong_answer_for(&round)), None);
        assert_eq!(
            rc.round().map(RoundState::phase),
            Some(Phase::Feedback(Verdict::Correct))
        );

        rc.begin_transition();
        assert_eq!(rc.evaluate_answer(&answer_for(&round)), None);
    }

    #[test]
    fn test_answers_without_a_round_are_ignored() {
        let mut rc = controller(2);
        assert_eq!(rc.evaluate_answer(&Answer::Transcript("dog".into())), None);
        assert_eq!(rc.begin_transition(), None);
        assert_eq!(rc.settle(&animals()).expect("settle"), None);
    }

    #[test]
    fn test_settle_is_a_no_op_before_feedback_is_delivered() {
        let deck = animals();
        let mut rc = controller(4);
        let round = rc.start_round(&deck).expect("round").clone();
        rc.evaluate_answer(&answer_for(&round));

        assert_eq!(rc.settle(&deck).expect("settle"), None);
        assert_eq!(rc.rounds_started(), 1);
    }

    #[test]
    fn test_end_discards_the_round() {
        let deck = animals();
        let mut rc = controller(6);
        rc.start_round(&deck).expect("round");

        assert!(rc.end().is_some());
        assert!(rc.round().is_none());
    }
}
