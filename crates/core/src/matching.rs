use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

/// What the player gave as an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Final transcript of a spoken turn, or text typed by a parent.
    Transcript(String),
    /// A picture picked directly, identified by its item id.
    Selection(String),
}

/// How a transcript is compared against an item's accepted names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// Case-insensitive containment of any accepted name, anywhere in the
    /// transcript. "doghouse" counts as "dog".
    #[default]
    Substring,
    /// Containment, or a skim fuzzy score above `threshold`.
    Fuzzy { threshold: i64 },
}

pub struct AnswerMatcher {
    policy: MatchPolicy,
    matcher: SkimMatcherV2,
}

impl AnswerMatcher {
    pub fn new(policy: MatchPolicy) -> Self {
        Self {
            policy,
            matcher: SkimMatcherV2::default(),
        }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// True when the transcript names any of `accepted_names`.
    ///
    /// Names are compared as stored, surrounding spaces included. Blank names
    /// are skipped; an empty name would otherwise match every transcript.
    pub fn matches(&self, transcript: &str, accepted_names: &[String]) -> bool {
        let transcript = transcript.to_lowercase();
        accepted_names
            .iter()
            .filter(|name| !name.trim().is_empty())
            .map(|name| name.to_lowercase())
            .any(|name| {
                if transcript.contains(&name) {
                    return true;
                }
                match self.policy {
                    MatchPolicy::Substring => false,
                    MatchPolicy::Fuzzy { threshold } => {
                        self.matcher.fuzzy_match(&transcript, &name).unwrap_or(0) > threshold
                    }
                }
            })
    }
}

impl Default for AnswerMatcher {
    fn default() -> Self {
        Self::new(MatchPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_substring_accepts_any_name_case_insensitively() {
        let matcher = AnswerMatcher::default();
        let accepted = names(&["Dog", "Puppy"]);

        assert!(matcher.matches("I see a puppy over there", &accepted));
        assert!(matcher.matches("DOG!", &accepted));
    }

    #[test]
    fn test_substring_is_permissive_inside_words() {
        let matcher = AnswerMatcher::default();
        assert!(matcher.matches("doghouse", &names(&["Dog", "Puppy"])));
    }

    #[test]
    fn test_substring_rejects_other_words() {
        let matcher = AnswerMatcher::default();
        assert!(!matcher.matches("cat", &names(&["Dog", "Puppy"])));
        assert!(!matcher.matches("", &names(&["Dog"])));
    }

    #[test]
    fn test_blank_names_never_match() {
        let matcher = AnswerMatcher::default();
        assert!(!matcher.matches("anything at all", &names(&["", "   "])));
    }

    #[test]
    fn test_names_are_not_trimmed() {
        let matcher = AnswerMatcher::default();
        let accepted = names(&[" dog "]);

        assert!(!matcher.matches("my dog", &accepted));
        assert!(matcher.matches("a dog here", &accepted));
    }

    #[test]
    fn test_fuzzy_accepts_what_substring_accepts() {
        let matcher = AnswerMatcher::new(MatchPolicy::Fuzzy { threshold: i64::MAX });
        assert!(matcher.matches("that's a kitty", &names(&["Cat", "Kitty"])));
    }

    #[test]
    fn test_fuzzy_accepts_scattered_letters_above_threshold() {
        let substring = AnswerMatcher::default();
        let fuzzy = AnswerMatcher::new(MatchPolicy::Fuzzy { threshold: 0 });
        let accepted = names(&["Grandpa"]);

        assert!(!substring.matches("grand papa", &accepted));
        assert!(fuzzy.matches("grand papa", &accepted));
    }
}
