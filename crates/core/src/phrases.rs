use crate::deck::Item;
use std::collections::HashMap;

const NAME_PLACEHOLDER: &str = "{name}";

/// Names under which a phrase can be overridden.
pub const PHRASE_KEYS: [&str; 5] = ["prompt", "reprompt", "praise", "encourage", "instructions"];

/// Lines the game speaks. `{name}` is replaced by the target's canonical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrasebook {
    pub prompt: String,
    pub reprompt: String,
    pub praise: String,
    pub encourage: String,
    /// Instructions handed to the voice channel when it opens.
    pub instructions: String,
}

impl Default for Phrasebook {
    fn default() -> Self {
        Self {
            prompt: "Find the {name}".to_string(),
            reprompt: "Can you find the {name}?".to_string(),
            praise: "That's right!".to_string(),
            encourage: "Not quite, try again.".to_string(),
            instructions: "You are listening to a toddler name pictures. \
                Transcribe what they say. Do not answer or add anything."
                .to_string(),
        }
    }
}

impl Phrasebook {
    /// Builds a phrasebook from keyed overrides (`prompt`, `reprompt`,
    /// `praise`, `encourage`, `instructions`); missing or blank keys keep
    /// their defaults.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut book = Self::default();
        let slots = [
            &mut book.prompt,
            &mut book.reprompt,
            &mut book.praise,
            &mut book.encourage,
            &mut book.instructions,
        ];
        for (key, slot) in PHRASE_KEYS.into_iter().zip(slots) {
            if let Some(text) = overrides.get(key).map(|t| t.trim()) {
                if !text.is_empty() {
                    *slot = text.to_string();
                }
            } else {
                tracing::trace!("no override for phrase '{}'", key);
            }
        }
        book
    }

    pub fn prompt_for(&self, target: &Item) -> String {
        self.prompt.replace(NAME_PLACEHOLDER, target.canonical_name())
    }

    pub fn reprompt_for(&self, target: &Item) -> String {
        self.reprompt.replace(NAME_PLACEHOLDER, target.canonical_name())
    }
}
