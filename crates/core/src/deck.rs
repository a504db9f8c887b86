use crate::error::GameError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Fewest items a deck needs before a round can be built from it.
pub const MIN_ITEMS: usize = 2;
pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 5;

/// One matchable picture and the names a player may use for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    #[serde(alias = "url")]
    pub display_url: String,
    /// The first entry is canonical and is used when asking the question.
    #[serde(alias = "names")]
    pub accepted_names: Vec<String>,
}

impl Item {
    pub fn new(id: &str, display_url: &str, names: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            display_url: display_url.to_string(),
            accepted_names: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    pub fn canonical_name(&self) -> &str {
        self.accepted_names
            .first()
            .map(String::as_str)
            .unwrap_or(self.id.as_str())
    }
}

/// A named collection of items played together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: String,
    #[serde(alias = "name")]
    pub title: String,
    #[serde(alias = "images", default)]
    pub items: Vec<Item>,
    #[serde(alias = "complexity", default = "default_difficulty")]
    pub difficulty: u8,
}

fn default_difficulty() -> u8 {
    MIN_DIFFICULTY
}

impl Deck {
    pub fn new(id: &str, title: &str, difficulty: u8, items: Vec<Item>) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            items,
            difficulty,
        }
    }

    /// Fails when the deck cannot supply even a two-option round.
    pub fn ensure_playable(&self) -> Result<(), GameError> {
        if self.items.len() < MIN_ITEMS {
            return Err(GameError::InsufficientItems {
                available: self.items.len(),
            });
        }
        Ok(())
    }

    /// Checks the structural rules a stored deck has to follow.
    pub fn validate(&self) -> Result<(), GameError> {
        let mut seen = HashSet::new();
        for item in &self.items {
            if !seen.insert(item.id.as_str()) {
                return Err(GameError::InvalidDeck(format!(
                    "deck '{}' contains item id '{}' more than once",
                    self.id, item.id
                )));
            }
            if item.accepted_names.iter().all(|n| n.trim().is_empty()) {
                return Err(GameError::InvalidDeck(format!(
                    "item '{}' in deck '{}' has no accepted names",
                    item.id, self.id
                )));
            }
        }
        Ok(())
    }

    /// Number of pictures shown per round for this deck.
    pub fn option_count(&self) -> usize {
        option_count(self.difficulty)
    }
}

/// Maps a difficulty to the number of options on screen.
///
/// 1-2 show two pictures, 3-4 show three, 5 shows four. Values outside
/// 1..=5 are clamped first.
pub fn option_count(difficulty: u8) -> usize {
    match difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY) {
        1 | 2 => 2,
        3 | 4 => 3,
        _ => 4,
    }
}

/// The decks offered when no library has been saved yet.
pub fn builtin_decks() -> Vec<Deck> {
    vec![
        Deck::new(
            "collection-1",
            "High-Contrast Shapes",
            1,
            vec![
                Item::new("img-1a", "https://picsum.photos/seed/circle_bw/400?grayscale", &["Circle"]),
                Item::new("img-1b", "https://picsum.photos/seed/square_bw/400?grayscale", &["Square"]),
                Item::new("img-1c", "https://picsum.photos/seed/star_bw/400?grayscale", &["Star"]),
                Item::new("img-1d", "https://picsum.photos/seed/heart_bw/400?grayscale", &["Heart"]),
            ],
        ),
        Deck::new(
            "collection-2",
            "Friendly Animal Faces",
            1,
            vec![
                Item::new("img-2a", "https://picsum.photos/seed/cartooncat/400", &["Cat", "Kitty"]),
                Item::new("img-2b", "https://picsum.photos/seed/cartoondog/400", &["Dog", "Puppy"]),
                Item::new("img-2c", "https://picsum.photos/seed/cartoonbear/400", &["Bear"]),
                Item::new("img-2d", "https://picsum.photos/seed/cartoonbunny/400", &["Bunny", "Rabbit"]),
            ],
        ),
        Deck::new(
            "collection-3",
            "Colorful Animals",
            2,
            vec![
                Item::new("img-3a", "https://picsum.photos/seed/lion/400", &["Lion"]),
                Item::new("img-3b", "https://picsum.photos/seed/frog/400", &["Frog"]),
                Item::new("img-3c", "https://picsum.photos/seed/duck/400", &["Duck"]),
                Item::new("img-3d", "https://picsum.photos/seed/pig/400", &["Pig"]),
            ],
        ),
        Deck::new(
            "collection-4",
            "Family Faces",
            3,
            vec![
                Item::new("img-4a", "https://picsum.photos/seed/mom/400", &["Mommy", "Mom"]),
                Item::new("img-4b", "https://picsum.photos/seed/dad/400", &["Daddy", "Dad"]),
                Item::new("img-4c", "https://picsum.photos/seed/grandma/400", &["Grandma", "Nana"]),
                Item::new("img-4d", "https://picsum.photos/seed/grandpa/400", &["Grandpa"]),
            ],
        ),
    ]
}
