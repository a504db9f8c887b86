use anyhow::{Context, Result, bail};
use cogniplay_core::deck::{Deck, Item, MAX_DIFFICULTY, MIN_DIFFICULTY, builtin_decks};
use std::fs;
use std::path::{Path, PathBuf};

/// The decks available to play, backed by a JSON file.
///
/// The file holds a JSON array of decks. A missing or unreadable file is not
/// an error: the built-in decks are used instead so the game always has
/// something to show.
///
/// Edits validate the whole library and then write it back. They are refused
/// when loading had to drop or replace what was on disk, so a broken file is
/// never silently overwritten.
#[derive(Debug, Clone)]
pub struct DeckLibrary {
    path: PathBuf,
    decks: Vec<Deck>,
    /// Why the in-memory decks differ from the file, if they do.
    degraded: Option<String>,
}

impl DeckLibrary {
    pub fn load(path: &Path) -> Self {
        let mut degraded = None;
        let decks = match read_decks(path) {
            Ok(Some(decks)) => decks,
            Ok(None) => {
                tracing::info!(
                    "No deck library at {}, using built-in decks.",
                    path.display()
                );
                builtin_decks()
            }
            Err(e) => {
                tracing::warn!("Failed to load deck library, using built-in decks: {:#}", e);
                degraded = Some(format!("{e:#}"));
                builtin_decks()
            }
        };

        let mut playable = Vec::with_capacity(decks.len());
        for deck in decks {
            match deck.validate() {
                Ok(()) => playable.push(deck),
                Err(e) => {
                    tracing::warn!("Skipping deck '{}': {}", deck.id, e);
                    degraded.get_or_insert_with(|| format!("deck '{}' is invalid: {}", deck.id, e));
                }
            }
        }
        if playable.is_empty() {
            tracing::warn!("Deck library has no valid decks, using built-in decks.");
            playable = builtin_decks();
        }

        Self {
            path: path.to_path_buf(),
            decks: playable,
            degraded,
        }
    }

    /// Writes the built-in decks to `path`. Refuses to replace an existing
    /// library unless `force` is set.
    pub fn init(path: &Path, force: bool) -> Result<Self> {
        if path.exists() && !force {
            bail!(
                "Deck library {} already exists (use --force to overwrite)",
                path.display()
            );
        }
        let library = Self {
            path: path.to_path_buf(),
            decks: builtin_decks(),
            degraded: None,
        };
        library.save()?;
        Ok(library)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.decks)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write deck library: {}", self.path.display()))
    }

    pub fn decks(&self) -> &[Deck] {
        &self.decks
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Looks a deck up by id, falling back to a case-insensitive title match.
    pub fn find(&self, key: &str) -> Option<&Deck> {
        let key = key.trim();
        self.decks.iter().find(|d| d.id == key).or_else(|| {
            self.decks
                .iter()
                .find(|d| d.title.eq_ignore_ascii_case(key))
        })
    }

    /// Creates an empty deck. Pictures are added with `add_item`.
    pub fn add_deck(&mut self, id: &str, title: &str, difficulty: u8) -> Result<()> {
        let id = id.trim();
        if id.is_empty() {
            bail!("Deck id must not be empty");
        }
        if self.decks.iter().any(|d| d.id == id) {
            bail!("Deck '{}' already exists", id);
        }
        let title = checked_title(title)?;
        let difficulty = checked_difficulty(difficulty)?;
        self.edit(|decks| {
            decks.push(Deck::new(id, title, difficulty, Vec::new()));
            Ok(())
        })
    }

    pub fn remove_deck(&mut self, id: &str) -> Result<()> {
        self.edit(|decks| {
            let before = decks.len();
            decks.retain(|d| d.id != id);
            if decks.len() == before {
                bail!("No deck '{}'", id);
            }
            Ok(())
        })
    }

    pub fn rename_deck(&mut self, id: &str, title: &str) -> Result<()> {
        let title = checked_title(title)?.to_string();
        self.edit(|decks| {
            deck_mut(decks, id)?.title = title;
            Ok(())
        })
    }

    pub fn set_difficulty(&mut self, id: &str, difficulty: u8) -> Result<()> {
        let difficulty = checked_difficulty(difficulty)?;
        self.edit(|decks| {
            deck_mut(decks, id)?.difficulty = difficulty;
            Ok(())
        })
    }

    /// Adds a picture. `names` is comma separated; the first name is the one
    /// the game asks for.
    pub fn add_item(&mut self, deck_id: &str, item_id: &str, url: &str, names: &str) -> Result<()> {
        let item_id = item_id.trim();
        if item_id.is_empty() {
            bail!("Picture id must not be empty");
        }
        let accepted_names = checked_names(names)?;
        self.edit(|decks| {
            deck_mut(decks, deck_id)?.items.push(Item {
                id: item_id.to_string(),
                display_url: url.trim().to_string(),
                accepted_names,
            });
            Ok(())
        })
    }

    pub fn remove_item(&mut self, deck_id: &str, item_id: &str) -> Result<()> {
        self.edit(|decks| {
            let deck = deck_mut(decks, deck_id)?;
            let before = deck.items.len();
            deck.items.retain(|item| item.id != item_id);
            if deck.items.len() == before {
                bail!("Deck '{}' has no picture '{}'", deck_id, item_id);
            }
            Ok(())
        })
    }

    /// Replaces a picture's accepted names with a comma separated list.
    pub fn set_names(&mut self, deck_id: &str, item_id: &str, names: &str) -> Result<()> {
        let accepted_names = checked_names(names)?;
        self.edit(|decks| {
            let item = deck_mut(decks, deck_id)?
                .items
                .iter_mut()
                .find(|item| item.id == item_id)
                .with_context(|| format!("Deck '{}' has no picture '{}'", deck_id, item_id))?;
            item.accepted_names = accepted_names;
            Ok(())
        })
    }

    /// Applies `change` to a copy of the decks, validates the result and only
    /// then keeps and saves it.
    fn edit(&mut self, change: impl FnOnce(&mut Vec<Deck>) -> Result<()>) -> Result<()> {
        if let Some(reason) = &self.degraded {
            bail!(
                "Deck library {} was not loaded cleanly ({}); fix it or run `decks init --force` before editing",
                self.path.display(),
                reason
            );
        }
        let mut decks = self.decks.clone();
        change(&mut decks)?;
        for deck in &decks {
            deck.validate()?;
        }
        self.decks = decks;
        self.save()
    }
}

/// Splits a comma separated name list, trimming entries and dropping blanks.
pub fn parse_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn checked_names(raw: &str) -> Result<Vec<String>> {
    let names = parse_names(raw);
    if names.is_empty() {
        bail!("At least one name is needed, got '{}'", raw);
    }
    Ok(names)
}

fn checked_title(title: &str) -> Result<&str> {
    let title = title.trim();
    if title.is_empty() {
        bail!("Deck title must not be empty");
    }
    Ok(title)
}

fn checked_difficulty(difficulty: u8) -> Result<u8> {
    if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&difficulty) {
        bail!(
            "Difficulty must be between {} and {}, got {}",
            MIN_DIFFICULTY,
            MAX_DIFFICULTY,
            difficulty
        );
    }
    Ok(difficulty)
}

fn deck_mut<'a>(decks: &'a mut [Deck], id: &str) -> Result<&'a mut Deck> {
    decks
        .iter_mut()
        .find(|d| d.id == id)
        .with_context(|| format!("No deck '{}'", id))
}

fn read_decks(path: &Path) -> Result<Option<Vec<Deck>>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read deck library: {}", path.display()))?;
    let decks = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse deck library: {}", path.display()))?;
    Ok(Some(decks))
}
