use anyhow::{Context, Result};
use cogniplay_core::phrases::{PHRASE_KEYS, Phrasebook};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::Path;

/// Collects phrase overrides from `<key>.md` files in `dir_path`.
///
/// Only files named after a phrase key are read. Any other markdown file is
/// reported and skipped, so a typo in a file name does not go unnoticed.
pub fn load_phrases(dir_path: &Path) -> Result<HashMap<String, String>> {
    let entries = fs::read_dir(dir_path)
        .with_context(|| format!("Failed to read phrases directory: {}", dir_path.display()))?;

    let mut phrases = HashMap::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || path.extension() != Some(OsStr::new("md")) {
            continue;
        }
        let stem = path.file_stem().and_then(OsStr::to_str).unwrap_or_default();
        let Some(key) = PHRASE_KEYS.into_iter().find(|key| *key == stem) else {
            tracing::warn!(
                "Ignoring {}: phrase files must be named one of {}",
                path.display(),
                PHRASE_KEYS.join(", ")
            );
            continue;
        };
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read phrase file: {}", path.display()))?;
        phrases.insert(key.to_string(), text);
    }
    Ok(phrases)
}

/// Builds the phrasebook, keeping the defaults when the directory is absent.
pub fn load_phrasebook(dir_path: &Path) -> Result<Phrasebook> {
    if !dir_path.exists() {
        tracing::debug!(
            "No phrases directory at {}, using default phrases.",
            dir_path.display()
        );
        return Ok(Phrasebook::default());
    }
    let overrides = load_phrases(dir_path)?;
    tracing::info!("Loaded {} phrase overrides.", overrides.len());
    Ok(Phrasebook::with_overrides(&overrides))
}
