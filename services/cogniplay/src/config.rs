//! Application Configuration Module
//!
//! Loads the game's settings from environment variables (and a `.env` file
//! when present) into a single struct that `main` hands out to the pieces
//! that need it.

use cogniplay_core::matching::MatchPolicy;
use cogniplay_core::session::{DEFAULT_CORRECT_DELAY, DEFAULT_INCORRECT_DELAY, Pacing};
use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

// --- Application Constants ---

/// The size of each chunk fed to the microphone resampler.
pub const INPUT_CHUNK_SIZE: usize = 1024;
/// How many captured buffers may queue up before the mic callback drops audio.
pub const MIC_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceMode {
    /// Live transcription through the hosted voice service.
    Gemini,
    /// Typed and tapped answers only, no microphone.
    Keyboard,
}

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub voice_mode: VoiceMode,
    pub gemini_api_key: Option<SecretString>,
    pub gemini_model: Option<String>,
    pub deck_library: PathBuf,
    pub phrases_dir: PathBuf,
    pub speech_command: Option<String>,
    pub speech_voice: Option<String>,
    pub pacing: Pacing,
    pub match_policy: MatchPolicy,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `VOICE_MODE`: "gemini" or "keyboard". Defaults to "gemini".
    // *   `GEMINI_API_KEY`: Required when playing in gemini mode.
    // *   `GEMINI_MODEL`: (Optional) Live model name.
    // *   `DECK_LIBRARY`: (Optional) Deck library file. Defaults to "decks.json".
    // *   `PHRASES_DIR`: (Optional) Directory of phrase overrides. Defaults to "phrases".
    // *   `SPEECH_COMMAND` / `SPEECH_VOICE`: (Optional) TTS program and voice. Unset prints to the console.
    // *   `CORRECT_DELAY_MS` / `INCORRECT_DELAY_MS`: (Optional) Feedback delays.
    // *   `MATCH_POLICY`: (Optional) "substring" or "fuzzy:<threshold>".
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let voice_mode = match lookup("VOICE_MODE") {
            None => VoiceMode::Gemini,
            Some(mode) => parse_voice_mode(&mode)?,
        };

        let gemini_api_key = lookup("GEMINI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::from);
        let gemini_model = lookup("GEMINI_MODEL").filter(|m| !m.trim().is_empty());

        let deck_library = PathBuf::from(
            lookup("DECK_LIBRARY").unwrap_or_else(|| "decks.json".to_string()),
        );
        let phrases_dir =
            PathBuf::from(lookup("PHRASES_DIR").unwrap_or_else(|| "phrases".to_string()));

        let speech_command = lookup("SPEECH_COMMAND").filter(|c| !c.trim().is_empty());
        let speech_voice = lookup("SPEECH_VOICE").filter(|v| !v.trim().is_empty());

        let pacing = Pacing {
            correct_delay: match lookup("CORRECT_DELAY_MS") {
                Some(raw) => parse_millis("CORRECT_DELAY_MS", &raw)?,
                None => DEFAULT_CORRECT_DELAY,
            },
            incorrect_delay: match lookup("INCORRECT_DELAY_MS") {
                Some(raw) => parse_millis("INCORRECT_DELAY_MS", &raw)?,
                None => DEFAULT_INCORRECT_DELAY,
            },
        };

        let match_policy = match lookup("MATCH_POLICY") {
            Some(raw) => parse_match_policy(&raw)?,
            None => MatchPolicy::default(),
        };

        // Configure logging level from RUST_LOG, with a sensible default.
        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            voice_mode,
            gemini_api_key,
            gemini_model,
            deck_library,
            phrases_dir,
            speech_command,
            speech_voice,
            pacing,
            match_policy,
            log_level,
        })
    }

    /// Checks that everything the chosen voice mode needs is present.
    pub fn validate_for(&self, mode: VoiceMode) -> Result<(), ConfigError> {
        match mode {
            VoiceMode::Gemini if self.gemini_api_key.is_none() => Err(ConfigError::MissingVar(
                "GEMINI_API_KEY must be set for gemini voice mode".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

fn parse_voice_mode(raw: &str) -> Result<VoiceMode, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "gemini" => Ok(VoiceMode::Gemini),
        "keyboard" => Ok(VoiceMode::Keyboard),
        _ => Err(ConfigError::InvalidValue {
            var: "VOICE_MODE",
            value: raw.to_string(),
        }),
    }
}

fn parse_millis(var: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidValue {
            var,
            value: raw.to_string(),
        })
}

/// Parses `substring` or `fuzzy:<threshold>`.
pub fn parse_match_policy(raw: &str) -> Result<MatchPolicy, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        var: "MATCH_POLICY",
        value: raw.to_string(),
    };
    let normalized = raw.trim().to_lowercase();
    match normalized.split_once(':') {
        None if normalized == "substring" => Ok(MatchPolicy::Substring),
        Some(("fuzzy", threshold)) => threshold
            .trim()
            .parse::<i64>()
            .map(|threshold| MatchPolicy::Fuzzy { threshold })
            .map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.voice_mode, VoiceMode::Gemini);
        assert_eq!(config.deck_library, PathBuf::from("decks.json"));
        assert_eq!(config.phrases_dir, PathBuf::from("phrases"));
        assert_eq!(config.pacing, Pacing::default());
        assert_eq!(config.match_policy, MatchPolicy::Substring);
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.speech_command.is_none());
    }

    #[test]
    fn test_gemini_mode_requires_key() {
        let config = load(&[]).unwrap();
        assert!(matches!(
            config.validate_for(VoiceMode::Gemini),
            Err(ConfigError::MissingVar(_))
        ));
        assert!(config.validate_for(VoiceMode::Keyboard).is_ok());

        let config = load(&[("GEMINI_API_KEY", "abc")]).unwrap();
        assert!(config.validate_for(VoiceMode::Gemini).is_ok());

        let config = load(&[("GEMINI_API_KEY", "  ")]).unwrap();
        assert!(config.gemini_api_key.is_none(), "blank key counts as unset");
    }

    #[test]
    fn test_delays_parse_as_millis() {
        let config = load(&[("CORRECT_DELAY_MS", "500"), ("INCORRECT_DELAY_MS", " 250 ")]).unwrap();
        assert_eq!(config.pacing.correct_delay, Duration::from_millis(500));
        assert_eq!(config.pacing.incorrect_delay, Duration::from_millis(250));

        assert!(matches!(
            load(&[("CORRECT_DELAY_MS", "soon")]),
            Err(ConfigError::InvalidValue { var: "CORRECT_DELAY_MS", .. })
        ));
    }

    #[test]
    fn test_match_policy_parsing() {
        assert_eq!(parse_match_policy("substring").unwrap(), MatchPolicy::Substring);
        assert_eq!(
            parse_match_policy("Fuzzy:60").unwrap(),
            MatchPolicy::Fuzzy { threshold: 60 }
        );
        assert!(parse_match_policy("fuzzy:").is_err());
        assert!(parse_match_policy("exact").is_err());
        assert!(parse_match_policy("substring:3").is_err());
    }

    #[test]
    fn test_invalid_mode_and_log_level_are_rejected() {
        assert!(matches!(
            load(&[("VOICE_MODE", "telepathy")]),
            Err(ConfigError::InvalidValue { var: "VOICE_MODE", .. })
        ));
        assert!(matches!(
            load(&[("RUST_LOG", "chatty")]),
            Err(ConfigError::InvalidLogLevel(_))
        ));
        assert_eq!(
            load(&[("VOICE_MODE", "KEYBOARD")]).unwrap().voice_mode,
            VoiceMode::Keyboard
        );
    }
}
