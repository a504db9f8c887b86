use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cogniplay_core::Command;
use cogniplay_core::GameError;
use cogniplay_core::matching::Answer;
use cogniplay_core::round::{RoundController, RoundState};
use cogniplay_core::session::{GameSession, SessionInputs};
use cogniplay_core::speech::SpeechOutput;
use cogniplay_core::voice::{ConnectionState, VoiceChannel};
use cogniplay_service::config::{Config, MIC_QUEUE_DEPTH, VoiceMode};
use cogniplay_service::deck_library::DeckLibrary;
use cogniplay_service::gemini_adapter::GeminiChannel;
use cogniplay_service::keyboard::KeyboardChannel;
use cogniplay_service::speech::{CommandSpeech, ConsoleSpeech};
use cogniplay_service::terminal::{Board, LineInput, is_yes, parse_line};
use cogniplay_service::{mic, phrase_loader};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "A picture-matching game played by voice")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a deck, by id or title
    Play {
        deck: String,
        /// Seed the round picker for a repeatable game
        #[arg(long)]
        seed: Option<u64>,
        /// Answer by typing instead of speaking
        #[arg(long)]
        keyboard: bool,
    },
    /// Manage the deck library
    Decks {
        #[command(subcommand)]
        action: DeckAction,
    },
}

#[derive(Subcommand)]
enum DeckAction {
    /// List the decks that can be played
    List,
    /// Write the built-in decks to the library file
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Create an empty deck
    Add {
        id: String,
        title: String,
        /// 1 to 5; higher shows more pictures per round
        #[arg(long, default_value_t = 1)]
        difficulty: u8,
    },
    /// Delete a deck and its pictures
    Remove { id: String },
    /// Change a deck's title
    Rename { id: String, title: String },
    /// Change how many pictures a round shows
    SetDifficulty { id: String, difficulty: u8 },
    /// Add a picture; names are comma separated, first one is asked for
    AddItem {
        deck: String,
        id: String,
        url: String,
        names: String,
    },
    /// Replace a picture's accepted names
    SetNames {
        deck: String,
        item: String,
        names: String,
    },
    /// Delete a picture from a deck
    RemoveItem { deck: String, item: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    // Logs go to stderr so the board on stdout stays readable.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();

    match args.command {
        Commands::Play {
            deck,
            seed,
            keyboard,
        } => play(&config, &deck, seed, keyboard).await,
        Commands::Decks { action } => manage_decks(&config, action),
    }
}

fn manage_decks(config: &Config, action: DeckAction) -> Result<()> {
    let path = config.deck_library.as_path();
    let edit = |change: &dyn Fn(&mut DeckLibrary) -> Result<()>| -> Result<DeckLibrary> {
        let mut library = DeckLibrary::load(path);
        change(&mut library)?;
        Ok(library)
    };

    let (library, done) = match action {
        DeckAction::List => {
            for deck in DeckLibrary::load(path).decks() {
                println!(
                    "{:<16} {:<28} difficulty {}  {} pictures",
                    deck.id,
                    deck.title,
                    deck.difficulty,
                    deck.items.len()
                );
            }
            return Ok(());
        }
        DeckAction::Init { force } => {
            let library = DeckLibrary::init(path, force)?;
            let done = format!("Wrote {} decks", library.decks().len());
            (library, done)
        }
        DeckAction::Add {
            id,
            title,
            difficulty,
        } => (
            edit(&|l| l.add_deck(&id, &title, difficulty))?,
            format!("Added deck '{id}'"),
        ),
        DeckAction::Remove { id } => (
            edit(&|l| l.remove_deck(&id))?,
            format!("Removed deck '{id}'"),
        ),
        DeckAction::Rename { id, title } => (
            edit(&|l| l.rename_deck(&id, &title))?,
            format!("Renamed deck '{id}'"),
        ),
        DeckAction::SetDifficulty { id, difficulty } => (
            edit(&|l| l.set_difficulty(&id, difficulty))?,
            format!("Deck '{id}' is now difficulty {difficulty}"),
        ),
        DeckAction::AddItem {
            deck,
            id,
            url,
            names,
        } => (
            edit(&|l| l.add_item(&deck, &id, &url, &names))?,
            format!("Added picture '{id}' to deck '{deck}'"),
        ),
        DeckAction::SetNames { deck, item, names } => (
            edit(&|l| l.set_names(&deck, &item, &names))?,
            format!("Updated names of picture '{item}' in deck '{deck}'"),
        ),
        DeckAction::RemoveItem { deck, item } => (
            edit(&|l| l.remove_item(&deck, &item))?,
            format!("Removed picture '{item}' from deck '{deck}'"),
        ),
    };
    println!("{done} ({})", library.path().display());
    Ok(())
}

async fn play(config: &Config, deck_key: &str, seed: Option<u64>, keyboard: bool) -> Result<()> {
    let library = DeckLibrary::load(&config.deck_library);
    let deck = library.find(deck_key).cloned().with_context(|| {
        let ids: Vec<&str> = library.decks().iter().map(|d| d.id.as_str()).collect();
        format!("No deck '{}'. Available: {}", deck_key, ids.join(", "))
    })?;

    let phrases = phrase_loader::load_phrasebook(&config.phrases_dir)
        .context("Failed to load phrases")?;

    let mode = if keyboard {
        VoiceMode::Keyboard
    } else {
        config.voice_mode
    };
    config.validate_for(mode)?;

    let speech: Arc<dyn SpeechOutput> = match &config.speech_command {
        Some(program) => Arc::new(CommandSpeech::new(program, config.speech_voice.clone())),
        None => Arc::new(ConsoleSpeech::default()),
    };
    let board = Board::new(config.speech_command.is_some());

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Ctrl-C received, ending the game.");
                shutdown.cancel();
            }
        });
    }

    let mut lines = spawn_stdin_lines();
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    tracing::info!("Starting deck '{}' in {:?} mode.", deck.title, mode);

    loop {
        let attempt = shutdown.child_token();
        let (audio_tx, audio_rx) = mpsc::channel(MIC_QUEUE_DEPTH);

        // The microphone stream lives exactly as long as this attempt.
        let (channel, microphone): (Box<dyn VoiceChannel>, Option<cpal::Stream>) = match mode {
            VoiceMode::Gemini => match mic::start_microphone(audio_tx) {
                Ok(stream) => {
                    let channel: Box<dyn VoiceChannel> =
                        Box::new(GeminiChannel::new(gemini_config(config)?));
                    (channel, Some(stream))
                }
                Err(e) => {
                    let error = mic::mic_unavailable(&e);
                    if let Some(text) = board.render(&Command::Connection(ConnectionState::Error)) {
                        println!("{text}");
                    }
                    if !shutdown.is_cancelled() && offer_retry(error, &mut lines).await {
                        continue;
                    }
                    return Ok(());
                }
            },
            VoiceMode::Keyboard => {
                drop(audio_tx);
                let channel: Box<dyn VoiceChannel> = Box::new(KeyboardChannel::new());
                (channel, None)
            }
        };

        let controller =
            RoundController::new(StdRng::seed_from_u64(rng.next_u64()), config.match_policy);
        let (command_tx, command_rx) = mpsc::channel(64);
        let (answer_tx, answer_rx) = mpsc::channel(8);
        let mut session =
            GameSession::new(deck.clone(), controller, channel, speech.clone(), command_tx)
                .with_phrases(phrases.clone())
                .with_pacing(config.pacing);
        let inputs = SessionInputs {
            answers: answer_rx,
            audio: audio_rx,
            cancel: attempt.clone(),
        };

        let (result, ()) = tokio::join!(
            session.run(inputs),
            drive_terminal(
                &board,
                command_rx,
                &mut lines,
                answer_tx,
                &attempt,
                mode == VoiceMode::Keyboard,
            )
        );
        drop(session);
        drop(microphone);

        match result {
            Ok(()) => return Ok(()),
            Err(error @ GameError::ChannelUnavailable { .. }) if !shutdown.is_cancelled() => {
                if offer_retry(error, &mut lines).await {
                    continue;
                }
                return Ok(());
            }
            Err(GameError::ChannelUnavailable { .. }) => return Ok(()),
            Err(e) => return Err(e).context("Game ended with an error"),
        }
    }
}

/// Explains why the attempt failed and asks whether to start another one.
async fn offer_retry(error: GameError, lines: &mut mpsc::Receiver<String>) -> bool {
    tracing::warn!("{}", error);
    match &error {
        GameError::ChannelUnavailable { state, reason } => {
            println!("The voice connection is {state} ({reason}). Try again? [y/N]");
        }
        other => println!("{other}. Try again? [y/N]"),
    }
    matches!(lines.recv().await, Some(line) if is_yes(&line))
}

fn gemini_config(config: &Config) -> Result<gemini_realtime::Config> {
    let api_key = config
        .gemini_api_key
        .clone()
        .context("GEMINI_API_KEY must be set for gemini voice mode")?;
    let mut builder = gemini_realtime::Config::builder().with_api_key(api_key);
    if let Some(model) = &config.gemini_model {
        builder = builder.with_model(model);
    }
    builder.build()
}

/// Prints session commands and turns typed lines into answers until the
/// session reports it is complete. With `quit_on_eof`, closing stdin ends
/// the game.
async fn drive_terminal(
    board: &Board,
    mut commands: mpsc::Receiver<Command>,
    lines: &mut mpsc::Receiver<String>,
    answers: mpsc::Sender<Answer>,
    cancel: &CancellationToken,
    quit_on_eof: bool,
) {
    let mut current: Option<RoundState> = None;
    let mut lines_open = true;

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                if let Command::ShowRound(round) = &command {
                    current = Some(round.clone());
                }
                if let Some(text) = board.render(&command) {
                    println!("{text}");
                }
                if matches!(command, Command::SessionComplete(_)) {
                    break;
                }
            }
            line = lines.recv(), if lines_open => match line {
                Some(line) => match parse_line(&line, current.as_ref()) {
                    LineInput::Quit => cancel.cancel(),
                    LineInput::Answer(answer) => {
                        if answers.try_send(answer).is_err() {
                            tracing::trace!("Answer dropped, session is busy");
                        }
                    }
                    LineInput::Ignored => {}
                },
                None => {
                    lines_open = false;
                    if quit_on_eof {
                        cancel.cancel();
                    }
                }
            },
        }
    }
}

fn spawn_stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
    rx
}
