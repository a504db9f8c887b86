use crate::Command;
use crate::deck::Deck;
use crate::error::GameError;
use crate::matching::Answer;
use crate::phrases::Phrasebook;
use crate::round::{RoundController, Settled, Verdict};
use crate::speech::SpeechOutput;
use crate::voice::{
    ChannelConfig, ChannelEvent, ConnectionState, TranscriptAssembler, VoiceChannel,
};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Sample rate of the PCM frames a session forwards to its voice channel.
pub const INPUT_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_CORRECT_DELAY: Duration = Duration::from_millis(2000);
pub const DEFAULT_INCORRECT_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Connecting,
    Playing,
    Finished,
}

/// How long feedback is left on screen before the game moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub correct_delay: Duration,
    pub incorrect_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            correct_delay: DEFAULT_CORRECT_DELAY,
            incorrect_delay: DEFAULT_INCORRECT_DELAY,
        }
    }
}

impl Pacing {
    pub fn delay_after(&self, verdict: Verdict) -> Duration {
        match verdict {
            Verdict::Correct => self.correct_delay,
            Verdict::Incorrect => self.incorrect_delay,
        }
    }
}

/// Everything a running session listens to besides its voice channel.
pub struct SessionInputs {
    /// Taps and typed answers.
    pub answers: mpsc::Receiver<Answer>,
    /// Microphone frames to forward to the voice channel.
    pub audio: mpsc::Receiver<Vec<i16>>,
    /// Ends the session from the outside.
    pub cancel: CancellationToken,
}

/// Drives one game from connecting to finished.
///
/// The session owns the voice channel outright, so no two sessions can hold
/// it at once. Whatever way `run` exits, and also when the session is
/// dropped mid-flight, the pending transition is cancelled, speech is
/// stopped and the channel is closed.
pub struct GameSession<R> {
    deck: Deck,
    controller: RoundController<R>,
    channel: Box<dyn VoiceChannel>,
    speech: Arc<dyn SpeechOutput>,
    phrases: Phrasebook,
    pacing: Pacing,
    command_tx: mpsc::Sender<Command>,
    status: SessionStatus,
    released: bool,
}

impl<R> GameSession<R> {
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.speech.cancel();
        self.channel.close();
        if let Some(round) = self.controller.end() {
            tracing::debug!("Discarded round {} on session end", round.number());
        }
        tracing::info!("Session resources released.");
    }
}

impl<R> Drop for GameSession<R> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<R: Rng + Send + Sync> GameSession<R> {
    pub fn new(
        deck: Deck,
        controller: RoundController<R>,
        channel: Box<dyn VoiceChannel>,
        speech: Arc<dyn SpeechOutput>,
        command_tx: mpsc::Sender<Command>,
    ) -> Self {
        Self {
            deck,
            controller,
            channel,
            speech,
            phrases: Phrasebook::default(),
            pacing: Pacing::default(),
            command_tx,
            status: SessionStatus::Idle,
            released: false,
        }
    }

    pub fn with_phrases(mut self, phrases: Phrasebook) -> Self {
        self.phrases = phrases;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Plays until the session is cancelled or the voice channel fails.
    ///
    /// Returns `Ok(())` when the player ended the game. Channel failures come
    /// back as `GameError::ChannelUnavailable`; the caller decides whether to
    /// offer a retry with a fresh session.
    pub async fn run(&mut self, mut inputs: SessionInputs) -> Result<(), GameError> {
        if self.released {
            return Err(GameError::channel(
                ConnectionState::Closed,
                "session has already finished",
            ));
        }

        let result = self.play(&mut inputs).await;
        self.release();

        let reason = match &result {
            Ok(()) => "Game ended".to_string(),
            Err(GameError::ChannelUnavailable { state, reason }) => {
                self.emit(Command::Connection(*state)).await;
                reason.clone()
            }
            Err(e) => e.to_string(),
        };
        self.set_status(SessionStatus::Finished).await;
        self.emit(Command::SessionComplete(reason)).await;
        result
    }

    async fn play(&mut self, inputs: &mut SessionInputs) -> Result<(), GameError> {
        self.deck.ensure_playable()?;

        self.set_status(SessionStatus::Connecting).await;
        self.emit(Command::Connection(ConnectionState::Connecting))
            .await;

        let mut events = self
            .channel
            .events()
            .await
            .map_err(|e| GameError::channel(ConnectionState::Error, format!("{e:#}")))?;
        let config = ChannelConfig {
            instructions: self.phrases.instructions.clone(),
            input_sample_rate: INPUT_SAMPLE_RATE,
        };
        self.channel
            .open(config)
            .await
            .map_err(|e| GameError::channel(ConnectionState::Error, format!("{e:#}")))?;

        // Wait for the channel to report it is ready.
        loop {
            tokio::select! {
                biased;
                _ = inputs.cancel.cancelled() => return Ok(()),
                event = events.recv() => match event {
                    Some(ChannelEvent::Opened) => break,
                    Some(other) => {
                        if let Some(err) = channel_failure(&other) {
                            return Err(err);
                        }
                        tracing::trace!("Ignoring {:?} while connecting", other);
                    }
                    None => {
                        return Err(GameError::channel(
                            ConnectionState::Closed,
                            "event stream ended before the channel opened",
                        ));
                    }
                },
            }
        }

        self.emit(Command::Connection(ConnectionState::Connected))
            .await;
        self.set_status(SessionStatus::Playing).await;
        tracing::info!("Voice channel open. Playing deck '{}'.", self.deck.title);

        self.controller.start_round(&self.deck)?;
        self.announce_round(false, &inputs.cancel).await;

        let mut assembler = TranscriptAssembler::default();
        let mut settle_at: Option<Instant> = None;
        let mut answers_open = true;
        let mut audio_open = true;

        loop {
            let settle = async move {
                match settle_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                _ = inputs.cancel.cancelled() => {
                    tracing::info!("Session cancelled.");
                    return Ok(());
                }
                _ = settle => {
                    settle_at = None;
                    self.settle(&inputs.cancel).await?;
                }
                event = events.recv() => match event {
                    Some(ChannelEvent::Transcription(fragment)) => assembler.push(&fragment),
                    Some(ChannelEvent::TurnComplete) => {
                        if let Some(text) = assembler.finish_turn() {
                            tracing::info!("Player said: \"{}\"", text);
                            if let Some(at) = self.answer(Answer::Transcript(text), &inputs.cancel).await {
                                settle_at = Some(at);
                            }
                        }
                    }
                    Some(ChannelEvent::Opened | ChannelEvent::Speaking | ChannelEvent::SpeakingDone) => {}
                    Some(other) => {
                        if let Some(err) = channel_failure(&other) {
                            return Err(err);
                        }
                    }
                    None => {
                        return Err(GameError::channel(
                            ConnectionState::Closed,
                            "the connection was closed",
                        ));
                    }
                },
                answer = inputs.answers.recv(), if answers_open => match answer {
                    Some(answer) => {
                        if let Some(at) = self.answer(answer, &inputs.cancel).await {
                            settle_at = Some(at);
                        }
                    }
                    None => answers_open = false,
                },
                frame = inputs.audio.recv(), if audio_open => match frame {
                    Some(pcm) => {
                        if let Err(e) = self.channel.send_audio(pcm).await {
                            tracing::warn!("Failed to forward audio frame: {:?}", e);
                        }
                    }
                    None => audio_open = false,
                },
            }
        }
    }

    /// Scores an answer and gives feedback. Returns when the settle delay
    /// should end, or `None` if the answer was dropped.
    async fn answer(&mut self, answer: Answer, cancel: &CancellationToken) -> Option<Instant> {
        let verdict = self.controller.evaluate_answer(&answer)?;
        tracing::info!("{:?} scored {:?}", answer, verdict);

        self.emit(Command::Feedback(verdict)).await;
        let line = match verdict {
            Verdict::Correct => self.phrases.praise.clone(),
            Verdict::Incorrect => self.phrases.encourage.clone(),
        };
        self.say(line, cancel).await;

        self.controller.begin_transition()?;
        Some(Instant::now() + self.pacing.delay_after(verdict))
    }

    async fn settle(&mut self, cancel: &CancellationToken) -> Result<(), GameError> {
        match self.controller.settle(&self.deck)? {
            Some(Settled::Advanced) => self.announce_round(false, cancel).await,
            Some(Settled::Retried) => self.announce_round(true, cancel).await,
            None => {}
        }
        Ok(())
    }

    async fn announce_round(&self, retry: bool, cancel: &CancellationToken) {
        let Some(round) = self.controller.round().cloned() else {
            return;
        };
        let line = if retry {
            self.phrases.reprompt_for(round.target())
        } else {
            self.phrases.prompt_for(round.target())
        };
        self.emit(Command::ShowRound(round)).await;
        self.say(line, cancel).await;
    }

    /// Speaks a line and waits for it to finish, unless the session is
    /// cancelled first.
    async fn say(&self, text: String, cancel: &CancellationToken) {
        self.emit(Command::SpeakText(text.clone())).await;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => self.speech.cancel(),
            result = self.speech.speak(&text) => {
                // A failed utterance must not stall the game.
                if let Err(e) = result {
                    tracing::warn!("Speech output failed: {:?}", e);
                }
            }
        }
    }

    async fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
        self.emit(Command::Status(status)).await;
    }

    async fn emit(&self, command: Command) {
        if let Err(e) = self.command_tx.send(command).await {
            tracing::debug!("Command receiver dropped: {}", e);
        }
    }
}

fn channel_failure(event: &ChannelEvent) -> Option<GameError> {
    match event {
        ChannelEvent::Error(message) => Some(GameError::channel(
            ConnectionState::Error,
            message.clone(),
        )),
        ChannelEvent::PermissionDenied => Some(GameError::channel(
            ConnectionState::PermissionDenied,
            "microphone access was denied",
        )),
        ChannelEvent::Closed => Some(GameError::channel(
            ConnectionState::Closed,
            "the connection was closed",
        )),
        _ => None,
    }
}
