use crate::config::{INPUT_CHUNK_SIZE, MIC_QUEUE_DEPTH};
use crate::uplink::{Uplink, run_uplink};
use anyhow::{Context, Result};
use cogniplay_core::GameError;
use cogniplay_core::voice::ConnectionState;
use cogniplay_native_utils::{audio, device};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FrameCount, StreamConfig};
use tokio::sync::mpsc;

/// Starts capturing from the default microphone and streams 16 kHz PCM16
/// frames into `frames`.
///
/// Capture stops when the returned stream is dropped.
pub fn start_microphone(frames: mpsc::Sender<Vec<i16>>) -> Result<cpal::Stream> {
    let input =
        device::get_or_default_input(None).context("Failed to get default audio input device")?;
    tracing::info!("Using input device: {:?}", input.name()?);

    let default_config = input
        .default_input_config()
        .context("Failed to get default input config")?;
    let config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(INPUT_CHUNK_SIZE as u32)),
    };
    let channel_count = config.channels as usize;
    tracing::info!("Input stream config: {:?}", &config);

    let (captured_tx, captured_rx) = mpsc::channel::<Vec<f32>>(MIC_QUEUE_DEPTH);
    let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
        if let Err(e) = captured_tx.try_send(audio::downmix(data, channel_count)) {
            tracing::trace!("Dropping captured audio: {:?}", e);
        }
    };

    let stream = input
        .build_input_stream(
            &config,
            input_data_fn,
            move |err| tracing::error!("An error occurred on input stream: {}", err),
            None,
        )
        .context("Microphone is unavailable or access was denied")?;
    stream.play().context("Failed to start microphone capture")?;

    let uplink = Uplink::new(config.sample_rate.0, INPUT_CHUNK_SIZE)?;
    tokio::spawn(run_uplink(captured_rx, frames, uplink));
    Ok(stream)
}

/// Reports a capture failure as a channel error the player can retry.
///
/// cpal does not say whether access was refused or the device is missing, so
/// neither is reported as a permission denial.
pub fn mic_unavailable(err: &anyhow::Error) -> GameError {
    GameError::channel(
        ConnectionState::Error,
        format!("microphone unavailable: {err:#}"),
    )
}
