use anyhow::Result;
use cogniplay_native_utils::audio::{self, LIVE_INPUT_SAMPLE_RATE};
use rubato::{FastFixedIn, Resampler};
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Turns device-rate mono float audio into 16 kHz PCM16 frames.
pub struct Uplink {
    buffer: VecDeque<f32>,
    resampler: FastFixedIn<f32>,
    chunk_size: usize,
}

impl Uplink {
    pub fn new(device_sample_rate: u32, chunk_size: usize) -> Result<Self> {
        let resampler = audio::create_resampler(
            device_sample_rate as f64,
            LIVE_INPUT_SAMPLE_RATE as f64,
            chunk_size,
        )?;
        Ok(Self {
            buffer: VecDeque::with_capacity(chunk_size * 2),
            resampler,
            chunk_size,
        })
    }

    /// Buffers `mono` and returns whatever full chunks could be resampled.
    /// Leftover samples wait for the next call.
    pub fn push(&mut self, mono: &[f32]) -> Vec<i16> {
        self.buffer.extend(mono);
        let mut resampled: Vec<f32> = vec![];
        while self.buffer.len() >= self.chunk_size {
            let chunk: Vec<f32> = self.buffer.drain(..self.chunk_size).collect();
            match self.resampler.process(&[chunk.as_slice()], None) {
                Ok(out) => {
                    if let Some(channel) = out.first() {
                        resampled.extend_from_slice(channel);
                    }
                }
                Err(e) => tracing::warn!("Failed to resample microphone audio: {}", e),
            }
        }
        audio::float_to_pcm16(&resampled)
    }
}

/// Feeds captured audio through `uplink` until the capture side hangs up.
///
/// Frames are dropped rather than queued when the session falls behind.
pub async fn run_uplink(
    mut captured: mpsc::Receiver<Vec<f32>>,
    frames: mpsc::Sender<Vec<i16>>,
    mut uplink: Uplink,
) {
    while let Some(samples) = captured.recv().await {
        let pcm = uplink.push(&samples);
        if pcm.is_empty() {
            continue;
        }
        match frames.try_send(pcm) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => tracing::trace!("Session busy, dropping audio frame"),
            Err(TrySendError::Closed(_)) => break,
        }
    }
    tracing::debug!("Microphone uplink stopped.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_chunks_wait_for_more_audio() {
        let mut uplink = Uplink::new(48_000, 1024).unwrap();

        assert!(uplink.push(&[0.1; 1000]).is_empty());
        let pcm = uplink.push(&[0.1; 100]);
        assert!(!pcm.is_empty());
        assert!(pcm.len() < 1024, "48 kHz input should shrink to 16 kHz");
    }

    #[test]
    fn test_downsampling_ratio() {
        let mut uplink = Uplink::new(48_000, 1024).unwrap();
        let mut produced = 0;
        for _ in 0..30 {
            produced += uplink.push(&[0.0; 1024]).len();
        }
        // 30 * 1024 samples at 48 kHz is 10240 at 16 kHz, minus filter delay.
        assert!((9_500..=10_300).contains(&produced), "produced {produced}");
    }

    #[tokio::test]
    async fn test_run_uplink_forwards_and_stops_when_capture_ends() {
        let (captured_tx, captured_rx) = mpsc::channel(4);
        let (frames_tx, mut frames_rx) = mpsc::channel(4);
        let uplink = Uplink::new(16_000, 256).unwrap();
        let task = tokio::spawn(run_uplink(captured_rx, frames_tx, uplink));

        captured_tx.send(vec![0.5; 300]).await.unwrap();
        let frame = frames_rx.recv().await.unwrap();
        assert!(!frame.is_empty());

        drop(captured_tx);
        task.await.unwrap();
        assert!(frames_rx.recv().await.is_none());
    }
}
