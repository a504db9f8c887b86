use base64::Engine;
use rubato::{FastFixedIn, PolynomialDegree};

/// Sample rate the live voice service expects for input audio.
pub const LIVE_INPUT_SAMPLE_RATE: u32 = 16_000;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Averages interleaved frames down to a single channel.
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels > 1 {
        data.chunks(channels)
            .map(|c| c.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        data.to_vec()
    }
}

/// Converts float samples to PCM16.
///
/// Samples are clamped to [-1, 1]; negative values scale by 0x8000 and
/// positive ones by 0x7FFF so both ends of the i16 range are reachable.
pub fn float_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let s = s.clamp(-1.0, 1.0);
            if s < 0.0 {
                (s * 32768.0) as i16
            } else {
                (s * 32767.0) as i16
            }
        })
        .collect()
}

/// Encodes PCM16 samples as little-endian bytes in base64.
pub fn encode_i16(pcm16: &[i16]) -> String {
    let bytes: Vec<u8> = pcm16.to_binary();
    base64::engine::general_purpose::STANDARD.encode(&bytes)
}

/// MIME type describing raw PCM16 at the given rate.
pub fn pcm_mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={sample_rate}")
}

/// A trait for converting audio sample types to a binary representation (Vec<u8>).
pub trait ToBinary {
    fn to_binary(&self) -> Vec<u8>;
}

impl ToBinary for [i16] {
    fn to_binary(&self) -> Vec<u8> {
        self.iter()
            .flat_map(|&sample| sample.to_le_bytes())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_to_pcm16_uses_full_range() {
        let pcm = float_to_pcm16(&[-1.0, 0.0, 1.0, 2.0, -3.0]);
        assert_eq!(pcm, vec![i16::MIN, 0, i16::MAX, i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_encode_is_little_endian_base64() {
        // 1 -> [0x01, 0x00], -2 -> [0xFE, 0xFF]
        assert_eq!(encode_i16(&[1, -2]), "AQD+/w==");
    }

    #[test]
    fn test_downmix_averages_channels() {
        let stereo = [0.5, -0.5, 1.0, 0.0];
        assert_eq!(downmix(&stereo, 2), vec![0.0, 0.5]);
        assert_eq!(downmix(&[0.25], 1), vec![0.25]);
    }

    #[test]
    fn test_mime_type_names_rate() {
        assert_eq!(pcm_mime_type(16_000), "audio/pcm;rate=16000");
    }
}
