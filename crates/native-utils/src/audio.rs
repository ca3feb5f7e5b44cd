use std::time::Duration;

use ringbuf::HeapRb;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Sample rate of the raw `pcm_16000` audio returned by ElevenLabs.
pub const TTS_PCM16_SAMPLE_RATE: f64 = 16000.0;

/// Creates a mono resampler between two sample rates.
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

/// Splits samples into fixed-size chunks, zero-padding the last one.
pub fn split_for_chunks(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
    samples
        .chunks(chunk_size)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize(chunk_size, 0.0);
            chunk
        })
        .collect()
}

/// Runs every sample through `resampler`, chunk by chunk.
pub fn resample_all(resampler: &mut FastFixedIn<f32>, samples: &[f32]) -> anyhow::Result<Vec<f32>> {
    let chunk_size = resampler.input_frames_next();
    let mut out = Vec::with_capacity(samples.len());
    for chunk in split_for_chunks(samples, chunk_size) {
        let resampled = resampler.process(&[chunk.as_slice()], None)?;
        if let Some(channel) = resampled.first() {
            out.extend_from_slice(channel);
        }
    }
    Ok(out)
}

/// Creates a new ring buffer on the heap for shared audio data.
pub fn shared_buffer(size: usize) -> HeapRb<f32> {
    HeapRb::new(size)
}

/// Converts little-endian 16-bit PCM bytes into samples in [-1.0, 1.0].
/// A trailing odd byte is ignored.
pub fn pcm16_le_to_f32(bytes: &[u8]) -> Vec<f32> {
    if bytes.len() % 2 != 0 {
        tracing::warn!("PCM payload has an odd length ({} bytes)", bytes.len());
    }
    bytes
        .chunks_exact(2)
        .map(|chunk| {
            let v = i16::from_le_bytes([chunk[0], chunk[1]]);
            (v as f32 / 32768.0).clamp(-1.0, 1.0)
        })
        .collect()
}

/// How long `sample_count` mono samples take to play at `sample_rate`.
pub fn playback_duration(sample_count: usize, sample_rate: f64) -> Duration {
    if sample_rate <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(sample_count as f64 / sample_rate)
}
