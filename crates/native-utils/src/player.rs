//! Blocking playback of a single mono PCM clip on an output device.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FrameCount, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};

use crate::audio;

/// The size of each buffer requested from the output stream.
pub const OUTPUT_CHUNK_SIZE: usize = 1024;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Plays `samples` recorded at `source_rate` and blocks until they have been
/// played or `cancel` is set. The stream is dropped before returning.
///
/// Run this on a blocking thread; it sleeps while the device drains.
pub fn play_blocking(
    device_name: Option<&str>,
    samples: &[f32],
    source_rate: f64,
    cancel: &AtomicBool,
) -> anyhow::Result<()> {
    let output = crate::device::get_or_default_output(device_name)
        .context("Failed to get audio output device")?;
    tracing::debug!("Using output device: {:?}", output.name());

    let default_config = output
        .default_output_config()
        .context("Failed to get default output config")?;
    let config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(OUTPUT_CHUNK_SIZE as u32)),
    };
    let channel_count = config.channels as usize;
    let output_rate = config.sample_rate.0 as f64;

    let mut resampler = audio::create_resampler(source_rate, output_rate, 1024)?;
    let resampled = audio::resample_all(&mut resampler, samples)?;
    tracing::debug!(
        "Playing {} samples ({:?}) at {} Hz",
        resampled.len(),
        audio::playback_duration(resampled.len(), output_rate),
        output_rate
    );

    let buffer = audio::shared_buffer(resampled.len().max(1));
    let (mut producer, mut consumer) = buffer.split();
    let pushed = producer.push_slice(&resampled);
    if pushed < resampled.len() {
        tracing::warn!("Dropped {} samples that did not fit the buffer", resampled.len() - pushed);
    }

    let drained = Arc::new(AtomicBool::new(false));
    let drained_flag = drained.clone();
    let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        for frame in data.chunks_mut(channel_count.max(1)) {
            let sample = match consumer.try_pop() {
                Some(sample) => sample,
                None => {
                    drained_flag.store(true, Ordering::Release);
                    0.0
                }
            };
            frame.fill(sample);
        }
    };

    let stream = output.build_output_stream(
        &config,
        output_data_fn,
        move |err| tracing::error!("An error occurred on output stream: {}", err),
        None,
    )?;
    stream.play()?;

    while !drained.load(Ordering::Acquire) {
        if cancel.load(Ordering::Acquire) {
            tracing::debug!("Playback cancelled");
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    drop(stream);
    Ok(())
}
