use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use interview_core::SynthesisError;
use interview_native_utils::audio;

use crate::elevenlabs::AudioSink;

/// Waits as long as the clip would take to play, without an audio device.
/// Keeps the interview's pacing when the binary is built without `native-audio`.
/// Setting the cancel flag ends the wait within one poll.
#[derive(Debug, Default)]
pub struct PacedPlayback;

const CANCEL_POLL: Duration = Duration::from_millis(10);

#[async_trait]
impl AudioSink for PacedPlayback {
    async fn play(
        &self,
        pcm16: Vec<u8>,
        sample_rate: u32,
        cancel: Arc<AtomicBool>,
    ) -> Result<(), SynthesisError> {
        let duration = audio::playback_duration(pcm16.len() / 2, sample_rate as f64);
        tracing::debug!("No audio device; pacing {:?} of speech", duration);

        let clip = tokio::time::sleep(duration);
        tokio::pin!(clip);
        let mut poll = tokio::time::interval(CANCEL_POLL);
        loop {
            tokio::select! {
                _ = &mut clip => return Ok(()),
                _ = poll.tick() => {
                    if cancel.load(Ordering::Acquire) {
                        tracing::debug!("Paced speech cancelled");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Plays clips on an output device through cpal.
#[cfg(feature = "native-audio")]
#[derive(Debug, Default)]
pub struct DevicePlayback {
    device_name: Option<String>,
}

#[cfg(feature = "native-audio")]
impl DevicePlayback {
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }
}

#[cfg(feature = "native-audio")]
#[async_trait]
impl AudioSink for DevicePlayback {
    async fn play(
        &self,
        pcm16: Vec<u8>,
        sample_rate: u32,
        cancel: Arc<AtomicBool>,
    ) -> Result<(), SynthesisError> {
        let device_name = self.device_name.clone();
        let samples = audio::pcm16_le_to_f32(&pcm16);

        // The cpal stream is not Send; it lives and dies on the blocking thread.
        tokio::task::spawn_blocking(move || {
            interview_native_utils::player::play_blocking(
                device_name.as_deref(),
                &samples,
                sample_rate as f64,
                &cancel,
            )
        })
        .await
        .map_err(|e| SynthesisError::Playback(e.to_string()))?
        .map_err(|e| SynthesisError::Playback(format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn paced_playback_takes_as_long_as_the_clip() {
        let start = tokio::time::Instant::now();
        // Half a second of 16 kHz mono PCM16.
        let clip = vec![0u8; 16_000];

        PacedPlayback
            .play(clip, 16_000, Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();

        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_ends_paced_playback_early() {
        let start = tokio::time::Instant::now();
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            flag.store(true, Ordering::Release);
        });

        // Ten seconds of audio.
        PacedPlayback
            .play(vec![0u8; 320_000], 16_000, cancel)
            .await
            .unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100), "{elapsed:?}");
        assert!(elapsed <= Duration::from_millis(100) + CANCEL_POLL, "{elapsed:?}");
    }
}
