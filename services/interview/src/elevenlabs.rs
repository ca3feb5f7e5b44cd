//! ElevenLabs text-to-speech as a [`SpeechOutput`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use async_trait::async_trait;
use interview_core::{SpeechOutput, SynthesisError};
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

pub const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";
/// The "Sarah" voice.
pub const DEFAULT_VOICE_ID: &str = "EXAVITQu4vr4xnSDxMaL";
pub const DEFAULT_MODEL_ID: &str = "eleven_turbo_v2";

const OUTPUT_FORMAT: &str = "pcm_16000";
pub const OUTPUT_SAMPLE_RATE: u32 = 16_000;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
        }
    }
}

#[derive(Debug, Serialize)]
struct TextToSpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

/// Plays raw 16-bit little-endian mono PCM.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Returns once the clip has played or `cancel` was set.
    async fn play(
        &self,
        pcm16: Vec<u8>,
        sample_rate: u32,
        cancel: Arc<AtomicBool>,
    ) -> Result<(), SynthesisError>;
}

pub struct ElevenLabsSpeechOutput {
    client: Client,
    api_key: SecretString,
    voice_id: String,
    model_id: String,
    voice_settings: VoiceSettings,
    base_url: String,
    sink: Arc<dyn AudioSink>,
    // Cancel flag of the utterance in flight.
    current: Mutex<Option<Arc<AtomicBool>>>,
}

impl ElevenLabsSpeechOutput {
    pub fn new(api_key: SecretString, voice_id: impl Into<String>, sink: Arc<dyn AudioSink>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            voice_id: voice_id.into(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            voice_settings: VoiceSettings::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            sink,
            current: Mutex::new(None),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Requests raw PCM audio for `text`.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/v1/text-to-speech/{}?output_format={}",
            self.base_url, self.voice_id, OUTPUT_FORMAT
        );
        let body = TextToSpeechRequest {
            text,
            model_id: &self.model_id,
            voice_settings: self.voice_settings,
        };

        tracing::debug!("POST {} ({} chars)", url, text.chars().count());
        let resp = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("Failed to reach ElevenLabs")?;

        let status = resp.status();
        if !status.is_success() {
            let msg = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("ElevenLabs error {}: {}", status.as_u16(), msg));
        }

        let audio = resp
            .bytes()
            .await
            .context("Failed to read ElevenLabs audio")?;
        Ok(audio.to_vec())
    }

    fn begin_utterance(&self) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(false));
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = current.replace(flag.clone()) {
            previous.store(true, Ordering::Release);
        }
        flag
    }

    /// Forgets `flag` if it still belongs to the utterance in flight.
    fn end_utterance(&self, flag: &Arc<AtomicBool>) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, flag)) {
            *current = None;
        }
    }

    async fn synthesize_and_play(
        &self,
        text: &str,
        cancel: Arc<AtomicBool>,
    ) -> Result<(), SynthesisError> {
        let audio = self
            .synthesize(text)
            .await
            .map_err(|e| SynthesisError::Request(format!("{e:#}")))?;
        if cancel.load(Ordering::Acquire) {
            return Ok(());
        }

        tracing::debug!("Received {} bytes of audio", audio.len());
        self.sink.play(audio, OUTPUT_SAMPLE_RATE, cancel).await
    }
}

#[async_trait]
impl SpeechOutput for ElevenLabsSpeechOutput {
    async fn speak(&self, text: &str) -> Result<(), SynthesisError> {
        let cancel = self.begin_utterance();
        let result = self.synthesize_and_play(text, cancel.clone()).await;
        self.end_utterance(&cancel);
        result
    }

    fn cancel(&self) {
        let current = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(flag) = current {
            tracing::debug!("Cancelling speech");
            flag.store(true, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response and hands back the raw request.
    async fn serve_once(status: &str, body: &'static [u8]) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let status = status.to_string();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let l = l.to_ascii_lowercase();
                            l.strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn request_body_matches_the_api() {
        let body = TextToSpeechRequest {
            text: "Tell me about yourself.",
            model_id: DEFAULT_MODEL_ID,
            voice_settings: VoiceSettings::default(),
        };
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model_id"], "eleven_turbo_v2");
        assert_eq!(json["voice_settings"]["stability"], 0.5);
        assert_eq!(json["voice_settings"]["similarity_boost"], 0.75);
    }

    #[tokio::test]
    async fn speaks_by_playing_the_returned_pcm() {
        let (base_url, server) = serve_once("200 OK", &[0, 0, 0, 64]).await;
        let mut sink = MockAudioSink::new();
        sink.expect_play()
            .withf(|pcm, rate, cancel| {
                pcm == &vec![0, 0, 0, 64] && *rate == 16_000 && !cancel.load(Ordering::SeqCst)
            })
            .returning(|_, _, _| Ok(()))
            .once();

        let output = ElevenLabsSpeechOutput::new("xi-test".to_string().into(), "voice-1", Arc::new(sink))
            .with_base_url(&base_url);
        output.speak("Why Rust?").await.unwrap();
        assert!(output.current.lock().unwrap().is_none(), "a finished utterance is forgotten");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/text-to-speech/voice-1?output_format=pcm_16000 "));
        assert!(request.to_ascii_lowercase().contains("xi-api-key: xi-test"));
        assert!(request.contains("\"text\":\"Why Rust?\""));
    }

    #[tokio::test]
    async fn an_error_status_becomes_a_request_error() {
        let (base_url, _server) = serve_once("401 Unauthorized", b"invalid api key").await;
        let mut sink = MockAudioSink::new();
        sink.expect_play().never();

        let output = ElevenLabsSpeechOutput::new("bad".to_string().into(), "voice-1", Arc::new(sink))
            .with_base_url(&base_url);
        let err = output.speak("Hello").await.unwrap_err();

        match err {
            SynthesisError::Request(msg) => {
                assert!(msg.contains("401"), "{msg}");
                assert!(msg.contains("invalid api key"), "{msg}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn cancel_flags_the_current_utterance_only() {
        let output = ElevenLabsSpeechOutput::new(
            "k".to_string().into(),
            DEFAULT_VOICE_ID,
            Arc::new(MockAudioSink::new()),
        );
        output.cancel();

        let first = output.begin_utterance();
        let second = output.begin_utterance();
        assert!(first.load(Ordering::SeqCst), "a new utterance supersedes the old one");
        assert!(!second.load(Ordering::SeqCst));

        output.cancel();
        assert!(second.load(Ordering::SeqCst));
        output.cancel();
    }

    #[test]
    fn ending_a_superseded_utterance_keeps_the_newer_one() {
        let output = ElevenLabsSpeechOutput::new(
            "k".to_string().into(),
            DEFAULT_VOICE_ID,
            Arc::new(MockAudioSink::new()),
        );
        let first = output.begin_utterance();
        let second = output.begin_utterance();

        output.end_utterance(&first);
        output.cancel();
        assert!(second.load(Ordering::SeqCst), "the newer utterance is still cancellable");

        output.end_utterance(&second);
        assert!(output.current.lock().unwrap().is_none());
    }
}
