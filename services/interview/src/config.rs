//! Application Configuration Module
//!
//! Loads the interview service settings from environment variables (and a
//! `.env` file, when present) into a single struct built once at startup.

use std::env;
use std::path::PathBuf;

use interview_core::gemini::DEFAULT_MODEL;
use interview_core::prompts::InterviewProfile;
use secrecy::SecretString;
use tracing::Level;

use crate::elevenlabs::DEFAULT_VOICE_ID;

/// Where interview questions and feedback come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionProvider {
    Gemini,
    /// Built-in question bank and heuristic scoring; no network access.
    Simulated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechOutputKind {
    Console,
    ElevenLabs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognizerKind {
    /// Typed lines stand in for recognized speech.
    Console,
    /// No recognizer; every answer is recorded empty.
    None,
}

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: QuestionProvider,
    pub gemini_api_key: Option<SecretString>,
    pub gemini_model: String,
    pub speech_output: SpeechOutputKind,
    pub elevenlabs_api_key: Option<SecretString>,
    pub elevenlabs_voice_id: String,
    /// Output device for spoken questions; the host default when unset.
    pub output_device: Option<String>,
    pub recognizer: RecognizerKind,
    pub profile: InterviewProfile,
    pub prompts_dir: Option<PathBuf>,
    pub log_level: Level,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Invalid value '{value}' for {var} (expected one of: {expected})")]
    InvalidValue {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    // *   `INTERVIEW_PROVIDER`: "gemini" (default) or "simulated".
    // *   `GEMINI_API_KEY`: Required for the gemini provider.
    // *   `GEMINI_MODEL`: (Optional) Defaults to `gemini-flash-lite-latest`.
    // *   `SPEECH_OUTPUT`: "console" or "elevenlabs". Defaults to elevenlabs when a key is set.
    // *   `ELEVENLABS_API_KEY`, `ELEVENLABS_VOICE_ID`: ElevenLabs credentials and voice.
    // *   `OUTPUT_DEVICE`: (Optional) Playback device name, used with the `native-audio` feature.
    // *   `RECOGNIZER`: "console" (default) or "none".
    // *   `INTERVIEW_COMPANY`, `INTERVIEW_ROLE`: (Optional) Fill the question prompt.
    // *   `PROMPTS_DIR`: (Optional) Directory of `.md` templates overriding the built-in prompts.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. Ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match var("INTERVIEW_PROVIDER").map(|v| v.to_lowercase()).as_deref() {
            None | Some("gemini") => QuestionProvider::Gemini,
            Some("simulated") => QuestionProvider::Simulated,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    var: "INTERVIEW_PROVIDER",
                    value: other.to_string(),
                    expected: "gemini, simulated",
                });
            }
        };

        let gemini_api_key = var("GEMINI_API_KEY").map(SecretString::from);
        let gemini_model = var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let elevenlabs_api_key = var("ELEVENLABS_API_KEY").map(SecretString::from);
        let elevenlabs_voice_id =
            var("ELEVENLABS_VOICE_ID").unwrap_or_else(|| DEFAULT_VOICE_ID.to_string());

        let speech_output = match var("SPEECH_OUTPUT").map(|v| v.to_lowercase()).as_deref() {
            None if elevenlabs_api_key.is_some() => SpeechOutputKind::ElevenLabs,
            None | Some("console") => SpeechOutputKind::Console,
            Some("elevenlabs") => SpeechOutputKind::ElevenLabs,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    var: "SPEECH_OUTPUT",
                    value: other.to_string(),
                    expected: "console, elevenlabs",
                });
            }
        };

        let recognizer = match var("RECOGNIZER").map(|v| v.to_lowercase()).as_deref() {
            None | Some("console") => RecognizerKind::Console,
            Some("none") => RecognizerKind::None,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    var: "RECOGNIZER",
                    value: other.to_string(),
                    expected: "console, none",
                });
            }
        };

        let defaults = InterviewProfile::default();
        let profile = InterviewProfile {
            company: var("INTERVIEW_COMPANY").unwrap_or(defaults.company),
            role: var("INTERVIEW_ROLE").unwrap_or(defaults.role),
        };

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        let config = Self {
            provider,
            gemini_api_key,
            gemini_model,
            speech_output,
            elevenlabs_api_key,
            elevenlabs_voice_id,
            output_device: var("OUTPUT_DEVICE"),
            recognizer,
            profile,
            prompts_dir: var("PROMPTS_DIR").map(PathBuf::from),
            log_level,
        };

        if config.provider == QuestionProvider::Gemini && config.gemini_api_key.is_none() {
            return Err(ConfigError::MissingVar(
                "GEMINI_API_KEY must be set for the gemini provider".to_string(),
            ));
        }
        if config.speech_output == SpeechOutputKind::ElevenLabs
            && config.elevenlabs_api_key.is_none()
        {
            return Err(ConfigError::MissingVar(
                "ELEVENLABS_API_KEY must be set for elevenlabs speech output".to_string(),
            ));
        }

        Ok(config)
    }
}
