use std::num::NonZeroUsize;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::GenerationError;
use crate::gemini::{GeminiClient, GenerationConfig};
use crate::model::QuestionItem;
use crate::prompts::{InterviewProfile, PromptSet};

// The `QuestionSource` trait is the one upfront call a session makes. It is
// called exactly once per session and is never retried by the session itself.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Produces exactly `count` questions, in the order they will be asked.
    async fn generate(&self, count: NonZeroUsize) -> Result<Vec<QuestionItem>, GenerationError>;
}

const QUESTION_GENERATION: GenerationConfig = GenerationConfig {
    temperature: 0.8,
    max_output_tokens: 1000,
};

/// Generates the batch with a single Gemini call.
pub struct GeminiQuestionSource {
    client: GeminiClient,
    prompts: PromptSet,
    profile: InterviewProfile,
}

impl GeminiQuestionSource {
    pub fn new(client: GeminiClient, prompts: PromptSet, profile: InterviewProfile) -> Self {
        Self {
            client,
            prompts,
            profile,
        }
    }
}

#[async_trait]
impl QuestionSource for GeminiQuestionSource {
    async fn generate(&self, count: NonZeroUsize) -> Result<Vec<QuestionItem>, GenerationError> {
        let prompt = self.prompts.questions(&self.profile, count.get());
        tracing::info!(
            "Requesting {} questions for {} at {} from {}",
            count,
            self.profile.role,
            self.profile.company,
            self.client.model()
        );

        let raw = self
            .client
            .generate(&prompt, QUESTION_GENERATION)
            .await
            .map_err(|e| GenerationError::Request(format!("{e:#}")))?;

        parse_questions(&raw, count.get())
    }
}

/// Parses a model reply into exactly `expected` questions.
pub fn parse_questions(raw: &str, expected: usize) -> Result<Vec<QuestionItem>, GenerationError> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| GenerationError::Malformed(format!("not valid JSON: {e}")))?;

    if !value.is_array() {
        return Err(GenerationError::Malformed(
            "expected a JSON array of questions".to_string(),
        ));
    }

    let items: Vec<QuestionItem> = serde_json::from_value(value)
        .map_err(|e| GenerationError::Malformed(format!("unexpected item shape: {e}")))?;

    if items.is_empty() {
        return Err(GenerationError::Malformed("empty question array".to_string()));
    }
    if let Some(pos) = items.iter().position(|q| q.question.trim().is_empty()) {
        return Err(GenerationError::Malformed(format!(
            "question {} has no text",
            pos + 1
        )));
    }
    if items.len() != expected {
        return Err(GenerationError::WrongCount {
            expected,
            actual: items.len(),
        });
    }

    Ok(items
        .into_iter()
        .map(|q| QuestionItem::new(q.question.trim(), q.topic.trim()))
        .collect())
}
