use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::EvaluationError;
use crate::gemini::{GeminiClient, GenerationConfig};
use crate::model::{FeedbackResult, QaPair};
use crate::prompts::PromptSet;

/// Scores a finished session. There is one success path and one failure path;
/// any fallback or demo content belongs to the caller.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FeedbackEvaluator: Send + Sync {
    async fn evaluate(&self, pairs: &[QaPair]) -> Result<FeedbackResult, EvaluationError>;
}

const FEEDBACK_GENERATION: GenerationConfig = GenerationConfig {
    temperature: 0.3,
    max_output_tokens: 2000,
};

pub struct GeminiEvaluator {
    client: GeminiClient,
    prompts: PromptSet,
}

impl GeminiEvaluator {
    pub fn new(client: GeminiClient, prompts: PromptSet) -> Self {
        Self { client, prompts }
    }
}

#[async_trait]
impl FeedbackEvaluator for GeminiEvaluator {
    async fn evaluate(&self, pairs: &[QaPair]) -> Result<FeedbackResult, EvaluationError> {
        let prompt = self.prompts.feedback(pairs);
        tracing::info!("Requesting feedback for {} answers", pairs.len());

        let raw = self
            .client
            .generate(&prompt, FEEDBACK_GENERATION)
            .await
            .map_err(|e| EvaluationError::Request(format!("{e:#}")))?;

        parse_feedback(&raw, pairs.len())
    }
}

/// Parses and validates a feedback reply for `expected` answers.
pub fn parse_feedback(raw: &str, expected: usize) -> Result<FeedbackResult, EvaluationError> {
    let feedback: FeedbackResult = serde_json::from_str(raw)
        .map_err(|e| EvaluationError::Malformed(format!("unexpected feedback shape: {e}")))?;

    if feedback.overall_score > 100 {
        return Err(EvaluationError::Malformed(format!(
            "overall score {} is out of range",
            feedback.overall_score
        )));
    }
    if let Some(item) = feedback.breakdown.iter().find(|b| b.score > 100) {
        return Err(EvaluationError::Malformed(format!(
            "score {} for '{}' is out of range",
            item.score, item.question
        )));
    }
    if feedback.breakdown.len() != expected {
        return Err(EvaluationError::Malformed(format!(
            "expected {} breakdown entries, got {}",
            expected,
            feedback.breakdown.len()
        )));
    }

    Ok(feedback)
}
