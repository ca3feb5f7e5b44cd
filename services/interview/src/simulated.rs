//! Offline stand-ins for the Gemini question source and evaluator.
//!
//! Neither makes a network call. Questions come from a fixed bank and
//! feedback is scored with a word-count heuristic, so the whole interview
//! loop can be exercised without API keys.

use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use interview_core::{
    EvaluationError, FeedbackEvaluator, FeedbackItem, FeedbackResult, GenerationError, QaPair,
    QuestionItem, QuestionSource,
};

const QUESTION_BANK: &[(&str, &str)] = &[
    (
        "Walk me through what happens when you type a URL into a browser and press enter.",
        "Networking",
    ),
    (
        "How would you find and fix a memory leak in a long-running service?",
        "Debugging",
    ),
    (
        "Explain the difference between a process and a thread.",
        "Operating Systems",
    ),
    (
        "How would you design a rate limiter for a public API?",
        "System Design",
    ),
    (
        "When would you pick a hash map over a balanced tree?",
        "Data Structures",
    ),
    (
        "Tell me about a time you disagreed with a teammate on a technical decision.",
        "Behavioral",
    ),
    (
        "How do database indexes speed up reads, and what do they cost?",
        "Databases",
    ),
    (
        "Design a system that deduplicates events arriving from many producers at high volume.",
        "Distributed Systems",
    ),
];

/// Serves questions from a fixed bank, cycling it when more are requested.
#[derive(Debug, Default)]
pub struct ScriptedQuestionSource {
    latency: Duration,
}

impl ScriptedQuestionSource {
    /// Waits `latency` before answering, to mimic a model call.
    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl QuestionSource for ScriptedQuestionSource {
    async fn generate(&self, count: NonZeroUsize) -> Result<Vec<QuestionItem>, GenerationError> {
        tokio::time::sleep(self.latency).await;

        let questions = (0..count.get())
            .map(|i| {
                let (question, topic) = QUESTION_BANK[i % QUESTION_BANK.len()];
                match i / QUESTION_BANK.len() {
                    0 => QuestionItem::new(question, topic),
                    round => QuestionItem::new(question, format!("{topic} ({})", round + 1)),
                }
            })
            .collect();
        Ok(questions)
    }
}

/// Scores answers by length: a missing answer gets 0, longer answers score
/// higher up to a cap.
#[derive(Debug, Default)]
pub struct ScriptedEvaluator;

impl ScriptedEvaluator {
    fn score(pair: &QaPair) -> u8 {
        if pair.is_unanswered() {
            return 0;
        }
        let words = pair.answer.split_whitespace().count();
        (20 + words * 3).min(90) as u8
    }

    fn remark(score: u8) -> &'static str {
        match score {
            0 => "No answer was given.",
            1..=39 => "Too brief to show your understanding.",
            40..=69 => "A reasonable start; add specifics and trade-offs.",
            _ => "Thorough and well structured.",
        }
    }
}

#[async_trait]
impl FeedbackEvaluator for ScriptedEvaluator {
    async fn evaluate(&self, pairs: &[QaPair]) -> Result<FeedbackResult, EvaluationError> {
        let breakdown: Vec<FeedbackItem> = pairs
            .iter()
            .map(|pair| {
                let score = Self::score(pair);
                FeedbackItem {
                    question: pair.question.clone(),
                    answer: pair.answer.clone(),
                    topic: pair.topic.clone(),
                    score,
                    remark: Self::remark(score).to_string(),
                    suggested_answer: format!(
                        "Define the core idea of {}, explain how it works, and close with a concrete example.",
                        pair.topic
                    ),
                }
            })
            .collect();

        let overall_score = if breakdown.is_empty() {
            0
        } else {
            let total: usize = breakdown.iter().map(|b| b.score as usize).sum();
            (total as f64 / breakdown.len() as f64).round() as u8
        };

        Ok(FeedbackResult {
            overall_score,
            overall_remark: Self::remark(overall_score).to_string(),
            breakdown,
        })
    }
}
