use serde::{Deserialize, Serialize};

/// Answer recorded for a question when nothing was transcribed.
pub const NO_ANSWER: &str = "(no answer)";

/// A single generated interview question. Its identity is its position in the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionItem {
    pub question: String,
    pub topic: String,
}

impl QuestionItem {
    pub fn new(question: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            topic: topic.into(),
        }
    }
}

/// One committed question/topic/answer record, produced when the user finishes a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub topic: String,
    pub answer: String,
}

impl QaPair {
    /// Builds the pair for `item`, falling back to [`NO_ANSWER`] when `answer` is blank.
    pub fn from_answer(item: &QuestionItem, answer: &str) -> Self {
        let answer = answer.trim();
        Self {
            question: item.question.clone(),
            topic: item.topic.clone(),
            answer: if answer.is_empty() {
                NO_ANSWER.to_string()
            } else {
                answer.to_string()
            },
        }
    }

    pub fn is_unanswered(&self) -> bool {
        self.answer == NO_ANSWER
    }
}

/// Scored critique of a whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResult {
    pub overall_score: u8,
    pub overall_remark: String,
    pub breakdown: Vec<FeedbackItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackItem {
    pub question: String,
    pub answer: String,
    pub topic: String,
    pub score: u8,
    pub remark: String,
    pub suggested_answer: String,
}
