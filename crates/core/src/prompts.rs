use std::collections::HashMap;

use crate::model::QaPair;

pub const QUESTIONS_PROMPT: &str = "questions";
pub const FEEDBACK_PROMPT: &str = "feedback";

const DEFAULT_QUESTIONS: &str = include_str!("../prompts/questions.md");
const DEFAULT_FEEDBACK: &str = include_str!("../prompts/feedback.md");

/// Who the candidate is interviewing with. Only used to fill prompt templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterviewProfile {
    pub company: String,
    pub role: String,
}

impl Default for InterviewProfile {
    fn default() -> Self {
        Self {
            company: "a well-known tech company".to_string(),
            role: "Software Engineer".to_string(),
        }
    }
}

/// The prompt templates used by the question source and the evaluator.
///
/// Templates use `{placeholder}` markers. Unknown markers are left untouched,
/// so literal JSON braces in a template survive rendering.
#[derive(Debug, Clone)]
pub struct PromptSet {
    questions: String,
    feedback: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            questions: DEFAULT_QUESTIONS.to_string(),
            feedback: DEFAULT_FEEDBACK.to_string(),
        }
    }
}

impl PromptSet {
    /// Builds a prompt set from loaded templates keyed by file stem, keeping
    /// the built-in template for any key that is missing.
    pub fn with_overrides(mut overrides: HashMap<String, String>) -> Self {
        let mut prompts = Self::default();
        if let Some(questions) = overrides.remove(QUESTIONS_PROMPT) {
            prompts.questions = questions;
        }
        if let Some(feedback) = overrides.remove(FEEDBACK_PROMPT) {
            prompts.feedback = feedback;
        }
        for unused in overrides.keys() {
            tracing::warn!("Ignoring unknown prompt template '{}'", unused);
        }
        prompts
    }

    pub fn questions(&self, profile: &InterviewProfile, count: usize) -> String {
        render(
            &self.questions,
            &[
                ("company", &profile.company),
                ("role", &profile.role),
                ("count", &count.to_string()),
            ],
        )
    }

    pub fn feedback(&self, pairs: &[QaPair]) -> String {
        render(&self.feedback, &[("pairs", &format_pairs(pairs))])
    }
}

/// Lists the pairs the way the feedback prompt expects them.
pub fn format_pairs(pairs: &[QaPair]) -> String {
    pairs
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let answer = if p.answer.trim().is_empty() || p.is_unanswered() {
                "(no answer given)"
            } else {
                p.answer.as_str()
            };
            format!("Q{} [{}]: {}\nAnswer: {}", i + 1, p.topic, p.question, answer)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NO_ANSWER, QuestionItem};

    #[test]
    fn question_prompt_fills_profile_and_count() {
        let prompts = PromptSet::default();
        let profile = InterviewProfile {
            company: "Qualcomm".to_string(),
            role: "Software Engineering Intern".to_string(),
        };

        let prompt = prompts.questions(&profile, 3);

        assert!(prompt.contains("senior interviewer at Qualcomm"));
        assert!(prompt.contains("top 3 technical interview questions"));
        assert!(!prompt.contains("{company}"));
        assert!(prompt.contains(r#"{"question": "...", "topic": "..."}"#));
    }

    #[test]
    fn feedback_prompt_lists_pairs_in_order() {
        let pairs = vec![
            QaPair::from_answer(&QuestionItem::new("What is TCP?", "Networking"), "A protocol"),
            QaPair::from_answer(&QuestionItem::new("What is a heap?", "Memory"), ""),
        ];

        let prompt = PromptSet::default().feedback(&pairs);

        let first = prompt.find("Q1 [Networking]: What is TCP?\nAnswer: A protocol").unwrap();
        let second = prompt.find("Q2 [Memory]: What is a heap?\nAnswer: (no answer given)").unwrap();
        assert!(first < second);
        assert!(!prompt.contains(NO_ANSWER));
        assert!(prompt.contains("\"overallScore\""));
    }

    #[test]
    fn overrides_replace_only_known_templates() {
        let mut overrides = HashMap::new();
        overrides.insert("questions".to_string(), "Ask {count} things about {role}".to_string());
        overrides.insert("unrelated".to_string(), "ignored".to_string());

        let prompts = PromptSet::with_overrides(overrides);

        assert_eq!(
            prompts.questions(&InterviewProfile::default(), 2),
            "Ask 2 things about Software Engineer"
        );
        assert!(prompts.feedback(&[]).contains("recruiter"));
    }
}
