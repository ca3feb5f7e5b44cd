use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use interview_core::{FeedbackResult, QaPair};
use serde::{Deserialize, Serialize};

/// What is saved after a session: the committed pairs and, when evaluation
/// succeeded, its feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub pairs: Vec<QaPair>,
    pub feedback: Option<FeedbackResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_error: Option<String>,
}

impl SessionReport {
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        tracing::info!("Saved session report to {}", path.display());
        Ok(())
    }
}

pub fn render_score_card(feedback: &FeedbackResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Overall score: {}/100", feedback.overall_score);
    let _ = writeln!(out, "{}", feedback.overall_remark);
    for (i, item) in feedback.breakdown.iter().enumerate() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Q{} [{}] {}/100", i + 1, item.topic, item.score);
        let _ = writeln!(out, "  {}", item.question);
        let _ = writeln!(out, "  Your answer: {}", item.answer);
        let _ = writeln!(out, "  {}", item.remark);
        let _ = writeln!(out, "  Suggested: {}", item.suggested_answer);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_core::{FeedbackItem, QuestionItem};
    use tempfile::tempdir;

    fn feedback() -> FeedbackResult {
        FeedbackResult {
            overall_score: 72,
            overall_remark: "Solid fundamentals.".to_string(),
            breakdown: vec![FeedbackItem {
                question: "What is a mutex?".to_string(),
                answer: "A lock".to_string(),
                topic: "Concurrency".to_string(),
                score: 72,
                remark: "Mention poisoning.".to_string(),
                suggested_answer: "A mutual exclusion lock that...".to_string(),
            }],
        }
    }

    #[test]
    fn score_card_lists_every_question() {
        let card = render_score_card(&feedback());

        assert!(card.starts_with("Overall score: 72/100\n"));
        assert!(card.contains("Q1 [Concurrency] 72/100"));
        assert!(card.contains("Your answer: A lock"));
    }

    #[test]
    fn saves_pairs_even_without_feedback() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("session.json");
        let report = SessionReport {
            pairs: vec![QaPair::from_answer(&QuestionItem::new("Q?", "T"), "")],
            feedback: None,
            evaluation_error: Some("feedback timed out".to_string()),
        };

        report.save(&path)?;

        let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(saved["pairs"][0]["answer"], "(no answer)");
        assert!(saved["feedback"].is_null());
        assert_eq!(saved["evaluationError"], "feedback timed out");
        Ok(())
    }

    #[test]
    fn saved_report_reads_back() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("report.json");
        let report = SessionReport {
            pairs: vec![QaPair::from_answer(&QuestionItem::new("What is a mutex?", "Concurrency"), "A lock")],
            feedback: Some(feedback()),
            evaluation_error: None,
        };

        report.save(&path)?;
        let text = fs::read_to_string(&path)?;

        assert!(text.contains("\"overallScore\": 72"));
        assert!(!text.contains("evaluationError"));
        assert_eq!(serde_json::from_str::<SessionReport>(&text)?, report);
        Ok(())
    }

    #[test]
    fn saving_into_a_missing_directory_fails() {
        let report = SessionReport {
            pairs: Vec::new(),
            feedback: None,
            evaluation_error: None,
        };
        assert!(report.save(Path::new("no_such_dir_for_reports/out.json")).is_err());
    }
}
