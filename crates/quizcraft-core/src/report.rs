//! Attempt reports with JSON persistence and attempt-to-attempt comparison.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::certificate::Certificate;
use crate::model::{AnswerValue, QuizContext, QuizDefinition, QuizResult};

/// A graded attempt with enough of the quiz attached to review it later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// Summary of the quiz.
    pub quiz: QuizSummary,
    pub context: QuizContext,
    pub result: QuizResult,
    #[serde(default)]
    pub certificate: Option<Certificate>,
    /// Per-question breakdown in quiz order.
    pub review: Vec<QuestionReview>,
}

/// Summary of a quiz (without the full question definitions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSummary {
    pub id: String,
    pub title: String,
    pub course_id: String,
    pub question_count: usize,
    pub max_points: u32,
}

/// One question as it appears in a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionReview {
    pub question_id: String,
    pub prompt: String,
    pub points: u32,
    /// `None` when the learner never answered.
    pub given: Option<AnswerValue>,
    pub correct_answer: String,
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub explanation: String,
}

impl QuizReport {
    pub fn new(
        quiz: &QuizDefinition,
        context: QuizContext,
        result: QuizResult,
        certificate: Option<Certificate>,
    ) -> Self {
        let review = quiz
            .questions
            .iter()
            .map(|q| {
                let answer = result.answers.iter().find(|a| a.question_id == q.id);
                QuestionReview {
                    question_id: q.id.clone(),
                    prompt: q.prompt.clone(),
                    points: q.points,
                    given: answer.map(|a| a.value.clone()),
                    correct_answer: q.correct_answer.clone(),
                    is_correct: answer.and_then(|a| a.is_correct),
                    explanation: q.explanation.clone(),
                }
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            quiz: QuizSummary {
                id: quiz.id.clone(),
                title: quiz.title.clone(),
                course_id: quiz.course_id.clone(),
                question_count: quiz.questions.len(),
                max_points: quiz.max_points(),
            },
            context,
            result,
            certificate,
            review,
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: QuizReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Compare this attempt against an earlier one.
    pub fn compare(&self, baseline: &QuizReport) -> AttemptComparison {
        let mut newly_correct = Vec::new();
        let mut newly_incorrect = Vec::new();
        let mut unchanged = 0usize;

        for current in &self.review {
            let before = baseline
                .review
                .iter()
                .find(|r| r.question_id == current.question_id)
                .and_then(|r| r.is_correct)
                .unwrap_or(false);
            let now = current.is_correct.unwrap_or(false);

            match (before, now) {
                (false, true) => newly_correct.push(current.question_id.clone()),
                (true, false) => newly_incorrect.push(current.question_id.clone()),
                _ => unchanged += 1,
            }
        }

        AttemptComparison {
            quiz_id: self.quiz.id.clone(),
            baseline_attempt: baseline.result.attempt,
            current_attempt: self.result.attempt,
            baseline_score: baseline.result.score,
            current_score: self.result.score,
            delta: self.result.score as i64 - baseline.result.score as i64,
            baseline_passed: baseline.result.passed,
            current_passed: self.result.passed,
            newly_correct,
            newly_incorrect,
            unchanged,
        }
    }
}

/// Result of comparing two attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptComparison {
    pub quiz_id: String,
    pub baseline_attempt: u32,
    pub current_attempt: u32,
    pub baseline_score: u32,
    pub current_score: u32,
    /// Score change in percentage points.
    pub delta: i64,
    pub baseline_passed: bool,
    pub current_passed: bool,
    /// Questions wrong or unanswered before and right now.
    pub newly_correct: Vec<String>,
    /// Questions right before and wrong or unanswered now.
    pub newly_incorrect: Vec<String>,
    pub unchanged: usize,
}

impl AttemptComparison {
    /// Format the comparison as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**{}:** attempt {} scored {}%, attempt {} scored {}% ({:+})\n\n",
            self.quiz_id,
            self.baseline_attempt,
            self.baseline_score,
            self.current_attempt,
            self.current_score,
            self.delta
        ));

        md.push_str("| Attempt | Score | Outcome |\n");
        md.push_str("|---------|-------|---------|\n");
        for (attempt, score, passed) in [
            (self.baseline_attempt, self.baseline_score, self.baseline_passed),
            (self.current_attempt, self.current_score, self.current_passed),
        ] {
            md.push_str(&format!(
                "| {} | {}% | {} |\n",
                attempt,
                score,
                if passed { "passed" } else { "failed" }
            ));
        }
        md.push('\n');

        if !self.newly_correct.is_empty() {
            md.push_str("### Now correct\n\n");
            for id in &self.newly_correct {
                md.push_str(&format!("- {id}\n"));
            }
            md.push('\n');
        }

        if !self.newly_incorrect.is_empty() {
            md.push_str("### Now incorrect\n\n");
            for id in &self.newly_incorrect {
                md.push_str(&format!("- {id}\n"));
            }
            md.push('\n');
        }

        md.push_str(&format!("{} questions unchanged\n", self.unchanged));
        md
    }

    pub fn has_regressions(&self) -> bool {
        !self.newly_incorrect.is_empty() || self.delta < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuestionType, QuizAnswer, QuizConfig, QuizQuestion};
    use crate::scoring::{grade, AttemptInfo};
    use std::collections::HashMap;

    fn quiz() -> QuizDefinition {
        let question = |id: &str, correct: &str| QuizQuestion {
            id: id.into(),
            prompt: format!("Prompt {id}"),
            question_type: QuestionType::MultipleChoice,
            options: vec!["A".into(), "B".into()],
            correct_answer: correct.into(),
            points: 1,
            time_limit_secs: None,
            explanation: format!("Because {correct}"),
        };
        QuizDefinition {
            id: "quiz-1".into(),
            title: "Quiz One".into(),
            description: String::new(),
            course_id: "course".into(),
            module_id: None,
            config: QuizConfig::default(),
            questions: vec![question("q1", "A"), question("q2", "B"), question("q3", "A")],
        }
    }

    fn report_with(quiz: &QuizDefinition, attempt: u32, picks: &[(&str, &str)]) -> QuizReport {
        let answers: HashMap<String, QuizAnswer> = picks
            .iter()
            .map(|(id, v)| {
                (
                    id.to_string(),
                    QuizAnswer {
                        question_id: id.to_string(),
                        value: AnswerValue::single(*v),
                        is_correct: None,
                        time_spent_secs: 1,
                        submitted_at: Utc::now(),
                    },
                )
            })
            .collect();
        let result = grade(
            &quiz.questions,
            &answers,
            &quiz.config,
            AttemptInfo {
                attempt,
                time_spent_secs: 30,
            },
        );
        QuizReport::new(quiz, quiz.context_for("l1", "Lee"), result, None)
    }

    #[test]
    fn review_lists_every_question() {
        let quiz = quiz();
        let report = report_with(&quiz, 1, &[("q1", "A"), ("q2", "A")]);
        assert_eq!(report.quiz.question_count, 3);
        assert_eq!(report.review.len(), 3);
        assert_eq!(report.review[0].is_correct, Some(true));
        assert_eq!(report.review[1].is_correct, Some(false));
        assert_eq!(report.review[2].given, None);
        assert_eq!(report.review[2].is_correct, None);
        assert_eq!(report.review[1].explanation, "Because B");
    }

    #[test]
    fn save_and_load_report() {
        let quiz = quiz();
        let report = report_with(&quiz, 1, &[("q1", "A")]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");

        report.save_json(&path).unwrap();
        let loaded = QuizReport::load_json(&path).unwrap();
        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.result, report.result);
        assert_eq!(loaded.review.len(), 3);
    }

    #[test]
    fn load_missing_report_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(QuizReport::load_json(&dir.path().join("nope.json")).is_err());
    }

    #[test]
    fn compare_attempts() {
        let quiz = quiz();
        let first = report_with(&quiz, 1, &[("q1", "B"), ("q2", "B")]);
        let second = report_with(&quiz, 2, &[("q1", "A"), ("q2", "A"), ("q3", "A")]);

        let cmp = second.compare(&first);
        assert_eq!(cmp.baseline_score, 50);
        assert_eq!(cmp.current_score, 67);
        assert_eq!(cmp.delta, 17);
        assert_eq!(cmp.newly_correct, vec!["q1", "q3"]);
        assert_eq!(cmp.newly_incorrect, vec!["q2"]);
        assert_eq!(cmp.unchanged, 0);
        assert!(cmp.has_regressions());

        let md = cmp.to_markdown();
        assert!(md.contains("attempt 1 scored 50%"));
        assert!(md.contains("(+17)"));
        assert!(md.contains("### Now incorrect"));
    }

    #[test]
    fn compare_identical_attempts() {
        let quiz = quiz();
        let first = report_with(&quiz, 1, &[("q1", "A")]);
        let second = report_with(&quiz, 2, &[("q1", "A")]);
        let cmp = second.compare(&first);
        assert_eq!(cmp.delta, 0);
        assert_eq!(cmp.unchanged, 3);
        assert!(!cmp.has_regressions());
    }
}
