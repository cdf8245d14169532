//! Core data model types for quizcraft.
//!
//! These are the fundamental types the whole system uses to represent
//! questions, answers, session configuration, and graded results.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of a quiz question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionType::MultipleChoice => write!(f, "multiple_choice"),
            QuestionType::TrueFalse => write!(f, "true_false"),
            QuestionType::ShortAnswer => write!(f, "short_answer"),
        }
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "multiple_choice" | "mcq" | "choice" => Ok(QuestionType::MultipleChoice),
            "true_false" | "tf" | "boolean" => Ok(QuestionType::TrueFalse),
            "short_answer" | "text" => Ok(QuestionType::ShortAnswer),
            other => Err(format!("unknown question type: {other}")),
        }
    }
}

/// A single question. Never mutated once a session holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    /// Unique identifier within the quiz.
    pub id: String,
    /// The text shown to the learner.
    pub prompt: String,
    pub question_type: QuestionType,
    /// Choices offered for choice questions. Empty for short answers.
    #[serde(default)]
    pub options: Vec<String>,
    /// Correct answer; comma-separated when several options must be picked.
    pub correct_answer: String,
    /// Points awarded when answered correctly.
    #[serde(default = "default_points")]
    pub points: u32,
    /// Optional per-question countdown in seconds.
    #[serde(default)]
    pub time_limit_secs: Option<u64>,
    /// Shown after grading (or immediately in immediate-feedback mode).
    #[serde(default)]
    pub explanation: String,
}

fn default_points() -> u32 {
    1
}

impl QuizQuestion {
    /// The comma-split, trimmed correct-answer tokens. Duplicates are kept.
    pub fn correct_tokens(&self) -> Vec<&str> {
        self.correct_answer.split(',').map(str::trim).collect()
    }

    /// Whether the learner is expected to pick several options.
    pub fn is_multi_select(&self) -> bool {
        self.question_type == QuestionType::MultipleChoice && self.correct_tokens().len() > 1
    }
}

/// A submitted answer value.
///
/// Multi-select answers keep the learner's selection as given, duplicates
/// included, because the evaluator compares lengths before membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Single(String),
    Multiple(Vec<String>),
}

impl AnswerValue {
    pub fn single(value: impl Into<String>) -> Self {
        AnswerValue::Single(value.into())
    }

    pub fn multiple<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AnswerValue::Multiple(values.into_iter().map(Into::into).collect())
    }

    /// True when nothing meaningful was entered or selected.
    pub fn is_blank(&self) -> bool {
        match self {
            AnswerValue::Single(v) => v.trim().is_empty(),
            AnswerValue::Multiple(vs) => vs.is_empty(),
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Single(v) => write!(f, "{v}"),
            AnswerValue::Multiple(vs) => write!(f, "{}", vs.join(", ")),
        }
    }
}

/// Session behaviour switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizConfig {
    /// Minimum score percentage to pass.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: u32,
    /// Whole-quiz countdown in seconds. `None` disables the timer.
    #[serde(default)]
    pub time_limit_secs: Option<u64>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_true")]
    pub show_progress: bool,
    #[serde(default = "default_true")]
    pub show_timer: bool,
    /// Display-only correctness preview before submission.
    #[serde(default)]
    pub immediate_feedback: bool,
    #[serde(default = "default_true")]
    pub allow_retake: bool,
    /// Reject manual submission while questions are unanswered.
    #[serde(default)]
    pub require_all_questions: bool,
    /// Submit automatically when the countdown hits zero.
    #[serde(default = "default_true")]
    pub auto_submit: bool,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            pass_threshold: default_pass_threshold(),
            time_limit_secs: None,
            max_attempts: default_max_attempts(),
            show_progress: true,
            show_timer: true,
            immediate_feedback: false,
            allow_retake: true,
            require_all_questions: false,
            auto_submit: true,
        }
    }
}

fn default_pass_threshold() -> u32 {
    70
}

fn default_max_attempts() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

/// Who is taking which quiz, and where it sits in the course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizContext {
    pub quiz_id: String,
    pub course_id: String,
    #[serde(default)]
    pub module_id: Option<String>,
    pub learner_id: String,
    pub learner_name: String,
}

/// An answer as held by a session. `is_correct` is only set at submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAnswer {
    pub question_id: String,
    pub value: AnswerValue,
    #[serde(default)]
    pub is_correct: Option<bool>,
    /// Seconds spent on the question before this answer was stored.
    pub time_spent_secs: u64,
    pub submitted_at: DateTime<Utc>,
}

/// A graded attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    /// Percentage score, 0..=100.
    pub score: u32,
    pub correct_count: usize,
    pub total_questions: usize,
    pub answered_count: usize,
    pub earned_points: u32,
    /// Sum of points over answered questions only.
    pub total_points: u32,
    pub time_spent_secs: u64,
    pub passed: bool,
    pub pass_threshold: u32,
    /// Evaluated answers in question order.
    pub answers: Vec<QuizAnswer>,
    pub feedback: String,
    pub can_retake: bool,
    pub attempts_remaining: u32,
    pub attempt: u32,
    pub completed_at: DateTime<Utc>,
}

/// Pass/fail outcome of a submitted attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Submitted(Outcome),
}

impl SessionStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::InProgress)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::NotStarted => write!(f, "not started"),
            SessionStatus::InProgress => write!(f, "in progress"),
            SessionStatus::Submitted(Outcome::Passed) => write!(f, "passed"),
            SessionStatus::Submitted(Outcome::Failed) => write!(f, "failed"),
        }
    }
}

/// A quiz as authored: metadata, configuration, and questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizDefinition {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub course_id: String,
    #[serde(default)]
    pub module_id: Option<String>,
    #[serde(default)]
    pub config: QuizConfig,
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
}

impl QuizDefinition {
    /// Build the session context for a learner taking this quiz.
    pub fn context_for(&self, learner_id: &str, learner_name: &str) -> QuizContext {
        QuizContext {
            quiz_id: self.id.clone(),
            course_id: self.course_id.clone(),
            module_id: self.module_id.clone(),
            learner_id: learner_id.to_string(),
            learner_name: learner_name.to_string(),
        }
    }

    /// Total points over all questions, saturating at `u32::MAX`.
    pub fn max_points(&self) -> u32 {
        self.questions
            .iter()
            .fold(0u32, |total, q| total.saturating_add(q.points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct: &str) -> QuizQuestion {
        QuizQuestion {
            id: "q1".into(),
            prompt: "Pick".into(),
            question_type: QuestionType::MultipleChoice,
            options: vec!["A".into(), "B".into(), "C".into()],
            correct_answer: correct.into(),
            points: 1,
            time_limit_secs: None,
            explanation: String::new(),
        }
    }

    #[test]
    fn question_type_display_and_parse() {
        assert_eq!(QuestionType::TrueFalse.to_string(), "true_false");
        assert_eq!(
            "multiple-choice".parse::<QuestionType>().unwrap(),
            QuestionType::MultipleChoice
        );
        assert_eq!("TF".parse::<QuestionType>().unwrap(), QuestionType::TrueFalse);
        assert_eq!(
            "text".parse::<QuestionType>().unwrap(),
            QuestionType::ShortAnswer
        );
        assert!("essay".parse::<QuestionType>().is_err());
    }

    #[test]
    fn correct_tokens_are_trimmed_not_deduplicated() {
        let q = question(" A , B,A ");
        assert_eq!(q.correct_tokens(), vec!["A", "B", "A"]);
        assert!(q.is_multi_select());
        assert!(!question("A").is_multi_select());
    }

    #[test]
    fn answer_value_untagged_serde() {
        let single: AnswerValue = serde_json::from_str("\"B\"").unwrap();
        assert_eq!(single, AnswerValue::single("B"));
        let multi: AnswerValue = serde_json::from_str("[\"A\",\"C\"]").unwrap();
        assert_eq!(multi, AnswerValue::multiple(["A", "C"]));
        assert_eq!(multi.to_string(), "A, C");
    }

    #[test]
    fn blank_answers() {
        assert!(AnswerValue::single("  ").is_blank());
        assert!(AnswerValue::Multiple(vec![]).is_blank());
        assert!(!AnswerValue::single("x").is_blank());
    }

    #[test]
    fn config_defaults() {
        let config = QuizConfig::default();
        assert_eq!(config.pass_threshold, 70);
        assert_eq!(config.max_attempts, 3);
        assert!(config.auto_submit);
        assert!(config.allow_retake);
        assert!(!config.require_all_questions);

        let parsed: QuizConfig = toml::from_str("pass_threshold = 80").unwrap();
        assert_eq!(parsed.pass_threshold, 80);
        assert_eq!(parsed.max_attempts, 3);
    }

    #[test]
    fn max_points_saturates() {
        let big = QuizQuestion {
            points: u32::MAX / 2 + 1,
            ..question("A")
        };
        let quiz = QuizDefinition {
            id: "quiz".into(),
            title: "Quiz".into(),
            description: String::new(),
            course_id: "course".into(),
            module_id: None,
            config: QuizConfig::default(),
            questions: vec![big.clone(), big],
        };
        assert_eq!(quiz.max_points(), u32::MAX);
    }
}
