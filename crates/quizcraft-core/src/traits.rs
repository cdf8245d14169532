//! Collaborator traits for question loading and result delivery.
//!
//! These async traits are implemented by `quizcraft-sinks` (delivery) and by
//! [`crate::parser::TomlQuestionSource`] (loading). The engine treats every
//! implementation as an opaque external service.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::certificate::Certificate;
use crate::model::{QuizContext, QuizQuestion, QuizResult};

// ---------------------------------------------------------------------------
// Question source
// ---------------------------------------------------------------------------

/// Supplies the ordered question list for a quiz.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn fetch_questions(&self, quiz_id: &str) -> anyhow::Result<Vec<QuizQuestion>>;
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// A graded attempt together with who took which quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub context: QuizContext,
    pub result: QuizResult,
}

/// Accepts completed results for persistence or analytics.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Human-readable sink name (e.g. "json_dir").
    fn name(&self) -> &str;

    async fn record_result(&self, envelope: &ResultEnvelope) -> anyhow::Result<()>;
}

/// Accepts certificates when they are earned.
#[async_trait]
pub trait CertificateSink: Send + Sync {
    fn name(&self) -> &str;

    async fn record_certificate(&self, certificate: &Certificate) -> anyhow::Result<()>;
}

/// Accepts discrete, purely observational events.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    fn name(&self) -> &str;

    async fn track(&self, event: &AnalyticsEvent) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Analytics events
// ---------------------------------------------------------------------------

/// Named analytics events emitted by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    QuizStarted,
    AnswerSelected,
    QuizSubmitted,
    QuizCompleted,
    QuizTimedOut,
    QuizRetakeStarted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::QuizStarted => "quiz_started",
            EventKind::AnswerSelected => "answer_selected",
            EventKind::QuizSubmitted => "quiz_submitted",
            EventKind::QuizCompleted => "quiz_completed",
            EventKind::QuizTimedOut => "quiz_timed_out",
            EventKind::QuizRetakeStarted => "quiz_retake_started",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single analytics event with a free-form payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub kind: EventKind,
    pub quiz_id: String,
    pub learner_id: String,
    pub attempt: u32,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl AnalyticsEvent {
    pub fn new(kind: EventKind, context: &QuizContext, attempt: u32, payload: serde_json::Value) -> Self {
        Self {
            kind,
            quiz_id: context.quiz_id.clone(),
            learner_id: context.learner_id.clone(),
            attempt,
            payload,
            occurred_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names() {
        assert_eq!(EventKind::AnswerSelected.to_string(), "answer_selected");
        assert_eq!(EventKind::QuizRetakeStarted.as_str(), "quiz_retake_started");
        let json = serde_json::to_string(&EventKind::QuizCompleted).unwrap();
        assert_eq!(json, "\"quiz_completed\"");
    }

    #[test]
    fn event_carries_context() {
        let context = QuizContext {
            quiz_id: "q".into(),
            course_id: "c".into(),
            module_id: None,
            learner_id: "l".into(),
            learner_name: "L".into(),
        };
        let event = AnalyticsEvent::new(
            EventKind::QuizSubmitted,
            &context,
            2,
            serde_json::json!({ "score": 50 }),
        );
        assert_eq!(event.quiz_id, "q");
        assert_eq!(event.learner_id, "l");
        assert_eq!(event.attempt, 2);
        assert_eq!(event.payload["score"], 50);
    }
}
