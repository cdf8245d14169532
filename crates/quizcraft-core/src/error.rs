//! Quiz session error types.
//!
//! Returned by the session state machine when an operation is not valid for
//! the session's current state. None of these leave the session modified.

use thiserror::Error;

/// Errors that can occur when driving a quiz session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuizError {
    /// The session has not been started yet.
    #[error("quiz session has not been started")]
    NotStarted,

    /// `start` was called on a session that already left `NotStarted`.
    #[error("quiz session was already started")]
    AlreadyStarted,

    /// The operation needs an in-progress session.
    #[error("quiz session is not in progress")]
    NotInProgress,

    /// The session was already submitted; results are never recomputed.
    #[error("quiz session was already submitted")]
    AlreadySubmitted,

    /// The question id is not part of this quiz.
    #[error("unknown question: {0}")]
    UnknownQuestion(String),

    /// The question's own countdown ran out; its answer is locked for the
    /// rest of the attempt.
    #[error("time is up for question {0}")]
    QuestionTimeUp(String),

    /// A navigation target outside the question list.
    #[error("question index {index} out of range (quiz has {len} questions)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Manual submission with `require_all_questions` set and gaps left.
    #[error("{unanswered} question(s) still unanswered")]
    Incomplete { unanswered: usize },

    /// Retake requested but the retake policy forbids it.
    #[error("retake not allowed (attempt {attempt} of {max_attempts})")]
    RetakeNotAllowed { attempt: u32, max_attempts: u32 },

    /// A session needs at least one question.
    #[error("quiz has no questions")]
    NoQuestions,
}

impl QuizError {
    /// Returns `true` if the error is caused by a stale UI action against a
    /// finished session rather than a caller bug.
    pub fn is_stale_action(&self) -> bool {
        matches!(
            self,
            QuizError::AlreadySubmitted | QuizError::NotInProgress
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            QuizError::Incomplete { unanswered: 2 }.to_string(),
            "2 question(s) still unanswered"
        );
        assert_eq!(
            QuizError::IndexOutOfRange { index: 5, len: 3 }.to_string(),
            "question index 5 out of range (quiz has 3 questions)"
        );
        assert_eq!(
            QuizError::QuestionTimeUp("q2".into()).to_string(),
            "time is up for question q2"
        );
    }

    #[test]
    fn stale_actions() {
        assert!(QuizError::AlreadySubmitted.is_stale_action());
        assert!(!QuizError::NoQuestions.is_stale_action());
        assert!(!QuizError::QuestionTimeUp("q1".into()).is_stale_action());
    }
}
