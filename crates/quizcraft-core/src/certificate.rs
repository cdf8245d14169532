//! Certificate issuance for passed attempts.
//!
//! Identifiers are generated locally; uniqueness is left to whatever
//! persists the certificate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{QuizContext, QuizResult};

/// Length of the human-typed verification code.
pub const VERIFICATION_CODE_LEN: usize = 12;

/// A certificate of completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: Uuid,
    /// Display number, e.g. `CERT-20250101-1A2B3C4D`.
    pub number: String,
    pub recipient_id: String,
    pub recipient_name: String,
    pub course_id: String,
    pub quiz_id: String,
    pub score: u32,
    pub verification_code: String,
    pub issued_at: DateTime<Utc>,
}

impl Certificate {
    /// Issue a certificate for a result. Returns `None` unless it passed.
    pub fn issue(context: &QuizContext, result: &QuizResult) -> Option<Self> {
        if !result.passed {
            return None;
        }

        let id = Uuid::new_v4();
        let issued_at = Utc::now();
        let number = format!(
            "CERT-{}-{}",
            issued_at.format("%Y%m%d"),
            id.simple().to_string()[..8].to_uppercase()
        );

        Some(Self {
            id,
            number,
            recipient_id: context.learner_id.clone(),
            recipient_name: context.learner_name.clone(),
            course_id: context.course_id.clone(),
            quiz_id: context.quiz_id.clone(),
            score: result.score,
            verification_code: verification_code(),
            issued_at,
        })
    }

    /// Check a code typed by a verifier. Case and surrounding space are ignored.
    pub fn verify(&self, code: &str) -> bool {
        self.verification_code.eq_ignore_ascii_case(code.trim())
    }
}

/// Random uppercase alphanumeric code drawn from a fresh v4 UUID.
fn verification_code() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .to_uppercase()
        .chars()
        .take(VERIFICATION_CODE_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerValue, QuestionType, QuizAnswer, QuizConfig, QuizQuestion};
    use crate::scoring::{grade, AttemptInfo};
    use std::collections::HashMap;

    fn context() -> QuizContext {
        QuizContext {
            quiz_id: "safety-101".into(),
            course_id: "onboarding".into(),
            module_id: None,
            learner_id: "u-1".into(),
            learner_name: "Sam Doe".into(),
        }
    }

    fn question() -> QuizQuestion {
        QuizQuestion {
            id: "q1".into(),
            prompt: "Pick".into(),
            question_type: QuestionType::MultipleChoice,
            options: vec!["A".into(), "B".into()],
            correct_answer: "A".into(),
            points: 1,
            time_limit_secs: None,
            explanation: String::new(),
        }
    }

    fn graded(answers: &[(&str, &str)], pass_threshold: u32) -> QuizResult {
        let answers: HashMap<String, QuizAnswer> = answers
            .iter()
            .map(|(id, value)| {
                (
                    id.to_string(),
                    QuizAnswer {
                        question_id: id.to_string(),
                        value: AnswerValue::single(*value),
                        is_correct: None,
                        time_spent_secs: 1,
                        submitted_at: Utc::now(),
                    },
                )
            })
            .collect();
        let config = QuizConfig {
            pass_threshold,
            ..Default::default()
        };
        grade(
            &[question()],
            &answers,
            &config,
            AttemptInfo {
                attempt: 1,
                time_spent_secs: 0,
            },
        )
    }

    fn result(passed: bool) -> QuizResult {
        let result = graded(&[("q1", if passed { "A" } else { "B" })], 70);
        assert_eq!(result.passed, passed);
        result
    }

    #[test]
    fn no_certificate_for_empty_submission_at_zero_threshold() {
        let result = graded(&[], 0);
        assert_eq!(result.answered_count, 0);
        assert!(!result.passed);
        assert!(Certificate::issue(&context(), &result).is_none());
    }

    #[test]
    fn no_certificate_for_failed_result() {
        assert!(Certificate::issue(&context(), &result(false)).is_none());
    }

    #[test]
    fn certificate_fields() {
        let cert = Certificate::issue(&context(), &result(true)).unwrap();
        assert_eq!(cert.recipient_name, "Sam Doe");
        assert_eq!(cert.course_id, "onboarding");
        assert_eq!(cert.score, 100);
        assert!(cert.number.starts_with("CERT-"));
        assert_eq!(cert.number.len(), "CERT-YYYYMMDD-XXXXXXXX".len());
        assert_eq!(cert.verification_code.len(), VERIFICATION_CODE_LEN);
        assert!(cert
            .verification_code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn verify_ignores_case() {
        let cert = Certificate::issue(&context(), &result(true)).unwrap();
        let lower = cert.verification_code.to_lowercase();
        assert!(cert.verify(&format!(" {lower} ")));
        assert!(!cert.verify("NOT-THE-CODE"));
    }

    #[test]
    fn each_issue_is_distinct() {
        let a = Certificate::issue(&context(), &result(true)).unwrap();
        let b = Certificate::issue(&context(), &result(true)).unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.verification_code, b.verification_code);
    }
}
