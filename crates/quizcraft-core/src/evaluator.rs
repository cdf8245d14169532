//! Answer correctness evaluation.
//!
//! The correct-answer field is a comma-separated list. Each token is trimmed
//! but tokens are never deduplicated, on either side.

use crate::model::{AnswerValue, QuizQuestion};

/// Check a learner's answer against a question's correct-answer field.
///
/// - `Multiple`: correct iff the selection has as many entries as there are
///   correct tokens and every selected entry is one of the tokens. Only the
///   learner-to-key direction is checked; with the length check this equals
///   set equality as long as neither side holds duplicates.
/// - `Single`: correct iff the trimmed value is one of the tokens.
pub fn check_answer(question: &QuizQuestion, answer: &AnswerValue) -> bool {
    let correct = question.correct_tokens();

    match answer {
        AnswerValue::Multiple(selected) => {
            selected.len() == correct.len()
                && selected.iter().all(|s| correct.contains(&s.as_str()))
        }
        AnswerValue::Single(value) => correct.contains(&value.trim()),
    }
}
