//! Result aggregation: score, pass/fail, feedback, and retake eligibility.

use std::collections::HashMap;

use chrono::Utc;

use crate::evaluator::check_answer;
use crate::model::{QuizAnswer, QuizConfig, QuizQuestion, QuizResult};

/// Attempt bookkeeping needed to grade a submission.
#[derive(Debug, Clone, Copy)]
pub struct AttemptInfo {
    /// 1-based attempt number being graded.
    pub attempt: u32,
    /// Wall-clock seconds since the attempt started.
    pub time_spent_secs: u64,
}

/// Percentage score from points. Zero when nothing counted.
pub fn score_percentage(earned_points: u64, total_points: u64) -> u32 {
    if total_points == 0 {
        return 0;
    }
    let pct = (earned_points as f64 / total_points as f64 * 100.0).round() as u32;
    pct.min(100)
}

/// Fixed feedback templates.
pub fn feedback_for(passed: bool, score: u32, pass_threshold: u32) -> String {
    if passed {
        format!("Congratulations! You passed with a score of {score}%.")
    } else {
        format!(
            "You scored {score}%. A score of {pass_threshold}% is required to pass. \
             Review the material and try again."
        )
    }
}

/// Attempts left after `attempt` has been used.
pub fn attempts_remaining(max_attempts: u32, attempt: u32) -> u32 {
    max_attempts.saturating_sub(attempt)
}

/// Whether another attempt may be started after `attempt`.
pub fn can_retake(config: &QuizConfig, attempt: u32) -> bool {
    config.allow_retake && attempt < config.max_attempts
}

/// Grade a submission.
///
/// Only questions with a stored answer count toward `total_points`; an
/// untouched question neither earns nor costs anything. Each returned answer
/// carries its evaluated correctness, in question order.
///
/// An attempt with no answered question never passes, whatever the
/// threshold. Points are summed in `u64`; the reported totals saturate at
/// `u32::MAX`.
pub fn grade(
    questions: &[QuizQuestion],
    answers: &HashMap<String, QuizAnswer>,
    config: &QuizConfig,
    info: AttemptInfo,
) -> QuizResult {
    let mut earned_points = 0u64;
    let mut total_points = 0u64;
    let mut correct_count = 0usize;
    let mut evaluated = Vec::with_capacity(answers.len());

    for question in questions {
        let Some(answer) = answers.get(&question.id) else {
            continue;
        };

        let correct = check_answer(question, &answer.value);
        total_points += u64::from(question.points);
        if correct {
            earned_points += u64::from(question.points);
            correct_count += 1;
        }

        let mut answer = answer.clone();
        answer.is_correct = Some(correct);
        evaluated.push(answer);
    }

    let score = score_percentage(earned_points, total_points);
    let passed = !evaluated.is_empty() && score >= config.pass_threshold;

    QuizResult {
        score,
        correct_count,
        total_questions: questions.len(),
        answered_count: evaluated.len(),
        earned_points: saturate(earned_points),
        total_points: saturate(total_points),
        time_spent_secs: info.time_spent_secs,
        passed,
        pass_threshold: config.pass_threshold,
        answers: evaluated,
        feedback: feedback_for(passed, score, config.pass_threshold),
        can_retake: can_retake(config, info.attempt),
        attempts_remaining: attempts_remaining(config.max_attempts, info.attempt),
        attempt: info.attempt,
        completed_at: Utc::now(),
    }
}

fn saturate(points: u64) -> u32 {
    u32::try_from(points).unwrap_or(u32::MAX)
}
