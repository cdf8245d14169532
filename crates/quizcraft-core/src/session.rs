//! The quiz session state machine.
//!
//! A session moves `NotStarted → InProgress → Submitted(Passed | Failed)`
//! and, when the retake policy allows it, back to `InProgress` for a new
//! attempt. Every operation is synchronous; the async shell in
//! [`crate::player`] serialises access and drives [`QuizSession::tick`] once
//! per second.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::QuizError;
use crate::evaluator::check_answer;
use crate::model::{
    AnswerValue, Outcome, QuizAnswer, QuizConfig, QuizContext, QuizQuestion, QuizResult,
    SessionStatus,
};
use crate::scoring::{grade, AttemptInfo};

/// Where navigation ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Moved to the question at this index.
    Moved(usize),
    /// Advanced past the last question, which submitted the attempt.
    Submitted(QuizResult),
}

/// What a single countdown tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The session is not in progress; nothing happened.
    Idle,
    /// Still counting. `remaining_secs` is the quiz-level countdown, if any.
    Running { remaining_secs: Option<u64> },
    /// The current question's own limit ran out and the session moved on.
    QuestionTimedOut { next_index: usize },
    /// The quiz countdown reached zero without auto-submit; time is frozen.
    Expired,
    /// Every question's own countdown has run out without auto-submit and
    /// there is no quiz countdown. Nothing is left to count.
    Exhausted,
    /// The countdown forced a submission.
    AutoSubmitted(QuizResult),
}

impl TickOutcome {
    /// Whether another tick could still change the session.
    pub fn keeps_running(&self) -> bool {
        matches!(
            self,
            TickOutcome::Running { .. } | TickOutcome::QuestionTimedOut { .. }
        )
    }
}

/// Progress indicator data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// 1-based position of the current question.
    pub position: usize,
    pub total: usize,
    pub answered: usize,
}

impl Progress {
    pub fn percent_answered(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (self.answered as f64 / self.total as f64 * 100.0).round() as u32
    }
}

/// One learner's session against one quiz.
#[derive(Debug, Clone)]
pub struct QuizSession {
    context: QuizContext,
    questions: Vec<QuizQuestion>,
    config: QuizConfig,
    status: SessionStatus,
    current_index: usize,
    answers: HashMap<String, QuizAnswer>,
    attempt: u32,
    started_at: Option<DateTime<Utc>>,
    question_entered_at: Option<DateTime<Utc>>,
    remaining_secs: Option<u64>,
    /// Seconds left per timed question. Kept across navigation for the
    /// whole attempt; zero means the question's time is up.
    question_clocks: HashMap<String, u64>,
    result: Option<QuizResult>,
    history: Vec<QuizResult>,
}

impl QuizSession {
    /// Create a session in `NotStarted`.
    pub fn new(
        context: QuizContext,
        questions: Vec<QuizQuestion>,
        config: QuizConfig,
    ) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }
        Ok(Self {
            context,
            questions,
            config,
            status: SessionStatus::NotStarted,
            current_index: 0,
            answers: HashMap::new(),
            attempt: 0,
            started_at: None,
            question_entered_at: None,
            remaining_secs: None,
            question_clocks: HashMap::new(),
            result: None,
            history: Vec::new(),
        })
    }

    /// Begin the first attempt.
    pub fn start(&mut self) -> Result<(), QuizError> {
        if self.status != SessionStatus::NotStarted {
            return Err(QuizError::AlreadyStarted);
        }
        self.attempt = 1;
        self.begin_attempt();
        tracing::info!(
            quiz_id = %self.context.quiz_id,
            learner = %self.context.learner_id,
            questions = self.questions.len(),
            "quiz started"
        );
        Ok(())
    }

    fn begin_attempt(&mut self) {
        let now = Utc::now();
        self.status = SessionStatus::InProgress;
        self.answers.clear();
        self.result = None;
        self.started_at = Some(now);
        self.remaining_secs = self.config.time_limit_secs;
        self.question_clocks = self
            .questions
            .iter()
            .filter_map(|q| q.time_limit_secs.map(|secs| (q.id.clone(), secs)))
            .collect();
        self.enter_question(0, now);
    }

    fn enter_question(&mut self, index: usize, now: DateTime<Utc>) {
        self.current_index = index;
        self.question_entered_at = Some(now);
    }

    fn require_in_progress(&self) -> Result<(), QuizError> {
        match self.status {
            SessionStatus::InProgress => Ok(()),
            SessionStatus::NotStarted => Err(QuizError::NotStarted),
            SessionStatus::Submitted(_) => Err(QuizError::AlreadySubmitted),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn context(&self) -> &QuizContext {
        &self.context
    }

    pub fn config(&self) -> &QuizConfig {
        &self.config
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// 1-based attempt number; 0 before the session starts.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// The question to render, if any.
    pub fn current_question(&self) -> Option<&QuizQuestion> {
        if !self.status.is_active() {
            return None;
        }
        self.questions.get(self.current_index)
    }

    /// The stored answer for the current question, restored on navigation.
    pub fn current_answer(&self) -> Option<&QuizAnswer> {
        self.current_question()
            .and_then(|q| self.answers.get(&q.id))
    }

    pub fn answer_for(&self, question_id: &str) -> Option<&QuizAnswer> {
        self.answers.get(question_id)
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub fn unanswered_count(&self) -> usize {
        self.questions.len() - self.answers.len()
    }

    pub fn is_last_question(&self) -> bool {
        self.current_index + 1 >= self.questions.len()
    }

    pub fn remaining_secs(&self) -> Option<u64> {
        self.remaining_secs
    }

    /// Seconds left on the current question's own countdown. Resumes where
    /// it stopped when the learner navigates back.
    pub fn question_remaining_secs(&self) -> Option<u64> {
        self.current_question()
            .and_then(|q| self.question_clocks.get(&q.id).copied())
    }

    /// Whether a question's own countdown has run out this attempt.
    pub fn is_time_up(&self, question_id: &str) -> bool {
        self.question_clocks.get(question_id) == Some(&0)
    }

    /// Whether any countdown applies to this session.
    pub fn has_timers(&self) -> bool {
        self.config.time_limit_secs.is_some()
            || self.questions.iter().any(|q| q.time_limit_secs.is_some())
    }

    pub fn progress(&self) -> Progress {
        Progress {
            position: (self.current_index + 1).min(self.questions.len()),
            total: self.questions.len(),
            answered: self.answers.len(),
        }
    }

    /// The result of the latest submitted attempt.
    pub fn result(&self) -> Option<&QuizResult> {
        self.result.as_ref()
    }

    /// Results of earlier attempts, oldest first.
    pub fn history(&self) -> &[QuizResult] {
        &self.history
    }

    // -----------------------------------------------------------------------
    // Answering and navigation
    // -----------------------------------------------------------------------

    /// Store or overwrite the answer to a question. Correctness is not
    /// evaluated here.
    pub fn answer(&mut self, question_id: &str, value: AnswerValue) -> Result<(), QuizError> {
        self.require_in_progress()?;
        if !self.questions.iter().any(|q| q.id == question_id) {
            return Err(QuizError::UnknownQuestion(question_id.to_string()));
        }
        if self.is_time_up(question_id) {
            return Err(QuizError::QuestionTimeUp(question_id.to_string()));
        }

        let now = Utc::now();
        let on_current = self
            .questions
            .get(self.current_index)
            .is_some_and(|q| q.id == question_id);
        let time_spent_secs = match (on_current, self.question_entered_at) {
            (true, Some(entered)) => seconds_between(entered, now),
            _ => 0,
        };

        tracing::debug!(question_id, answer = %value, "answer stored");
        self.answers.insert(
            question_id.to_string(),
            QuizAnswer {
                question_id: question_id.to_string(),
                value,
                is_correct: None,
                time_spent_secs,
                submitted_at: now,
            },
        );
        Ok(())
    }

    /// Display-only correctness of a stored answer in immediate-feedback
    /// mode. Scoring is unaffected.
    pub fn preview(&self, question_id: &str) -> Option<bool> {
        if !self.config.immediate_feedback {
            return None;
        }
        let answer = self.answers.get(question_id)?;
        let question = self.questions.iter().find(|q| q.id == question_id)?;
        Some(check_answer(question, &answer.value))
    }

    /// Move to the next question; on the last question, submit.
    pub fn advance(&mut self) -> Result<Step, QuizError> {
        self.require_in_progress()?;
        if self.is_last_question() {
            return self.submit().map(Step::Submitted);
        }
        let next = self.current_index + 1;
        self.enter_question(next, Utc::now());
        Ok(Step::Moved(next))
    }

    /// Move to the previous question. Stored answers are kept.
    pub fn back(&mut self) -> Result<usize, QuizError> {
        self.require_in_progress()?;
        if self.current_index > 0 {
            let prev = self.current_index - 1;
            self.enter_question(prev, Utc::now());
        }
        Ok(self.current_index)
    }

    /// Jump to a question by index.
    pub fn go_to(&mut self, index: usize) -> Result<(), QuizError> {
        self.require_in_progress()?;
        if index >= self.questions.len() {
            return Err(QuizError::IndexOutOfRange {
                index,
                len: self.questions.len(),
            });
        }
        self.enter_question(index, Utc::now());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Timer
    // -----------------------------------------------------------------------

    /// One second of countdown.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.status.is_active() {
            return TickOutcome::Idle;
        }

        if let Some(remaining) = self.remaining_secs {
            let remaining = remaining.saturating_sub(1);
            self.remaining_secs = Some(remaining);
            if remaining == 0 {
                if self.config.auto_submit {
                    tracing::info!(quiz_id = %self.context.quiz_id, "time limit reached, auto-submitting");
                    return TickOutcome::AutoSubmitted(self.finalize());
                }
                return TickOutcome::Expired;
            }
        }

        let question_clock = self
            .questions
            .get(self.current_index)
            .and_then(|q| self.question_clocks.get_mut(&q.id))
            .filter(|secs| **secs > 0);
        if let Some(secs) = question_clock {
            *secs -= 1;
            if *secs == 0 {
                if !self.is_last_question() {
                    let next = self.current_index + 1;
                    self.enter_question(next, Utc::now());
                    return TickOutcome::QuestionTimedOut { next_index: next };
                }
                if self.config.auto_submit {
                    tracing::info!(quiz_id = %self.context.quiz_id, "last question timed out, auto-submitting");
                    return TickOutcome::AutoSubmitted(self.finalize());
                }
            }
        }

        if self.remaining_secs.is_none()
            && !self.question_clocks.is_empty()
            && self.question_clocks.values().all(|secs| *secs == 0)
        {
            return TickOutcome::Exhausted;
        }

        TickOutcome::Running {
            remaining_secs: self.remaining_secs,
        }
    }

    // -----------------------------------------------------------------------
    // Submission and retakes
    // -----------------------------------------------------------------------

    /// Manually submit the attempt.
    ///
    /// Rejected once submitted, so a result is computed exactly once per
    /// attempt.
    pub fn submit(&mut self) -> Result<QuizResult, QuizError> {
        self.require_in_progress()?;
        if self.config.require_all_questions {
            let unanswered = self.unanswered_count();
            if unanswered > 0 {
                return Err(QuizError::Incomplete { unanswered });
            }
        }
        Ok(self.finalize())
    }

    fn finalize(&mut self) -> QuizResult {
        let now = Utc::now();
        let time_spent_secs = self
            .started_at
            .map(|started| seconds_between(started, now))
            .unwrap_or(0);

        let result = grade(
            &self.questions,
            &self.answers,
            &self.config,
            AttemptInfo {
                attempt: self.attempt,
                time_spent_secs,
            },
        );

        self.status = SessionStatus::Submitted(if result.passed {
            Outcome::Passed
        } else {
            Outcome::Failed
        });
        self.result = Some(result.clone());

        tracing::info!(
            quiz_id = %self.context.quiz_id,
            attempt = self.attempt,
            score = result.score,
            passed = result.passed,
            "quiz submitted"
        );
        result
    }

    /// Start a fresh attempt after a submission.
    ///
    /// Answers, position and timers reset; the attempt counter increments.
    /// A passed attempt can be retaken as long as the policy allows it.
    pub fn retake(&mut self) -> Result<(), QuizError> {
        let Some(result) = self.result.take() else {
            return match self.status {
                SessionStatus::NotStarted => Err(QuizError::NotStarted),
                _ => Err(QuizError::NotInProgress),
            };
        };
        if !result.can_retake {
            let err = QuizError::RetakeNotAllowed {
                attempt: self.attempt,
                max_attempts: self.config.max_attempts,
            };
            self.result = Some(result);
            return Err(err);
        }

        self.history.push(result);
        self.attempt += 1;
        self.begin_attempt();
        tracing::info!(
            quiz_id = %self.context.quiz_id,
            attempt = self.attempt,
            "quiz retake started"
        );
        Ok(())
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_seconds().max(0) as u64
}
