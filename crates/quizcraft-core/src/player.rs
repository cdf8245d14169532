//! Async driver around a [`QuizSession`].
//!
//! The player serialises access to the session, runs the countdown timer
//! while an attempt is active, and hands results, certificates, and
//! analytics events to the configured sinks. Sink failures are logged and
//! never undo the local result.
//!
//! An auto-submitted result is delivered from its own task, not from the
//! countdown task, so cancelling or replacing the timer cannot cut the
//! delivery short. [`QuizPlayer::settle`] waits for it.

use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::certificate::Certificate;
use crate::error::QuizError;
use crate::model::{AnswerValue, QuizResult};
use crate::session::{QuizSession, Step, TickOutcome};
use crate::timer::{CountdownTimer, TICK_PERIOD};
use crate::traits::{
    AnalyticsEvent, AnalyticsSink, CertificateSink, EventKind, ResultEnvelope, ResultSink,
};

/// Where the player delivers what a session produces.
#[derive(Clone, Default)]
pub struct PlayerSinks {
    pub results: Option<Arc<dyn ResultSink>>,
    /// Certificates are only issued when this is set.
    pub certificates: Option<Arc<dyn CertificateSink>>,
    pub analytics: Vec<Arc<dyn AnalyticsSink>>,
}

impl PlayerSinks {
    pub fn with_results(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.results = Some(sink);
        self
    }

    pub fn with_certificates(mut self, sink: Arc<dyn CertificateSink>) -> Self {
        self.certificates = Some(sink);
        self
    }

    pub fn with_analytics(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics.push(sink);
        self
    }
}

/// A submitted attempt as seen by the caller.
#[derive(Debug, Clone)]
pub struct Submission {
    pub result: QuizResult,
    pub certificate: Option<Certificate>,
}

struct Shared {
    session: Mutex<QuizSession>,
    sinks: PlayerSinks,
    certificate: StdMutex<Option<Certificate>>,
    /// Delivery of an auto-submitted result still in flight.
    pending: StdMutex<Option<JoinHandle<()>>>,
}

/// Drives one session from UI or terminal events.
pub struct QuizPlayer {
    shared: Arc<Shared>,
    timer: StdMutex<Option<CountdownTimer>>,
    tick_period: Duration,
}

impl QuizPlayer {
    pub fn new(session: QuizSession, sinks: PlayerSinks) -> Self {
        Self {
            shared: Arc::new(Shared {
                session: Mutex::new(session),
                sinks,
                certificate: StdMutex::new(None),
                pending: StdMutex::new(None),
            }),
            timer: StdMutex::new(None),
            tick_period: TICK_PERIOD,
        }
    }

    /// Override the countdown period. Each period counts as one second.
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Read-only access to the session.
    pub async fn inspect<R>(&self, f: impl FnOnce(&QuizSession) -> R) -> R {
        let session = self.shared.session.lock().await;
        f(&session)
    }

    /// The certificate issued for the latest passed attempt, if any. After
    /// an auto-submit, call [`settle`](Self::settle) first.
    pub fn certificate(&self) -> Option<Certificate> {
        lock_std(&self.shared.certificate).clone()
    }

    pub fn timer_running(&self) -> bool {
        lock_std(&self.timer)
            .as_ref()
            .is_some_and(CountdownTimer::is_running)
    }

    /// Start the first attempt and its countdown.
    pub async fn start(&self) -> Result<(), QuizError> {
        let (event, timed) = {
            let mut session = self.shared.session.lock().await;
            session.start()?;
            let event = AnalyticsEvent::new(
                EventKind::QuizStarted,
                session.context(),
                session.attempt(),
                json!({
                    "question_count": session.questions().len(),
                    "time_limit_secs": session.config().time_limit_secs,
                }),
            );
            (event, session.has_timers())
        };
        if timed {
            self.start_timer();
        }
        self.shared.track(event).await;
        Ok(())
    }

    /// Store an answer. Returns the display-only correctness preview when
    /// immediate feedback is on.
    pub async fn answer(
        &self,
        question_id: &str,
        value: AnswerValue,
    ) -> Result<Option<bool>, QuizError> {
        let (event, preview) = {
            let mut session = self.shared.session.lock().await;
            session.answer(question_id, value.clone())?;
            let event = AnalyticsEvent::new(
                EventKind::AnswerSelected,
                session.context(),
                session.attempt(),
                json!({ "question_id": question_id, "answer": value }),
            );
            (event, session.preview(question_id))
        };
        self.shared.track(event).await;
        Ok(preview)
    }

    /// Next question, or submission from the last one.
    pub async fn advance(&self) -> Result<Step, QuizError> {
        let step = self.shared.session.lock().await.advance()?;
        if let Step::Submitted(result) = &step {
            self.stop_timer();
            self.shared.deliver(result, false).await;
        }
        Ok(step)
    }

    pub async fn back(&self) -> Result<usize, QuizError> {
        self.shared.session.lock().await.back()
    }

    pub async fn go_to(&self, index: usize) -> Result<(), QuizError> {
        self.shared.session.lock().await.go_to(index)
    }

    /// Manually submit the current attempt.
    pub async fn submit(&self) -> Result<Submission, QuizError> {
        let result = self.shared.session.lock().await.submit()?;
        self.stop_timer();
        let certificate = self.shared.deliver(&result, false).await;
        Ok(Submission {
            result,
            certificate,
        })
    }

    /// Begin a new attempt after a submission.
    pub async fn retake(&self) -> Result<(), QuizError> {
        self.settle().await;
        let (event, timed) = {
            let mut session = self.shared.session.lock().await;
            session.retake()?;
            let event = AnalyticsEvent::new(
                EventKind::QuizRetakeStarted,
                session.context(),
                session.attempt(),
                json!({ "previous_attempts": session.history().len() }),
            );
            (event, session.has_timers())
        };
        *lock_std(&self.shared.certificate) = None;
        if timed {
            self.start_timer();
        }
        self.shared.track(event).await;
        Ok(())
    }

    /// Run one countdown step by hand. The background timer calls the same
    /// path.
    pub async fn tick(&self) -> TickOutcome {
        let outcome = self.shared.tick().await;
        self.settle().await;
        outcome
    }

    /// Wait until an auto-submitted result has reached every sink.
    pub async fn settle(&self) {
        let pending = lock_std(&self.shared.pending).take();
        if let Some(handle) = pending {
            if let Err(e) = handle.await {
                tracing::warn!("auto-submit delivery did not finish: {e}");
            }
        }
    }

    /// Cancel the countdown and wait for any delivery still in flight.
    /// The session is left as it is.
    pub async fn shutdown(&self) {
        self.stop_timer();
        self.settle().await;
    }

    fn start_timer(&self) {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let timer = CountdownTimer::spawn(self.tick_period, move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(shared) => shared.tick().await.keeps_running(),
                    None => false,
                }
            }
        });
        // Replacing an old handle drops and aborts it.
        *lock_std(&self.timer) = Some(timer);
    }

    fn stop_timer(&self) {
        if let Some(mut timer) = lock_std(&self.timer).take() {
            timer.cancel();
        }
    }
}

impl Shared {
    async fn tick(self: &Arc<Self>) -> TickOutcome {
        let outcome = self.session.lock().await.tick();
        if let TickOutcome::AutoSubmitted(result) = &outcome {
            let shared = Arc::clone(self);
            let result = result.clone();
            let handle = tokio::spawn(async move {
                shared.deliver(&result, true).await;
            });
            *lock_std(&self.pending) = Some(handle);
        }
        outcome
    }

    /// Hand a fresh result to the sinks. Returns the issued certificate.
    async fn deliver(&self, result: &QuizResult, timed_out: bool) -> Option<Certificate> {
        let context = self.session.lock().await.context().clone();

        let mut events = Vec::new();
        if timed_out {
            events.push(AnalyticsEvent::new(
                EventKind::QuizTimedOut,
                &context,
                result.attempt,
                json!({ "answered": result.answered_count }),
            ));
        }
        events.push(AnalyticsEvent::new(
            EventKind::QuizSubmitted,
            &context,
            result.attempt,
            json!({
                "answered": result.answered_count,
                "total_questions": result.total_questions,
                "time_spent_secs": result.time_spent_secs,
            }),
        ));
        events.push(AnalyticsEvent::new(
            EventKind::QuizCompleted,
            &context,
            result.attempt,
            json!({
                "score": result.score,
                "passed": result.passed,
                "correct": result.correct_count,
            }),
        ));

        if let Some(sink) = &self.sinks.results {
            let envelope = ResultEnvelope {
                context: context.clone(),
                result: result.clone(),
            };
            if let Err(e) = sink.record_result(&envelope).await {
                tracing::warn!(sink = sink.name(), "failed to record result: {e:#}");
            }
        }

        let mut issued = None;
        if let Some(sink) = &self.sinks.certificates {
            if let Some(certificate) = Certificate::issue(&context, result) {
                tracing::info!(number = %certificate.number, "certificate issued");
                if let Err(e) = sink.record_certificate(&certificate).await {
                    tracing::warn!(sink = sink.name(), "failed to record certificate: {e:#}");
                }
                *lock_std(&self.certificate) = Some(certificate.clone());
                issued = Some(certificate);
            }
        }

        for event in events {
            self.track(event).await;
        }
        issued
    }

    async fn track(&self, event: AnalyticsEvent) {
        let outcomes =
            futures::future::join_all(self.sinks.analytics.iter().map(|s| s.track(&event))).await;
        for (sink, outcome) in self.sinks.analytics.iter().zip(outcomes) {
            if let Err(e) = outcome {
                tracing::warn!(sink = sink.name(), event = %event.kind, "analytics delivery failed: {e:#}");
            }
        }
    }
}

fn lock_std<T>(mutex: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
