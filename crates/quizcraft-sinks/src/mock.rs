//! In-memory sinks and question source for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use quizcraft_core::certificate::Certificate;
use quizcraft_core::model::QuizQuestion;
use quizcraft_core::traits::{
    AnalyticsEvent, AnalyticsSink, CertificateSink, EventKind, QuestionSource, ResultEnvelope,
    ResultSink,
};

use crate::error::SinkError;

/// Records everything it receives. Can be switched into a failing mode to
/// exercise error paths.
#[derive(Default)]
pub struct RecordingSink {
    results: Mutex<Vec<ResultEnvelope>>,
    certificates: Mutex<Vec<Certificate>>,
    events: Mutex<Vec<AnalyticsEvent>>,
    call_count: AtomicU32,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every call fails with a network error.
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.set_failing(true);
        sink
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of calls made, including failed ones.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn results(&self) -> Vec<ResultEnvelope> {
        lock(&self.results).clone()
    }

    pub fn certificates(&self) -> Vec<Certificate> {
        lock(&self.certificates).clone()
    }

    pub fn events(&self) -> Vec<AnalyticsEvent> {
        lock(&self.events).clone()
    }

    pub fn event_kinds(&self) -> Vec<EventKind> {
        lock(&self.events).iter().map(|e| e.kind).collect()
    }

    fn check(&self) -> anyhow::Result<()> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Network("mock sink is failing".into()).into());
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ResultSink for RecordingSink {
    fn name(&self) -> &str {
        "mock"
    }

    async fn record_result(&self, envelope: &ResultEnvelope) -> anyhow::Result<()> {
        self.check()?;
        lock(&self.results).push(envelope.clone());
        Ok(())
    }
}

#[async_trait]
impl CertificateSink for RecordingSink {
    fn name(&self) -> &str {
        "mock"
    }

    async fn record_certificate(&self, certificate: &Certificate) -> anyhow::Result<()> {
        self.check()?;
        lock(&self.certificates).push(certificate.clone());
        Ok(())
    }
}

#[async_trait]
impl AnalyticsSink for RecordingSink {
    fn name(&self) -> &str {
        "mock"
    }

    async fn track(&self, event: &AnalyticsEvent) -> anyhow::Result<()> {
        self.check()?;
        lock(&self.events).push(event.clone());
        Ok(())
    }
}

/// Serves fixed question lists keyed by quiz id.
#[derive(Default)]
pub struct StaticQuestionSource {
    quizzes: HashMap<String, Vec<QuizQuestion>>,
    call_count: AtomicU32,
}

impl StaticQuestionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quiz(mut self, quiz_id: &str, questions: Vec<QuizQuestion>) -> Self {
        self.quizzes.insert(quiz_id.to_string(), questions);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl QuestionSource for StaticQuestionSource {
    async fn fetch_questions(&self, quiz_id: &str) -> anyhow::Result<Vec<QuizQuestion>> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.quizzes
            .get(quiz_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("quiz not found: {quiz_id}"))
    }
}
