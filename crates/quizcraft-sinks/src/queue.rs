//! Bounded delivery queue with retries and exponential backoff.
//!
//! Sinks wrapped by a [`DeliveryQueue`] return as soon as the payload is
//! queued. A single worker task delivers jobs in order, retrying transient
//! failures and giving up on permanent ones. When the queue is full new
//! jobs are dropped and counted rather than blocking the caller.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use quizcraft_core::certificate::Certificate;
use quizcraft_core::player::PlayerSinks;
use quizcraft_core::traits::{
    AnalyticsEvent, AnalyticsSink, CertificateSink, ResultEnvelope, ResultSink,
};

use crate::error::SinkError;

/// Queue sizing and retry policy.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Maximum number of jobs waiting for delivery.
    pub capacity: usize,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled after each one.
    pub retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Default)]
struct DeliveryStats {
    depth: AtomicU64,
    enqueued: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    retries: AtomicU64,
}

impl DeliveryStats {
    fn snapshot(&self) -> DeliverySnapshot {
        DeliverySnapshot {
            depth: self.depth.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySnapshot {
    /// Jobs queued but not yet picked up by the worker.
    pub depth: u64,
    pub enqueued: u64,
    pub delivered: u64,
    /// Jobs abandoned after a permanent error or exhausted retries.
    pub failed: u64,
    /// Jobs rejected because the queue was full or closed.
    pub dropped: u64,
    pub retries: u64,
}

enum Job {
    Result(Arc<dyn ResultSink>, ResultEnvelope),
    Certificate(Arc<dyn CertificateSink>, Certificate),
    Event(Arc<dyn AnalyticsSink>, AnalyticsEvent),
    Shutdown,
}

impl Job {
    fn target(&self) -> &str {
        match self {
            Job::Result(sink, _) => sink.name(),
            Job::Certificate(sink, _) => sink.name(),
            Job::Event(sink, _) => sink.name(),
            Job::Shutdown => "queue",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Job::Result(..) => "result",
            Job::Certificate(..) => "certificate",
            Job::Event(..) => "event",
            Job::Shutdown => "shutdown",
        }
    }

    async fn run(&self) -> anyhow::Result<()> {
        match self {
            Job::Result(sink, envelope) => sink.record_result(envelope).await,
            Job::Certificate(sink, certificate) => sink.record_certificate(certificate).await,
            Job::Event(sink, event) => sink.track(event).await,
            Job::Shutdown => Ok(()),
        }
    }
}

/// Cloneable producer side shared by every wrapped sink.
#[derive(Clone)]
struct QueueSender {
    sender: mpsc::Sender<Job>,
    stats: Arc<DeliveryStats>,
    closed: Arc<AtomicBool>,
}

impl QueueSender {
    fn enqueue(&self, job: Job) -> Result<(), SinkError> {
        if self.closed.load(Ordering::Acquire) {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(SinkError::QueueClosed);
        }

        self.stats.depth.fetch_add(1, Ordering::Relaxed);
        match self.sender.try_send(job) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(job)) => {
                self.stats.depth.fetch_sub(1, Ordering::Relaxed);
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    sink = job.target(),
                    "delivery queue full, dropping {}",
                    job.label()
                );
                Err(SinkError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => {
                self.stats.depth.fetch_sub(1, Ordering::Relaxed);
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Err(SinkError::QueueClosed)
            }
        }
    }
}

/// A sink whose calls are routed through the queue.
struct Queued<S: ?Sized> {
    inner: Arc<S>,
    queue: QueueSender,
}

#[async_trait]
impl ResultSink for Queued<dyn ResultSink> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn record_result(&self, envelope: &ResultEnvelope) -> anyhow::Result<()> {
        self.queue
            .enqueue(Job::Result(Arc::clone(&self.inner), envelope.clone()))?;
        Ok(())
    }
}

#[async_trait]
impl CertificateSink for Queued<dyn CertificateSink> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn record_certificate(&self, certificate: &Certificate) -> anyhow::Result<()> {
        self.queue
            .enqueue(Job::Certificate(Arc::clone(&self.inner), certificate.clone()))?;
        Ok(())
    }
}

#[async_trait]
impl AnalyticsSink for Queued<dyn AnalyticsSink> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn track(&self, event: &AnalyticsEvent) -> anyhow::Result<()> {
        self.queue
            .enqueue(Job::Event(Arc::clone(&self.inner), event.clone()))?;
        Ok(())
    }
}

/// Owns the delivery worker.
pub struct DeliveryQueue {
    queue: QueueSender,
    worker: JoinHandle<()>,
}

impl DeliveryQueue {
    /// Start the worker. Must be called within a tokio runtime.
    pub fn start(config: DeliveryConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let stats = Arc::new(DeliveryStats::default());
        let worker = tokio::spawn(run_worker(receiver, config, Arc::clone(&stats)));

        Self {
            queue: QueueSender {
                sender,
                stats,
                closed: Arc::new(AtomicBool::new(false)),
            },
            worker,
        }
    }

    pub fn stats(&self) -> DeliverySnapshot {
        self.queue.stats.snapshot()
    }

    pub fn wrap_results(&self, sink: Arc<dyn ResultSink>) -> Arc<dyn ResultSink> {
        Arc::new(Queued {
            inner: sink,
            queue: self.queue.clone(),
        })
    }

    pub fn wrap_certificates(&self, sink: Arc<dyn CertificateSink>) -> Arc<dyn CertificateSink> {
        Arc::new(Queued {
            inner: sink,
            queue: self.queue.clone(),
        })
    }

    pub fn wrap_analytics(&self, sink: Arc<dyn AnalyticsSink>) -> Arc<dyn AnalyticsSink> {
        Arc::new(Queued {
            inner: sink,
            queue: self.queue.clone(),
        })
    }

    /// Route every sink in the set through this queue.
    pub fn wrap(&self, sinks: PlayerSinks) -> PlayerSinks {
        PlayerSinks {
            results: sinks.results.map(|s| self.wrap_results(s)),
            certificates: sinks.certificates.map(|s| self.wrap_certificates(s)),
            analytics: sinks
                .analytics
                .into_iter()
                .map(|s| self.wrap_analytics(s))
                .collect(),
        }
    }

    /// Stop accepting jobs, deliver the backlog, and return final counters.
    pub async fn shutdown(self) -> DeliverySnapshot {
        self.queue.closed.store(true, Ordering::Release);
        if self.queue.sender.send(Job::Shutdown).await.is_ok() {
            if let Err(e) = self.worker.await {
                tracing::error!("delivery worker failed: {e}");
            }
        }
        self.queue.stats.snapshot()
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<Job>,
    config: DeliveryConfig,
    stats: Arc<DeliveryStats>,
) {
    while let Some(job) = receiver.recv().await {
        if matches!(job, Job::Shutdown) {
            break;
        }
        stats.depth.fetch_sub(1, Ordering::Relaxed);
        deliver(&job, &config, &stats).await;
    }
    tracing::debug!("delivery worker stopped");
}

async fn deliver(job: &Job, config: &DeliveryConfig, stats: &DeliveryStats) {
    let mut retry_delay = config.retry_delay;
    let mut last_error = None;

    for retry in 0..=config.max_retries {
        if retry > 0 {
            stats.retries.fetch_add(1, Ordering::Relaxed);
            tokio::time::sleep(retry_delay).await;
            retry_delay = (retry_delay * 2).min(config.max_retry_delay);
        }

        match job.run().await {
            Ok(()) => {
                stats.delivered.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(e) => {
                let sink_error = e.downcast_ref::<SinkError>();
                if sink_error.is_some_and(SinkError::is_permanent) {
                    last_error = Some(e);
                    break;
                }
                if let Some(ms) = sink_error.and_then(SinkError::retry_after_ms) {
                    retry_delay = Duration::from_millis(ms);
                }
                tracing::warn!(
                    sink = job.target(),
                    retry,
                    "{} delivery failed: {e:#}",
                    job.label()
                );
                last_error = Some(e);
            }
        }
    }

    stats.failed.fetch_add(1, Ordering::Relaxed);
    if let Some(e) = last_error {
        tracing::error!(
            sink = job.target(),
            "giving up on {} delivery: {e:#}",
            job.label()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizcraft_core::model::{QuizConfig, QuizContext};
    use quizcraft_core::scoring::{grade, AttemptInfo};
    use std::collections::HashMap;
    use std::sync::atomic::AtomicU32;
    use tokio::sync::Semaphore;

    fn envelope() -> ResultEnvelope {
        ResultEnvelope {
            context: QuizContext {
                quiz_id: "quiz".into(),
                course_id: "course".into(),
                module_id: None,
                learner_id: "learner".into(),
                learner_name: "Learner".into(),
            },
            result: grade(
                &[],
                &HashMap::new(),
                &QuizConfig::default(),
                AttemptInfo {
                    attempt: 1,
                    time_spent_secs: 0,
                },
            ),
        }
    }

    fn config() -> DeliveryConfig {
        DeliveryConfig {
            capacity: 8,
            max_retries: 2,
            retry_delay: Duration::from_millis(100),
            max_retry_delay: Duration::from_secs(1),
        }
    }

    /// Fails with the given error kind for the first `failures` calls.
    struct FlakySink {
        failures: u32,
        permanent: bool,
        calls: AtomicU32,
    }

    impl FlakySink {
        fn new(failures: u32, permanent: bool) -> Arc<Self> {
            Arc::new(Self {
                failures,
                permanent,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ResultSink for FlakySink {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn record_result(&self, _envelope: &ResultEnvelope) -> anyhow::Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                if self.permanent {
                    return Err(SinkError::AuthenticationFailed("nope".into()).into());
                }
                return Err(SinkError::Network("connection reset".into()).into());
            }
            Ok(())
        }
    }

    /// Blocks every call until a permit is released.
    struct GatedSink {
        gate: Semaphore,
    }

    #[async_trait]
    impl ResultSink for GatedSink {
        fn name(&self) -> &str {
            "gated"
        }

        async fn record_result(&self, _envelope: &ResultEnvelope) -> anyhow::Result<()> {
            let permit = self.gate.acquire().await?;
            permit.forget();
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures() {
        let queue = DeliveryQueue::start(config());
        let flaky = FlakySink::new(2, false);
        let sink = queue.wrap_results(flaky.clone());

        sink.record_result(&envelope()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(flaky.calls(), 3);
        let stats = queue.stats();
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.retries, 2);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.depth, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let queue = DeliveryQueue::start(config());
        let flaky = FlakySink::new(u32::MAX, false);
        let sink = queue.wrap_results(flaky.clone());

        sink.record_result(&envelope()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(flaky.calls(), 3);
        let stats = queue.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.delivered, 0);
        assert_eq!(stats.retries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_are_not_retried() {
        let queue = DeliveryQueue::start(config());
        let flaky = FlakySink::new(u32::MAX, true);
        let sink = queue.wrap_results(flaky.clone());

        sink.record_result(&envelope()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(flaky.calls(), 1);
        assert_eq!(queue.stats().failed, 1);
        assert_eq!(queue.stats().retries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_drops_new_jobs() {
        let queue = DeliveryQueue::start(DeliveryConfig {
            capacity: 1,
            ..config()
        });
        let gated = Arc::new(GatedSink {
            gate: Semaphore::new(0),
        });
        let sink = queue.wrap_results(gated.clone());

        sink.record_result(&envelope()).await.unwrap();
        // Let the worker pick up the first job and block on the gate.
        tokio::time::sleep(Duration::from_millis(10)).await;
        sink.record_result(&envelope()).await.unwrap();
        let err = sink.record_result(&envelope()).await.unwrap_err();
        assert!(err.to_string().contains("queue full"));

        let stats = queue.stats();
        assert_eq!(stats.depth, 1);
        assert_eq!(stats.dropped, 1);

        gated.gate.add_permits(10);
        let stats = queue.shutdown().await;
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.depth, 0);
    }

    #[tokio::test]
    async fn shutdown_drains_and_closes() {
        let queue = DeliveryQueue::start(config());
        let flaky = FlakySink::new(0, false);
        let sink = queue.wrap_results(flaky.clone());

        for _ in 0..3 {
            sink.record_result(&envelope()).await.unwrap();
        }
        let stats = queue.shutdown().await;
        assert_eq!(stats.enqueued, 3);
        assert_eq!(stats.delivered, 3);
        assert_eq!(flaky.calls(), 3);

        let err = sink.record_result(&envelope()).await.unwrap_err();
        assert!(err.to_string().contains("closed"));
    }

    #[tokio::test]
    async fn wrap_keeps_sink_layout() {
        let queue = DeliveryQueue::start(config());
        let sinks = PlayerSinks::default().with_results(FlakySink::new(0, false));
        let wrapped = queue.wrap(sinks);
        assert!(wrapped.results.is_some());
        assert!(wrapped.certificates.is_none());
        assert!(wrapped.analytics.is_empty());
        assert_eq!(wrapped.results.unwrap().name(), "flaky");
    }
}
