//! File-backed sinks: one JSON document per record, or JSON lines.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use quizcraft_core::certificate::Certificate;
use quizcraft_core::traits::{
    AnalyticsEvent, AnalyticsSink, CertificateSink, ResultEnvelope, ResultSink,
};

use crate::error::SinkError;

/// Writes each result and certificate to its own pretty-printed JSON file.
///
/// Results land in `<dir>/results/`, certificates in `<dir>/certificates/`.
#[derive(Debug, Clone)]
pub struct JsonDirSink {
    dir: PathBuf,
}

impl JsonDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn result_path(&self, envelope: &ResultEnvelope) -> PathBuf {
        let ctx = &envelope.context;
        self.dir.join("results").join(format!(
            "{}-{}-attempt{}-{}.json",
            sanitize(&ctx.quiz_id),
            sanitize(&ctx.learner_id),
            envelope.result.attempt,
            envelope.result.completed_at.format("%Y%m%dT%H%M%S")
        ))
    }

    pub fn certificate_path(&self, certificate: &Certificate) -> PathBuf {
        self.dir
            .join("certificates")
            .join(format!("{}.json", sanitize(&certificate.number)))
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SinkError> {
    let json = serde_json::to_string_pretty(value)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, json).await?;
    Ok(())
}

/// Keep ids usable as file names.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl ResultSink for JsonDirSink {
    fn name(&self) -> &str {
        "json_dir"
    }

    async fn record_result(&self, envelope: &ResultEnvelope) -> anyhow::Result<()> {
        let path = self.result_path(envelope);
        write_json(&path, envelope).await?;
        tracing::debug!("wrote result to {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl CertificateSink for JsonDirSink {
    fn name(&self) -> &str {
        "json_dir"
    }

    async fn record_certificate(&self, certificate: &Certificate) -> anyhow::Result<()> {
        let path = self.certificate_path(certificate);
        write_json(&path, certificate).await?;
        tracing::debug!("wrote certificate to {}", path.display());
        Ok(())
    }
}

/// Appends one JSON object per line to a single file.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

#[derive(Serialize)]
struct Line<'a, T> {
    kind: &'a str,
    data: &'a T,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append<T: Serialize + Sync>(&self, kind: &str, data: &T) -> Result<(), SinkError> {
        let mut line = serde_json::to_string(&Line { kind, data })?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ResultSink for JsonLinesSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn record_result(&self, envelope: &ResultEnvelope) -> anyhow::Result<()> {
        Ok(self.append("result", envelope).await?)
    }
}

#[async_trait]
impl CertificateSink for JsonLinesSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn record_certificate(&self, certificate: &Certificate) -> anyhow::Result<()> {
        Ok(self.append("certificate", certificate).await?)
    }
}

#[async_trait]
impl AnalyticsSink for JsonLinesSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn track(&self, event: &AnalyticsEvent) -> anyhow::Result<()> {
        Ok(self.append(event.kind.as_str(), event).await?)
    }
}
