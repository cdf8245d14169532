//! Configuration file loading and sink factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use quizcraft_core::player::PlayerSinks;
use quizcraft_core::traits::{AnalyticsSink, CertificateSink, ResultSink};

use crate::json::{JsonDirSink, JsonLinesSink};
use crate::queue::DeliveryConfig;
use crate::webhook::WebhookSink;

/// Where one kind of record goes.
///
/// Note: Custom Debug impl masks webhook tokens to keep them out of logs.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// One JSON file per record under `dir`.
    JsonDir { dir: PathBuf },
    /// Append JSON lines to `path`.
    Jsonl { path: PathBuf },
    Webhook {
        url: String,
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
    #[default]
    None,
}

impl std::fmt::Debug for SinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkConfig::JsonDir { dir } => f.debug_struct("JsonDir").field("dir", dir).finish(),
            SinkConfig::Jsonl { path } => f.debug_struct("Jsonl").field("path", path).finish(),
            SinkConfig::Webhook {
                url,
                token,
                timeout_secs,
            } => f
                .debug_struct("Webhook")
                .field("url", url)
                .field("token", &token.as_ref().map(|_| "***"))
                .field("timeout_secs", timeout_secs)
                .finish(),
            SinkConfig::None => f.write_str("None"),
        }
    }
}

/// Delivery queue settings as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliverySettings {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_ms: u64,
}

fn default_capacity() -> usize {
    256
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    500
}
fn default_max_retry_delay() -> u64 {
    30_000
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            max_retry_delay_ms: default_max_retry_delay(),
        }
    }
}

impl DeliverySettings {
    pub fn to_delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig {
            capacity: self.capacity,
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            max_retry_delay: Duration::from_millis(self.max_retry_delay_ms),
        }
    }
}

/// Top-level quizcraft configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizcraftConfig {
    /// Directory searched for quiz definitions.
    #[serde(default = "default_quiz_dir")]
    pub quiz_dir: PathBuf,
    /// Output directory for attempt reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Learner id used when none is given on the command line.
    #[serde(default)]
    pub default_learner: Option<String>,
    #[serde(default)]
    pub results: SinkConfig,
    #[serde(default)]
    pub certificates: SinkConfig,
    #[serde(default)]
    pub analytics: SinkConfig,
    #[serde(default)]
    pub delivery: DeliverySettings,
}

fn default_quiz_dir() -> PathBuf {
    PathBuf::from("./quizzes")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./quizcraft-results")
}

impl Default for QuizcraftConfig {
    fn default() -> Self {
        Self {
            quiz_dir: default_quiz_dir(),
            output_dir: default_output_dir(),
            default_learner: None,
            results: SinkConfig::None,
            certificates: SinkConfig::None,
            analytics: SinkConfig::None,
            delivery: DeliverySettings::default(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

fn resolve_sink_config(config: &SinkConfig) -> SinkConfig {
    match config {
        SinkConfig::JsonDir { dir } => SinkConfig::JsonDir {
            dir: resolve_path(dir),
        },
        SinkConfig::Jsonl { path } => SinkConfig::Jsonl {
            path: resolve_path(path),
        },
        SinkConfig::Webhook {
            url,
            token,
            timeout_secs,
        } => SinkConfig::Webhook {
            url: resolve_env_vars(url),
            token: token.as_ref().map(|t| resolve_env_vars(t)),
            timeout_secs: *timeout_secs,
        },
        SinkConfig::None => SinkConfig::None,
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `quizcraft.toml` in the current directory
/// 2. `~/.config/quizcraft/config.toml`
///
/// Environment variable override: `QUIZCRAFT_WEBHOOK_URL` (results webhook).
pub fn load_config() -> Result<QuizcraftConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<QuizcraftConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("quizcraft.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = parse_config_str(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!("loaded config from {}", path.display());
            config
        }
        None => QuizcraftConfig::default(),
    };

    if let Ok(url) = std::env::var("QUIZCRAFT_WEBHOOK_URL") {
        apply_webhook_override(&mut config, url);
    }

    config.results = resolve_sink_config(&config.results);
    config.certificates = resolve_sink_config(&config.certificates);
    config.analytics = resolve_sink_config(&config.analytics);
    config.quiz_dir = resolve_path(&config.quiz_dir);
    config.output_dir = resolve_path(&config.output_dir);

    Ok(config)
}

/// Parse a TOML config string without touching the environment.
pub fn parse_config_str(content: &str) -> Result<QuizcraftConfig> {
    Ok(toml::from_str::<QuizcraftConfig>(content)?)
}

fn apply_webhook_override(config: &mut QuizcraftConfig, url: String) {
    match &mut config.results {
        SinkConfig::Webhook { url: existing, .. } => *existing = url,
        other => {
            *other = SinkConfig::Webhook {
                url,
                token: None,
                timeout_secs: None,
            }
        }
    }
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("quizcraft"))
}

fn webhook(url: &str, token: &Option<String>, timeout_secs: &Option<u64>) -> Result<Arc<WebhookSink>> {
    let sink = match timeout_secs {
        Some(secs) => WebhookSink::with_timeout(url, token.clone(), *secs)?,
        None => WebhookSink::new(url, token.clone())?,
    };
    Ok(Arc::new(sink))
}

/// Create the result sink described by `config`, if any.
pub fn create_result_sink(config: &SinkConfig) -> Result<Option<Arc<dyn ResultSink>>> {
    let sink: Arc<dyn ResultSink> = match config {
        SinkConfig::JsonDir { dir } => Arc::new(JsonDirSink::new(dir)),
        SinkConfig::Jsonl { path } => Arc::new(JsonLinesSink::new(path)),
        SinkConfig::Webhook {
            url,
            token,
            timeout_secs,
        } => webhook(url, token, timeout_secs)?,
        SinkConfig::None => return Ok(None),
    };
    Ok(Some(sink))
}

/// Create the certificate sink described by `config`, if any.
pub fn create_certificate_sink(config: &SinkConfig) -> Result<Option<Arc<dyn CertificateSink>>> {
    let sink: Arc<dyn CertificateSink> = match config {
        SinkConfig::JsonDir { dir } => Arc::new(JsonDirSink::new(dir)),
        SinkConfig::Jsonl { path } => Arc::new(JsonLinesSink::new(path)),
        SinkConfig::Webhook {
            url,
            token,
            timeout_secs,
        } => webhook(url, token, timeout_secs)?,
        SinkConfig::None => return Ok(None),
    };
    Ok(Some(sink))
}

/// Create the analytics sink described by `config`, if any. A `json_dir`
/// analytics sink appends to `<dir>/events.jsonl`.
pub fn create_analytics_sink(config: &SinkConfig) -> Result<Option<Arc<dyn AnalyticsSink>>> {
    let sink: Arc<dyn AnalyticsSink> = match config {
        SinkConfig::JsonDir { dir } => Arc::new(JsonLinesSink::new(dir.join("events.jsonl"))),
        SinkConfig::Jsonl { path } => Arc::new(JsonLinesSink::new(path)),
        SinkConfig::Webhook {
            url,
            token,
            timeout_secs,
        } => webhook(url, token, timeout_secs)?,
        SinkConfig::None => return Ok(None),
    };
    Ok(Some(sink))
}

/// Build every configured sink.
pub fn build_sinks(config: &QuizcraftConfig) -> Result<PlayerSinks> {
    let mut sinks = PlayerSinks::default();
    if let Some(sink) = create_result_sink(&config.results).context("results sink")? {
        sinks = sinks.with_results(sink);
    }
    if let Some(sink) = create_certificate_sink(&config.certificates).context("certificates sink")? {
        sinks = sinks.with_certificates(sink);
    }
    if let Some(sink) = create_analytics_sink(&config.analytics).context("analytics sink")? {
        sinks = sinks.with_analytics(sink);
    }
    Ok(sinks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_QUIZCRAFT_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_QUIZCRAFT_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_QUIZCRAFT_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("no vars"), "no vars");
        assert_eq!(resolve_env_vars("${unterminated"), "${unterminated");
        std::env::remove_var("_QUIZCRAFT_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = QuizcraftConfig::default();
        assert_eq!(config.quiz_dir, PathBuf::from("./quizzes"));
        assert_eq!(config.results, SinkConfig::None);
        assert_eq!(config.delivery.capacity, 256);
        assert_eq!(config.delivery.max_retries, 3);
    }

    #[test]
    fn parse_sink_tables() {
        let toml_str = r#"
quiz_dir = "training/quizzes"
default_learner = "ops-team"

[results]
type = "json_dir"
dir = "out"

[certificates]
type = "webhook"
url = "https://lms.example.com/certificates"
token = "tok"

[analytics]
type = "jsonl"
path = "out/events.jsonl"

[delivery]
capacity = 16
retry_delay_ms = 250
"#;
        let config = parse_config_str(toml_str).unwrap();
        assert_eq!(config.quiz_dir, PathBuf::from("training/quizzes"));
        assert_eq!(config.default_learner.as_deref(), Some("ops-team"));
        assert_eq!(config.results, SinkConfig::JsonDir { dir: "out".into() });
        assert!(matches!(config.certificates, SinkConfig::Webhook { .. }));
        assert!(matches!(config.analytics, SinkConfig::Jsonl { .. }));
        assert_eq!(config.delivery.capacity, 16);
        assert_eq!(config.delivery.max_retries, 3);

        let delivery = config.delivery.to_delivery_config();
        assert_eq!(delivery.retry_delay, Duration::from_millis(250));
        assert_eq!(delivery.max_retry_delay, Duration::from_secs(30));
    }

    #[test]
    fn unknown_sink_type_is_rejected() {
        let toml_str = r#"
[results]
type = "carrier_pigeon"
"#;
        assert!(parse_config_str(toml_str).is_err());
    }

    #[test]
    fn debug_masks_tokens() {
        let config = SinkConfig::Webhook {
            url: "https://example.com".into(),
            token: Some("super-secret".into()),
            timeout_secs: None,
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn webhook_override_replaces_results_sink() {
        let mut config = QuizcraftConfig::default();
        apply_webhook_override(&mut config, "https://hooks.example.com/a".into());
        assert!(matches!(
            &config.results,
            SinkConfig::Webhook { url, token: None, .. } if url == "https://hooks.example.com/a"
        ));

        config.results = SinkConfig::Webhook {
            url: "old".into(),
            token: Some("keep".into()),
            timeout_secs: Some(5),
        };
        apply_webhook_override(&mut config, "new".into());
        assert_eq!(
            config.results,
            SinkConfig::Webhook {
                url: "new".into(),
                token: Some("keep".into()),
                timeout_secs: Some(5),
            }
        );
    }

    #[test]
    fn explicit_missing_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_from(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn load_explicit_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quizcraft.toml");
        std::fs::write(&path, "output_dir = \"reports\"\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("reports"));
    }

    #[test]
    fn build_sinks_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = QuizcraftConfig {
            results: SinkConfig::JsonDir {
                dir: dir.path().to_path_buf(),
            },
            analytics: SinkConfig::JsonDir {
                dir: dir.path().to_path_buf(),
            },
            ..QuizcraftConfig::default()
        };
        let sinks = build_sinks(&config).unwrap();
        assert_eq!(sinks.results.as_ref().map(|s| s.name()), Some("json_dir"));
        assert!(sinks.certificates.is_none());
        assert_eq!(sinks.analytics.len(), 1);
        assert_eq!(sinks.analytics[0].name(), "jsonl");
    }
}
