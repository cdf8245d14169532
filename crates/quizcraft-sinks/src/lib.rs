//! quizcraft-sinks — Delivery backends for quiz results, certificates, and
//! analytics events.
//!
//! Implements the sink traits from `quizcraft-core` for JSON files, HTTP
//! webhooks, and an in-process audit log, plus a bounded retry queue that
//! can sit in front of any of them.

pub mod audit;
pub mod config;
pub mod error;
pub mod json;
pub mod mock;
pub mod queue;
pub mod webhook;

pub use audit::AuditLog;
pub use config::{build_sinks, load_config, QuizcraftConfig, SinkConfig};
pub use error::SinkError;
pub use queue::{DeliveryConfig, DeliveryQueue, DeliverySnapshot};
