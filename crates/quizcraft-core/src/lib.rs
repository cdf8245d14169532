//! quizcraft-core — Quiz session engine, evaluation, and scoring.
//!
//! This crate defines the data model, the answer evaluator, the result
//! aggregator, certificate issuance, and the session state machine that the
//! rest of quizcraft builds on.

pub mod certificate;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod parser;
pub mod player;
pub mod report;
pub mod scoring;
pub mod session;
pub mod statistics;
pub mod timer;
pub mod traits;
