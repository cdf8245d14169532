//! quizcraft-report — Self-contained HTML rendering of attempt reports.

pub mod html;

pub use html::{generate_html, write_html_report};
