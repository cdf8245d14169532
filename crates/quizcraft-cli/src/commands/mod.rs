pub mod compare;
pub mod grade;
pub mod init;
pub mod stats;
pub mod take;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use comfy_table::{Cell, Table};

use quizcraft_core::certificate::Certificate;
use quizcraft_core::model::{QuizContext, QuizDefinition, QuizResult};
use quizcraft_core::player::PlayerSinks;
use quizcraft_core::report::QuizReport;
use quizcraft_core::session::QuizSession;
use quizcraft_core::traits::QuestionSource;
use quizcraft_report::html::write_html_report;
use quizcraft_sinks::config::load_config_from;
use quizcraft_sinks::json::JsonDirSink;
use quizcraft_sinks::{build_sinks, AuditLog, DeliveryQueue, QuizcraftConfig};

/// Options shared by the commands that record an attempt.
pub struct AttemptOptions {
    pub learner: Option<String>,
    pub name: Option<String>,
    pub output: Option<PathBuf>,
    pub format: String,
    pub audit: bool,
    pub config: Option<PathBuf>,
}

/// Everything an attempt needs once config has been resolved.
pub struct AttemptSetup {
    pub learner_id: String,
    pub learner_name: String,
    pub output: PathBuf,
    pub formats: Vec<String>,
    pub config: QuizcraftConfig,
}

impl AttemptOptions {
    pub fn resolve(self) -> Result<AttemptSetup> {
        let config = load_config_from(self.config.as_deref())?;

        let formats: Vec<String> = if self.format == "all" {
            vec!["json".into(), "html".into()]
        } else {
            self.format.split(',').map(|f| f.trim().to_string()).collect()
        };
        for f in &formats {
            anyhow::ensure!(
                f == "json" || f == "html",
                "unknown report format '{f}' (expected json, html, or all)"
            );
        }

        let learner_id = self
            .learner
            .or_else(|| config.default_learner.clone())
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "learner".to_string());
        anyhow::ensure!(!learner_id.trim().is_empty(), "learner id must not be empty");
        let learner_name = self.name.unwrap_or_else(|| learner_id.clone());

        Ok(AttemptSetup {
            learner_id,
            learner_name,
            output: self.output.unwrap_or_else(|| config.output_dir.clone()),
            formats,
            config,
        })
    }
}

/// Sinks for one player, routed through a delivery queue, plus an audit log.
pub struct Delivery {
    pub sinks: PlayerSinks,
    pub queue: DeliveryQueue,
    pub audit: Arc<AuditLog>,
}

impl AttemptSetup {
    /// Build the configured sinks. Certificates go to the output directory
    /// unless another certificate sink is configured.
    pub fn delivery(&self) -> Result<Delivery> {
        let mut sinks = build_sinks(&self.config)?;
        if sinks.certificates.is_none() {
            sinks = sinks.with_certificates(Arc::new(JsonDirSink::new(&self.output)));
        }

        let queue = DeliveryQueue::start(self.config.delivery.to_delivery_config());
        let audit = Arc::new(AuditLog::default());
        let sinks = queue.wrap(sinks).with_analytics(audit.clone());

        Ok(Delivery {
            sinks,
            queue,
            audit,
        })
    }

    /// Build and save the report for one attempt in every requested format.
    pub fn save_report(
        &self,
        quiz: &QuizDefinition,
        result: QuizResult,
        certificate: Option<Certificate>,
    ) -> Result<QuizReport> {
        let context = quiz.context_for(&self.learner_id, &self.learner_name);
        let report = QuizReport::new(quiz, context, result, certificate);
        let stem = format!(
            "{}-{}-attempt{}-{}",
            file_safe(&quiz.id),
            file_safe(&self.learner_id),
            report.result.attempt,
            report.created_at.format("%Y-%m-%dT%H%M%S")
        );

        for fmt in &self.formats {
            match fmt.as_str() {
                "json" => {
                    let path = self.output.join(format!("{stem}.json"));
                    report.save_json(&path)?;
                    println!("Report saved to: {}", path.display());
                }
                "html" => {
                    let path = self.output.join(format!("{stem}.html"));
                    write_html_report(&report, &path)?;
                    println!("HTML report: {}", path.display());
                }
                _ => {}
            }
        }

        Ok(report)
    }
}

impl Delivery {
    /// Drain the queue and report anything that did not make it.
    pub async fn finish(self, print_audit_trail: bool) {
        if print_audit_trail {
            print_audit(&self.audit);
        }
        let stats = self.queue.shutdown().await;
        tracing::debug!(
            delivered = stats.delivered,
            retries = stats.retries,
            "delivery queue drained"
        );
        if stats.failed > 0 || stats.dropped > 0 {
            eprintln!(
                "Warning: {} deliveries failed, {} dropped",
                stats.failed, stats.dropped
            );
        }
    }
}

pub fn print_result(result: &QuizResult, certificate: Option<&Certificate>) {
    let mut table = Table::new();
    table.set_header(vec!["Score", "Pass mark", "Outcome", "Correct", "Points", "Time", "Attempts left"]);
    table.add_row(vec![
        Cell::new(format!("{}%", result.score)),
        Cell::new(format!("{}%", result.pass_threshold)),
        Cell::new(if result.passed { "PASSED" } else { "FAILED" }),
        Cell::new(format!(
            "{}/{} ({} answered)",
            result.correct_count, result.total_questions, result.answered_count
        )),
        Cell::new(format!("{}/{}", result.earned_points, result.total_points)),
        Cell::new(format!("{}s", result.time_spent_secs)),
        Cell::new(result.attempts_remaining),
    ]);

    println!("\n{table}");
    println!("{}", result.feedback);

    if let Some(cert) = certificate {
        println!(
            "Certificate {} issued to {} (verification code {})",
            cert.number, cert.recipient_name, cert.verification_code
        );
    }
}

fn print_audit(audit: &AuditLog) {
    let mut table = Table::new();
    table.set_header(vec!["Time", "Action", "Attempt", "Detail"]);
    for entry in audit.entries() {
        table.add_row(vec![
            Cell::new(entry.at.format("%H:%M:%S")),
            Cell::new(entry.action),
            Cell::new(entry.attempt),
            Cell::new(entry.detail.to_string()),
        ]);
    }
    println!("\nAudit trail ({} events)\n{table}", audit.len());
}

fn file_safe(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Load a single quiz file and print its validation warnings.
pub fn load_quiz(path: &Path) -> Result<QuizDefinition> {
    let quiz = quizcraft_core::parser::parse_quiz(path)?;
    for w in quizcraft_core::parser::validate_quiz(&quiz) {
        let prefix = w
            .question_id
            .as_ref()
            .map(|id| format!("[{id}] "))
            .unwrap_or_default();
        eprintln!("Warning: {prefix}{}", w.message);
    }
    anyhow::ensure!(!quiz.questions.is_empty(), "quiz '{}' has no questions", quiz.id);
    Ok(quiz)
}

/// Build a session for `quiz` with the questions `source` serves for it.
pub async fn open_session(
    source: &dyn QuestionSource,
    quiz: &QuizDefinition,
    context: QuizContext,
) -> Result<QuizSession> {
    let questions = source.fetch_questions(&quiz.id).await?;
    tracing::debug!(quiz = %quiz.id, questions = questions.len(), "questions fetched");
    Ok(QuizSession::new(context, questions, quiz.config.clone())?)
}
