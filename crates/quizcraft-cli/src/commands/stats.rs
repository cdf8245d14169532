//! The `quizcraft stats` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use quizcraft_core::report::QuizReport;
use quizcraft_core::statistics::compute_quiz_stats;

pub fn execute(reports_dir: PathBuf, format: String) -> Result<()> {
    let reports = load_reports(&reports_dir)?;
    if reports.is_empty() {
        anyhow::bail!("no reports found in {}", reports_dir.display());
    }

    let stats = compute_quiz_stats(&reports);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    for quiz in stats.values() {
        println!("\n{} ({})", quiz.title, quiz.quiz_id);

        let mut summary = Table::new();
        summary.set_header(vec![
            "Attempts", "Learners", "Avg", "Best", "Worst", "Pass rate", "Avg time", "Certificates",
        ]);
        summary.add_row(vec![
            Cell::new(quiz.attempts),
            Cell::new(quiz.learners),
            Cell::new(format!("{:.1}%", quiz.avg_score)),
            Cell::new(format!("{}%", quiz.best_score)),
            Cell::new(format!("{}%", quiz.worst_score)),
            Cell::new(format!("{:.0}%", quiz.pass_rate * 100.0)),
            Cell::new(format!("{}s", quiz.avg_time_spent_secs)),
            Cell::new(quiz.certificates_issued),
        ]);
        println!("{summary}");

        let mut questions = Table::new();
        questions.set_header(vec!["Question", "Answered", "Correct", "Skipped", "Correct rate"]);
        for q in quiz.per_question.values() {
            questions.add_row(vec![
                Cell::new(&q.question_id),
                Cell::new(q.answered),
                Cell::new(q.correct),
                Cell::new(q.skipped),
                Cell::new(format!("{:.0}%", q.correct_rate() * 100.0)),
            ]);
        }
        println!("{questions}");
    }

    Ok(())
}

/// Load every report JSON in a directory. Files that fail to parse are
/// skipped with a warning.
fn load_reports(dir: &Path) -> Result<Vec<QuizReport>> {
    let mut reports = Vec::new();

    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read reports directory: {}", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match QuizReport::load_json(&path) {
            Ok(report) => reports.push(report),
            Err(e) => tracing::warn!("skipping {}: {e:#}", path.display()),
        }
    }

    Ok(reports)
}
