//! The `quizcraft compare` command.

use std::path::PathBuf;

use anyhow::Result;

use quizcraft_core::report::QuizReport;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    fail_on_regression: bool,
    format: String,
) -> Result<()> {
    let baseline = QuizReport::load_json(&baseline_path)?;
    let current = QuizReport::load_json(&current_path)?;

    if baseline.quiz.id != current.quiz.id {
        eprintln!(
            "Warning: comparing different quizzes ({} vs {})",
            baseline.quiz.id, current.quiz.id
        );
    }

    let comparison = current.compare(&baseline);

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", comparison.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&comparison)?);
        }
        _ => {
            println!(
                "Comparison: attempt {} {}% -> attempt {} {}% ({:+})",
                comparison.baseline_attempt,
                comparison.baseline_score,
                comparison.current_attempt,
                comparison.current_score,
                comparison.delta
            );

            if !comparison.newly_incorrect.is_empty() {
                println!("\nNow incorrect:");
                for id in &comparison.newly_incorrect {
                    println!("  {id}");
                }
            }

            if !comparison.newly_correct.is_empty() {
                println!("\nNow correct:");
                for id in &comparison.newly_correct {
                    println!("  {id}");
                }
            }

            println!("\n{} question(s) unchanged", comparison.unchanged);
        }
    }

    if fail_on_regression && comparison.has_regressions() {
        std::process::exit(1);
    }

    Ok(())
}
