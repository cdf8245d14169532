//! The `quizcraft init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    if Path::new("quizcraft.toml").exists() {
        println!("quizcraft.toml already exists, skipping.");
    } else {
        std::fs::write("quizcraft.toml", SAMPLE_CONFIG)?;
        println!("Created quizcraft.toml");
    }

    std::fs::create_dir_all("quizzes")?;
    let example_path = Path::new("quizzes/example.toml");
    if example_path.exists() {
        println!("quizzes/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_QUIZ)?;
        println!("Created quizzes/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit quizzes/example.toml or add your own quizzes");
    println!("  2. Run: quizcraft validate --quiz quizzes/example.toml");
    println!("  3. Run: quizcraft take --quiz quizzes/example.toml");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# quizcraft configuration

quiz_dir = "./quizzes"
output_dir = "./quizcraft-results"
# default_learner = "ada"

[results]
type = "json_dir"
dir = "./quizcraft-results/records"

[certificates]
type = "json_dir"
dir = "./quizcraft-results/records"

[analytics]
type = "jsonl"
path = "./quizcraft-results/events.jsonl"

# [results]
# type = "webhook"
# url = "${QUIZCRAFT_WEBHOOK_URL}"
# token = "${QUIZCRAFT_WEBHOOK_TOKEN}"
# timeout_secs = 10

[delivery]
capacity = 256
max_retries = 3
retry_delay_ms = 500
max_retry_delay_ms = 30000
"#;

const EXAMPLE_QUIZ: &str = r#"[quiz]
id = "example"
title = "Example Quiz"
description = "A short quiz to get started"
course_id = "getting-started"

[config]
pass_threshold = 70
time_limit_secs = 300
max_attempts = 3
immediate_feedback = true

[[questions]]
id = "capital"
prompt = "What is the capital of France?"
type = "multiple_choice"
options = ["Berlin", "Paris", "Madrid"]
correct_answer = "Paris"
explanation = "Paris has been the capital of France since 987."

[[questions]]
id = "earth_round"
prompt = "The Earth is round."
type = "true_false"
correct_answer = "true"

[[questions]]
id = "primes"
prompt = "Which of these numbers are prime?"
type = "multiple_choice"
options = ["2", "4", "7", "9"]
correct_answer = ["2", "7"]
points = 2

[[questions]]
id = "rust_mascot"
prompt = "What is the name of the Rust mascot crab?"
type = "short_answer"
correct_answer = "Ferris"
time_limit_secs = 60
"#;
