//! quizcraft CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "quizcraft",
    version,
    about = "Timed quizzes with scoring, retakes, and certificates"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a quiz interactively in the terminal
    Take {
        /// Path to the quiz .toml file
        #[arg(long)]
        quiz: PathBuf,

        /// Learner id (defaults to `default_learner` from config, then $USER)
        #[arg(long)]
        learner: Option<String>,

        /// Learner display name
        #[arg(long)]
        name: Option<String>,

        /// Output directory for reports
        #[arg(long)]
        output: Option<PathBuf>,

        /// Report formats: json, html, all
        #[arg(long, default_value = "json")]
        format: String,

        /// Print the audit trail after each attempt
        #[arg(long)]
        audit: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Grade a prepared answers file without prompting
    Grade {
        /// Path to the quiz .toml file
        #[arg(long)]
        quiz: PathBuf,

        /// Answers file (.toml or .json) mapping question ids to answers
        #[arg(long)]
        answers: PathBuf,

        /// Learner id (defaults to `default_learner` from config, then $USER)
        #[arg(long)]
        learner: Option<String>,

        /// Learner display name
        #[arg(long)]
        name: Option<String>,

        /// Output directory for reports
        #[arg(long)]
        output: Option<PathBuf>,

        /// Report formats: json, html, all
        #[arg(long, default_value = "json")]
        format: String,

        /// Print the audit trail after grading
        #[arg(long)]
        audit: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate quiz TOML files
    Validate {
        /// Path to a quiz file or directory
        #[arg(long)]
        quiz: PathBuf,
    },

    /// Aggregate statistics over saved reports
    Stats {
        /// Directory of report JSON files
        #[arg(long)]
        reports: PathBuf,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Compare two attempt reports
    Compare {
        /// Earlier report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Later report JSON
        #[arg(long)]
        current: PathBuf,

        /// Exit code 1 if the later attempt did worse
        #[arg(long)]
        fail_on_regression: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Create starter config and example quiz
    Init,
}

#[tokio::main]
async fn main() {
    let directive = match "quizcraft=info".parse::<tracing_subscriber::filter::Directive>() {
        Ok(directive) => directive,
        Err(e) => {
            eprintln!("Error: invalid log directive: {e}");
            process::exit(1);
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Take {
            quiz,
            learner,
            name,
            output,
            format,
            audit,
            config,
        } => {
            let opts = commands::AttemptOptions {
                learner,
                name,
                output,
                format,
                audit,
                config,
            };
            commands::take::execute(quiz, opts).await
        }
        Commands::Grade {
            quiz,
            answers,
            learner,
            name,
            output,
            format,
            audit,
            config,
        } => {
            let opts = commands::AttemptOptions {
                learner,
                name,
                output,
                format,
                audit,
                config,
            };
            commands::grade::execute(quiz, answers, opts).await
        }
        Commands::Validate { quiz } => commands::validate::execute(quiz),
        Commands::Stats { reports, format } => commands::stats::execute(reports, format),
        Commands::Compare {
            baseline,
            current,
            fail_on_regression,
            format,
        } => commands::compare::execute(baseline, current, fail_on_regression, format),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
