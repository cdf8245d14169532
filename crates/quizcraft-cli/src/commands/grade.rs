//! The `quizcraft grade` command.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use quizcraft_core::model::AnswerValue;
use quizcraft_core::player::QuizPlayer;
use quizcraft_core::parser::TomlQuestionSource;

use super::AttemptOptions;

/// Answers keyed by question id, either under an `answers` table or at the
/// top level.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AnswersFile {
    Wrapped {
        answers: BTreeMap<String, AnswerValue>,
    },
    Flat(BTreeMap<String, AnswerValue>),
}

impl AnswersFile {
    fn into_map(self) -> BTreeMap<String, AnswerValue> {
        match self {
            AnswersFile::Wrapped { answers } => answers,
            AnswersFile::Flat(answers) => answers,
        }
    }
}

/// Read an answers file. `.json` files are parsed as JSON, anything else as
/// TOML.
pub fn load_answers(path: &Path) -> Result<BTreeMap<String, AnswerValue>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read answers file: {}", path.display()))?;

    let file: AnswersFile = if path.extension().and_then(|e| e.to_str()) == Some("json") {
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse answers JSON: {}", path.display()))?
    } else {
        toml::from_str(&content)
            .with_context(|| format!("failed to parse answers TOML: {}", path.display()))?
    };

    Ok(file.into_map())
}

pub async fn execute(quiz_path: PathBuf, answers_path: PathBuf, opts: AttemptOptions) -> Result<()> {
    let print_audit = opts.audit;
    let setup = opts.resolve()?;
    let quiz = super::load_quiz(&quiz_path)?;
    let answers = load_answers(&answers_path)?;

    if let Some(unknown) = answers
        .keys()
        .find(|id| !quiz.questions.iter().any(|q| &q.id == *id))
    {
        anyhow::bail!("answers file references unknown question '{unknown}'");
    }

    let delivery = setup.delivery()?;
    let context = quiz.context_for(&setup.learner_id, &setup.learner_name);
    let source = TomlQuestionSource::from_quizzes(vec![quiz.clone()]);
    let session = super::open_session(&source, &quiz, context).await?;
    let player = QuizPlayer::new(session, delivery.sinks.clone());

    tracing::info!(
        quiz = %quiz.id,
        learner = %setup.learner_id,
        answers = answers.len(),
        "grading answers file"
    );

    player.start().await?;
    for question in &quiz.questions {
        if let Some(value) = answers.get(&question.id) {
            player.answer(&question.id, value.clone()).await?;
        }
    }
    let submission = player.submit().await;
    player.shutdown().await;
    let submission = submission?;

    println!("Quiz: {} ({})", quiz.title, quiz.id);
    super::print_result(&submission.result, submission.certificate.as_ref());
    setup.save_report(&quiz, submission.result, submission.certificate)?;

    delivery.finish(print_audit).await;
    Ok(())
}
