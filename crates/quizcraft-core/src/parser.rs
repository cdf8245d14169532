//! TOML quiz definition parser.
//!
//! Loads quizzes from TOML files and directories, validates them, and
//! serves their questions through [`QuestionSource`].

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::model::{QuestionType, QuizConfig, QuizDefinition, QuizQuestion};
use crate::traits::QuestionSource;

/// Intermediate TOML structure for parsing quiz files.
#[derive(Debug, Deserialize)]
struct TomlQuizFile {
    quiz: TomlQuizHeader,
    #[serde(default)]
    config: QuizConfig,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlQuizHeader {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    course_id: String,
    #[serde(default)]
    module_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    prompt: String,
    #[serde(rename = "type", default = "default_type_str")]
    question_type: String,
    #[serde(default)]
    options: Vec<String>,
    correct_answer: TomlCorrectAnswer,
    #[serde(default = "default_points")]
    points: u32,
    #[serde(default)]
    time_limit_secs: Option<u64>,
    #[serde(default)]
    explanation: String,
}

/// Authors may list several correct options as an array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TomlCorrectAnswer {
    One(String),
    Many(Vec<String>),
}

impl TomlCorrectAnswer {
    fn into_field(self) -> String {
        match self {
            TomlCorrectAnswer::One(s) => s,
            TomlCorrectAnswer::Many(v) => v.join(","),
        }
    }
}

fn default_type_str() -> String {
    "multiple_choice".to_string()
}

fn default_points() -> u32 {
    1
}

/// Parse a single TOML file into a `QuizDefinition`.
pub fn parse_quiz(path: &Path) -> Result<QuizDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read quiz file: {}", path.display()))?;

    parse_quiz_str(&content, path)
}

/// Parse a TOML string into a `QuizDefinition` (useful for testing).
pub fn parse_quiz_str(content: &str, source_path: &Path) -> Result<QuizDefinition> {
    let parsed: TomlQuizFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| {
            let question_type: QuestionType = q
                .question_type
                .parse()
                .map_err(|e: String| anyhow::anyhow!("question {}: {}", q.id, e))?;

            let options = if question_type == QuestionType::TrueFalse && q.options.is_empty() {
                vec!["true".to_string(), "false".to_string()]
            } else {
                q.options
            };

            Ok(QuizQuestion {
                id: q.id,
                prompt: q.prompt,
                question_type,
                options,
                correct_answer: q.correct_answer.into_field(),
                points: q.points,
                time_limit_secs: q.time_limit_secs,
                explanation: q.explanation,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QuizDefinition {
        id: parsed.quiz.id,
        title: parsed.quiz.title,
        description: parsed.quiz.description,
        course_id: parsed.quiz.course_id,
        module_id: parsed.quiz.module_id,
        config: parsed.config,
        questions,
    })
}

/// Recursively load all `.toml` quiz files from a directory.
pub fn load_quiz_directory(dir: &Path) -> Result<Vec<QuizDefinition>> {
    let mut quizzes = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            quizzes.extend(load_quiz_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_quiz(&path) {
                Ok(quiz) => quizzes.push(quiz),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    quizzes.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(quizzes)
}

/// Load a file or a whole directory.
pub fn load_quizzes(path: &Path) -> Result<Vec<QuizDefinition>> {
    if path.is_dir() {
        load_quiz_directory(path)
    } else {
        Ok(vec![parse_quiz(path)?])
    }
}

/// A warning from quiz validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn quiz(message: impl Into<String>) -> Self {
        Self {
            question_id: None,
            message: message.into(),
        }
    }

    fn question(id: &str, message: impl Into<String>) -> Self {
        Self {
            question_id: Some(id.to_string()),
            message: message.into(),
        }
    }
}

/// Point values above this are almost certainly typos.
const MAX_QUESTION_POINTS: u32 = 1_000_000;

/// Validate a quiz for common authoring mistakes.
pub fn validate_quiz(quiz: &QuizDefinition) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let config = &quiz.config;

    if quiz.questions.is_empty() {
        warnings.push(ValidationWarning::quiz("quiz has no questions"));
    }
    if config.pass_threshold > 100 {
        warnings.push(ValidationWarning::quiz(format!(
            "pass_threshold {} can never be reached",
            config.pass_threshold
        )));
    }
    if config.max_attempts == 0 {
        warnings.push(ValidationWarning::quiz("max_attempts is 0"));
    }
    if config.time_limit_secs == Some(0) && config.auto_submit {
        warnings.push(ValidationWarning::quiz(
            "time_limit_secs is 0 with auto_submit; the quiz submits on the first tick",
        ));
    }

    let mut seen_ids = HashSet::new();
    for q in &quiz.questions {
        if !seen_ids.insert(&q.id) {
            warnings.push(ValidationWarning::question(
                &q.id,
                format!("duplicate question ID: {}", q.id),
            ));
        }
        if q.prompt.trim().is_empty() {
            warnings.push(ValidationWarning::question(&q.id, "prompt is empty"));
        }
        if q.points == 0 {
            warnings.push(ValidationWarning::question(&q.id, "question is worth 0 points"));
        } else if q.points > MAX_QUESTION_POINTS {
            warnings.push(ValidationWarning::question(
                &q.id,
                format!("question is worth {} points (more than {MAX_QUESTION_POINTS})", q.points),
            ));
        }
        if q.correct_answer.trim().is_empty() {
            warnings.push(ValidationWarning::question(&q.id, "correct_answer is empty"));
        }

        match q.question_type {
            QuestionType::MultipleChoice | QuestionType::TrueFalse => {
                if q.options.is_empty() {
                    warnings.push(ValidationWarning::question(&q.id, "choice question has no options"));
                    continue;
                }
                for token in q.correct_tokens() {
                    if !q.options.iter().any(|o| o == token) {
                        warnings.push(ValidationWarning::question(
                            &q.id,
                            format!("correct answer '{token}' is not one of the options"),
                        ));
                    }
                }
                let tokens = q.correct_tokens();
                let unique: HashSet<_> = tokens.iter().collect();
                if unique.len() != tokens.len() {
                    warnings.push(ValidationWarning::question(
                        &q.id,
                        "correct_answer repeats an option; multi-select grading compares counts",
                    ));
                }
                if q.question_type == QuestionType::TrueFalse && q.options.len() != 2 {
                    warnings.push(ValidationWarning::question(
                        &q.id,
                        "true/false question should have exactly 2 options",
                    ));
                }
            }
            QuestionType::ShortAnswer => {
                if !q.options.is_empty() {
                    warnings.push(ValidationWarning::question(
                        &q.id,
                        "short answer question lists options that will not be shown",
                    ));
                }
            }
        }
    }

    warnings
}

/// Serves questions from quizzes loaded off disk.
pub struct TomlQuestionSource {
    quizzes: HashMap<String, QuizDefinition>,
}

impl TomlQuestionSource {
    /// Load a quiz file or directory.
    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::from_quizzes(load_quizzes(path)?))
    }

    pub fn from_quizzes(quizzes: Vec<QuizDefinition>) -> Self {
        Self {
            quizzes: quizzes.into_iter().map(|q| (q.id.clone(), q)).collect(),
        }
    }

    pub fn quiz(&self, quiz_id: &str) -> Option<&QuizDefinition> {
        self.quizzes.get(quiz_id)
    }

    /// Quiz ids, sorted.
    pub fn quiz_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.quizzes.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl QuestionSource for TomlQuestionSource {
    async fn fetch_questions(&self, quiz_id: &str) -> Result<Vec<QuizQuestion>> {
        self.quizzes
            .get(quiz_id)
            .map(|q| q.questions.clone())
            .ok_or_else(|| anyhow::anyhow!("quiz not found: {quiz_id}"))
    }
}
