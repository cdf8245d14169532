//! The `quizcraft take` command: an interactive terminal quiz.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::time::MissedTickBehavior;

use quizcraft_core::error::QuizError;
use quizcraft_core::model::{AnswerValue, QuestionType, QuizQuestion};
use quizcraft_core::parser::TomlQuestionSource;
use quizcraft_core::player::{QuizPlayer, Submission};
use quizcraft_core::session::{QuizSession, Step};

use super::AttemptOptions;

/// Seconds-remaining marks at which a warning is printed.
const WARN_AT: [u64; 3] = [60, 30, 10];

const HELP: &str = "Commands: :n next, :b back, :g N go to question N, :s submit, :q quit";

const LAST_QUESTION: &str = "That was the last question. Enter :s to submit or :b to review.";

/// One line of learner input, interpreted against the current question.
#[derive(Debug, Clone, PartialEq)]
enum Input {
    Answer(AnswerValue),
    Next,
    Back,
    GoTo(usize),
    Submit,
    Quit,
    Empty,
}

enum AttemptEnd {
    Submitted(Submission),
    Abandoned,
}

pub async fn execute(quiz_path: PathBuf, opts: AttemptOptions) -> Result<()> {
    let print_audit = opts.audit;
    let setup = opts.resolve()?;
    let quiz = super::load_quiz(&quiz_path)?;
    let delivery = setup.delivery()?;

    let context = quiz.context_for(&setup.learner_id, &setup.learner_name);
    let source = TomlQuestionSource::from_quizzes(vec![quiz.clone()]);
    let session = super::open_session(&source, &quiz, context).await?;
    let player = QuizPlayer::new(session, delivery.sinks.clone());

    println!("{}", quiz.title);
    if !quiz.description.is_empty() {
        println!("{}", quiz.description);
    }
    println!(
        "{} questions, pass mark {}%{}",
        quiz.questions.len(),
        quiz.config.pass_threshold,
        quiz.config
            .time_limit_secs
            .map(|secs| format!(", time limit {}", format_clock(secs)))
            .unwrap_or_default()
    );
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    player.start().await?;
    loop {
        match run_attempt(&player, &mut lines).await? {
            AttemptEnd::Abandoned => {
                println!("\nQuiz abandoned.");
                break;
            }
            AttemptEnd::Submitted(submission) => {
                super::print_result(&submission.result, submission.certificate.as_ref());
                let can_retake = submission.result.can_retake;
                setup.save_report(&quiz, submission.result, submission.certificate)?;

                if !can_retake {
                    break;
                }
                println!("\nRetake? [y/N]");
                let answer = lines.next_line().await?.unwrap_or_default();
                if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
                    break;
                }
                player.retake().await?;
                let attempt = player.inspect(|s| s.attempt()).await;
                println!("\nStarting attempt {attempt}.");
            }
        }
    }

    player.shutdown().await;
    delivery.finish(print_audit).await;
    Ok(())
}

async fn run_attempt<R>(player: &QuizPlayer, lines: &mut Lines<R>) -> Result<AttemptEnd>
where
    R: AsyncBufRead + Unpin,
{
    let mut shown: Option<usize> = None;
    let mut warned: HashSet<u64> = HashSet::new();
    let mut expired_notice = false;

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        // The countdown may have submitted the attempt in the background.
        if let Some(result) = player
            .inspect(|s| (!s.status().is_active()).then(|| s.result().cloned()).flatten())
            .await
        {
            println!("\nTime is up. The quiz was submitted automatically.");
            player.settle().await;
            return Ok(AttemptEnd::Submitted(Submission {
                result,
                certificate: player.certificate(),
            }));
        }

        let index = player.inspect(|s| s.current_index()).await;
        if shown != Some(index) {
            println!("\n{}", player.inspect(render_question).await);
            shown = Some(index);
        }

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(AttemptEnd::Abandoned);
                };
                let Some(question) = player.inspect(|s| s.current_question().cloned()).await else {
                    continue;
                };
                let input = match parse_input(&line, &question) {
                    Ok(input) => input,
                    Err(msg) => {
                        println!("  {msg}");
                        continue;
                    }
                };
                if let Some(end) = apply(player, &question, input, &mut shown).await {
                    return Ok(end);
                }
            }
            _ = ticker.tick() => {
                let (remaining, active) = player
                    .inspect(|s| (s.remaining_secs(), s.status().is_active()))
                    .await;
                match remaining {
                    Some(0) if active && !expired_notice => {
                        println!("\nTime is up. Enter :s to submit.");
                        expired_notice = true;
                    }
                    Some(secs) if WARN_AT.contains(&secs) && warned.insert(secs) => {
                        println!("\n{secs} seconds left.");
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Act on one input. Returns `Some` once the attempt is over.
async fn apply(
    player: &QuizPlayer,
    question: &QuizQuestion,
    input: Input,
    shown: &mut Option<usize>,
) -> Option<AttemptEnd> {
    let step = match input {
        Input::Empty => {
            // Re-render on demand.
            *shown = None;
            return None;
        }
        Input::Quit => return Some(AttemptEnd::Abandoned),
        Input::Back => player.back().await.map(|_| ()),
        Input::GoTo(index) => player.go_to(index).await,
        Input::Submit => {
            return match player.submit().await {
                Ok(submission) => Some(AttemptEnd::Submitted(submission)),
                Err(e) => {
                    report(&e);
                    None
                }
            };
        }
        Input::Next => return advance(player).await,
        Input::Answer(value) => match player.answer(&question.id, value).await {
            Ok(preview) => {
                match preview {
                    Some(true) => println!("  Correct!"),
                    Some(false) => println!("  Incorrect."),
                    None => {}
                }
                // The last answer can still be changed before submitting.
                if player.inspect(|s| s.is_last_question()).await {
                    println!("  {LAST_QUESTION}");
                    *shown = None;
                    return None;
                }
                return advance(player).await;
            }
            Err(e) => Err(e),
        },
    };

    if let Err(e) = step {
        report(&e);
    }
    None
}

fn report(e: &QuizError) {
    if let Some(line) = error_line(e) {
        println!("{line}");
    }
}

/// What to tell the learner about a rejected input. Input racing an
/// auto-submit is dropped; the loop reports the submission itself.
fn error_line(e: &QuizError) -> Option<String> {
    if e.is_stale_action() {
        tracing::debug!("input after submission ignored: {e}");
        return None;
    }
    Some(format!("  {e}"))
}

async fn advance(player: &QuizPlayer) -> Option<AttemptEnd> {
    match player.advance().await {
        Ok(Step::Moved(_)) => None,
        Ok(Step::Submitted(result)) => Some(AttemptEnd::Submitted(Submission {
            result,
            certificate: player.certificate(),
        })),
        Err(e) => {
            report(&e);
            None
        }
    }
}

fn parse_input(line: &str, question: &QuizQuestion) -> Result<Input, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }

    if let Some(command) = line.strip_prefix(':') {
        let mut parts = command.split_whitespace();
        return match (parts.next(), parts.next()) {
            (Some("n" | "next"), None) => Ok(Input::Next),
            (Some("b" | "back"), None) => Ok(Input::Back),
            (Some("s" | "submit"), None) => Ok(Input::Submit),
            (Some("q" | "quit"), None) => Ok(Input::Quit),
            (Some("g" | "goto"), Some(n)) => match n.parse::<usize>() {
                Ok(n) if n >= 1 => Ok(Input::GoTo(n - 1)),
                _ => Err(format!("not a question number: {n}")),
            },
            _ => Err(format!("unknown command :{command}. {HELP}")),
        };
    }

    if question.question_type == QuestionType::ShortAnswer {
        return Ok(Input::Answer(AnswerValue::single(line)));
    }

    if question.is_multi_select() {
        let picks = line
            .split(',')
            .map(|part| pick_option(part.trim(), question))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Input::Answer(AnswerValue::Multiple(picks)));
    }

    pick_option(line, question).map(|opt| Input::Answer(AnswerValue::Single(opt)))
}

/// Resolve an option by 1-based number or by its text.
fn pick_option(token: &str, question: &QuizQuestion) -> Result<String, String> {
    if let Ok(n) = token.parse::<usize>() {
        return n
            .checked_sub(1)
            .and_then(|i| question.options.get(i))
            .cloned()
            .ok_or_else(|| format!("pick a number between 1 and {}", question.options.len()));
    }
    question
        .options
        .iter()
        .find(|opt| opt.eq_ignore_ascii_case(token))
        .cloned()
        .ok_or_else(|| format!("'{token}' is not one of the options"))
}

fn render_question(session: &QuizSession) -> String {
    let Some(question) = session.current_question() else {
        return String::new();
    };
    let config = session.config();
    let mut out = String::new();

    let progress = session.progress();
    let mut header = format!("[Question {}/{}]", progress.position, progress.total);
    if question.points != 1 {
        header.push_str(&format!(" ({} points)", question.points));
    }
    if config.show_progress {
        header.push_str(&format!("  Answered: {}/{}", progress.answered, progress.total));
    }
    if config.show_timer {
        if let Some(secs) = session.remaining_secs() {
            header.push_str(&format!("  Time left: {}", format_clock(secs)));
        }
        if let Some(secs) = session.question_remaining_secs() {
            header.push_str(&format!("  This question: {}", format_clock(secs)));
        }
    }
    out.push_str(&header);
    out.push('\n');
    out.push_str(&question.prompt);
    out.push('\n');

    for (i, opt) in question.options.iter().enumerate() {
        out.push_str(&format!("  {}) {}\n", i + 1, opt));
    }
    if question.is_multi_select() {
        out.push_str("(select all that apply, e.g. 1,3)\n");
    } else if question.question_type == QuestionType::ShortAnswer {
        out.push_str("(type your answer)\n");
    }

    if let Some(answer) = session.current_answer() {
        out.push_str(&format!("Current answer: {}\n", answer.value));
    }
    out.push_str("> ");
    out
}

fn format_clock(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
