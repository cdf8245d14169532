//! HTML report generator.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined.

use anyhow::{Context, Result};
use std::path::Path;

use quizcraft_core::certificate::Certificate;
use quizcraft_core::model::QuizResult;
use quizcraft_core::report::{QuestionReview, QuizReport};

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn format_duration(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Generate an HTML page for one attempt.
pub fn generate_html(report: &QuizReport) -> String {
    let result = &report.result;
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>quizcraft result: {}</title>\n",
        html_escape(&report.quiz.title)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    html.push_str("<header>\n");
    html.push_str(&format!("<h1>{}</h1>\n", html_escape(&report.quiz.title)));
    html.push_str(&format!(
        "<p class=\"meta\">Learner: <strong>{}</strong> | Course: {} | Attempt {} | {}</p>\n",
        html_escape(&report.context.learner_name),
        html_escape(&report.quiz.course_id),
        result.attempt,
        result.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    // Summary
    let outcome_class = if result.passed { "pass" } else { "fail" };
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Summary</h2>\n");
    html.push_str(&format!(
        "<p class=\"outcome {}\">{}</p>\n",
        outcome_class,
        html_escape(&result.feedback)
    ));
    html.push_str(&generate_score_bar(result));
    html.push_str("<table class=\"summary\">\n");
    html.push_str("<thead><tr><th>Score</th><th>Pass mark</th><th>Correct</th><th>Answered</th><th>Points</th><th>Time</th><th>Attempts left</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    html.push_str(&format!(
        "<tr><td class=\"{}\">{}%</td><td>{}%</td><td>{}/{}</td><td>{}/{}</td><td>{}/{}</td><td>{}</td><td>{}</td></tr>\n",
        outcome_class,
        result.score,
        result.pass_threshold,
        result.correct_count,
        result.answered_count,
        result.answered_count,
        result.total_questions,
        result.earned_points,
        result.total_points,
        format_duration(result.time_spent_secs),
        result.attempts_remaining,
    ));
    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    if let Some(certificate) = &report.certificate {
        html.push_str(&generate_certificate_panel(certificate));
    }

    // Per-question breakdown
    html.push_str("<section class=\"results\">\n");
    html.push_str("<h2>Questions</h2>\n");
    html.push_str("<table class=\"results-table\" id=\"results\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable(0)\">Question</th><th onclick=\"sortTable(1)\">Prompt</th><th onclick=\"sortTable(2)\">Your answer</th><th onclick=\"sortTable(3)\">Correct answer</th><th onclick=\"sortTable(4)\">Points</th><th onclick=\"sortTable(5)\">Result</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for review in &report.review {
        html.push_str(&question_row(review));
    }
    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(
        &serde_json::to_string_pretty(report).unwrap_or_default(),
    ));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    // JavaScript for sorting
    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

fn question_row(review: &QuestionReview) -> String {
    let (class, label) = match review.is_correct {
        Some(true) => ("pass", "Correct"),
        Some(false) => ("fail", "Incorrect"),
        None => ("skipped", "Not answered"),
    };
    let given = review
        .given
        .as_ref()
        .map(|v| html_escape(&v.to_string()))
        .unwrap_or_else(|| "-".to_string());

    let mut prompt = html_escape(&review.prompt);
    if !review.explanation.is_empty() {
        prompt.push_str(&format!(
            "<div class=\"explanation\">{}</div>",
            html_escape(&review.explanation)
        ));
    }

    format!(
        "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td class=\"{}\">{}</td></tr>\n",
        class,
        html_escape(&review.question_id),
        prompt,
        given,
        html_escape(&review.correct_answer),
        review.points,
        class,
        label
    )
}

fn generate_certificate_panel(certificate: &Certificate) -> String {
    let mut html = String::new();
    html.push_str("<section class=\"certificate\">\n");
    html.push_str("<h2>Certificate of Completion</h2>\n");
    html.push_str(&format!(
        "<p>This certifies that <strong>{}</strong> completed <strong>{}</strong> with a score of {}%.</p>\n",
        html_escape(&certificate.recipient_name),
        html_escape(&certificate.course_id),
        certificate.score
    ));
    html.push_str("<dl>\n");
    html.push_str(&format!(
        "<dt>Certificate number</dt><dd>{}</dd>\n",
        html_escape(&certificate.number)
    ));
    html.push_str(&format!(
        "<dt>Verification code</dt><dd><code>{}</code></dd>\n",
        html_escape(&certificate.verification_code)
    ));
    html.push_str(&format!(
        "<dt>Issued</dt><dd>{}</dd>\n",
        certificate.issued_at.format("%Y-%m-%d")
    ));
    html.push_str("</dl>\n");
    html.push_str("</section>\n");
    html
}

/// Horizontal bar of the score with a marker at the pass threshold.
fn generate_score_bar(result: &QuizResult) -> String {
    let max_width = 400;
    let bar_height = 24;
    let width = result.score.min(100) as usize * max_width / 100;
    let marker = result.pass_threshold.min(100) as usize * max_width / 100;
    let color = if result.passed { "#22c55e" } else { "#ef4444" };

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        max_width + 60,
        bar_height + 20
    );
    svg.push_str(&format!(
        "  <rect x=\"0\" y=\"10\" width=\"{}\" height=\"{}\" fill=\"#e5e7eb\" rx=\"4\"/>\n",
        max_width, bar_height
    ));
    svg.push_str(&format!(
        "  <rect x=\"0\" y=\"10\" width=\"{}\" height=\"{}\" fill=\"{}\" rx=\"4\"/>\n",
        width, bar_height, color
    ));
    svg.push_str(&format!(
        "  <line x1=\"{marker}\" y1=\"4\" x2=\"{marker}\" y2=\"{}\" stroke=\"currentColor\" stroke-width=\"2\"/>\n",
        bar_height + 16
    ));
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{}%</text>\n",
        max_width + 8,
        10 + bar_height / 2,
        result.score
    ));
    svg.push_str("</svg>\n");
    svg
}

/// Write an HTML report to a file.
pub fn write_html_report(report: &QuizReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write HTML report to {}", path.display()))?;
    Ok(())
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --fail: #fde2e2; --skip: #f3f4f6; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --fail: #7f1d1d; --skip: #1f2937; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
.outcome { font-size: 1.2rem; padding: 0.75rem 1rem; border-radius: 8px; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; vertical-align: top; }
th { background: var(--border); cursor: pointer; }
.pass { background: var(--pass); }
.fail { background: var(--fail); }
.skipped { background: var(--skip); }
.explanation { margin-top: 0.4rem; font-size: 0.85rem; color: #6b7280; }
.certificate { border: 2px solid #eab308; border-radius: 12px; padding: 1rem 2rem; margin: 2rem 0; }
.certificate dt { font-weight: bold; }
.certificate dd { margin: 0 0 0.5rem 0; }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(col) {
  const table = document.getElementById('results');
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    return asc ? va.localeCompare(vb) : vb.localeCompare(va);
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use quizcraft_core::model::{
        AnswerValue, QuestionType, QuizAnswer, QuizConfig, QuizDefinition, QuizQuestion,
    };
    use quizcraft_core::scoring::{grade, AttemptInfo};
    use std::collections::HashMap;

    fn make_test_report(pick: &str) -> QuizReport {
        let quiz = QuizDefinition {
            id: "html-quiz".into(),
            title: "Fire <Safety>".into(),
            description: String::new(),
            course_id: "onboarding".into(),
            module_id: None,
            config: QuizConfig::default(),
            questions: vec![
                QuizQuestion {
                    id: "q1".into(),
                    prompt: "Which extinguisher for electrical fires?".into(),
                    question_type: QuestionType::MultipleChoice,
                    options: vec!["CO2".into(), "Water".into()],
                    correct_answer: "CO2".into(),
                    points: 1,
                    time_limit_secs: None,
                    explanation: "Water conducts electricity.".into(),
                },
                QuizQuestion {
                    id: "q2".into(),
                    prompt: "Skipped question".into(),
                    question_type: QuestionType::ShortAnswer,
                    options: vec![],
                    correct_answer: "x".into(),
                    points: 1,
                    time_limit_secs: None,
                    explanation: String::new(),
                },
            ],
        };
        let mut answers = HashMap::new();
        answers.insert(
            "q1".to_string(),
            QuizAnswer {
                question_id: "q1".into(),
                value: AnswerValue::single(pick),
                is_correct: None,
                time_spent_secs: 4,
                submitted_at: chrono::Utc::now(),
            },
        );
        let result = grade(
            &quiz.questions,
            &answers,
            &quiz.config,
            AttemptInfo {
                attempt: 1,
                time_spent_secs: 75,
            },
        );
        let context = quiz.context_for("learner-1", "Alex");
        let certificate = Certificate::issue(&context, &result);
        QuizReport::new(&quiz, context, result, certificate)
    }

    #[test]
    fn html_report_contains_required_elements() {
        let report = make_test_report("CO2");
        let html = generate_html(&report);

        assert!(html.contains("<html"));
        assert!(html.contains("</html>"));
        assert!(html.contains("Fire &lt;Safety&gt;"));
        assert!(!html.contains("Fire <Safety>"));
        assert!(html.contains("Alex"));
        assert!(html.contains("Congratulations!"));
        assert!(html.contains("Water conducts electricity."));
        assert!(html.contains("Not answered"));
        assert!(html.contains("1:15"));
    }

    #[test]
    fn certificate_panel_only_when_passed() {
        let passed = make_test_report("CO2");
        let number = passed.certificate.as_ref().unwrap().number.clone();
        let html = generate_html(&passed);
        assert!(html.contains("Certificate of Completion"));
        assert!(html.contains(&number));

        let failed = make_test_report("Water");
        assert!(failed.certificate.is_none());
        let html = generate_html(&failed);
        assert!(!html.contains("Certificate of Completion"));
        assert!(html.contains("A score of 70% is required to pass."));
    }

    #[test]
    fn html_report_write_to_file() {
        let report = make_test_report("CO2");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.html");

        write_html_report(&report, &path).unwrap();
        assert!(path.exists());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<html"));
    }
}
