//! Aggregate statistics across saved attempt reports.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::report::QuizReport;

/// Statistics for one quiz across every attempt seen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizStats {
    pub quiz_id: String,
    pub title: String,
    /// Number of attempts (reports).
    pub attempts: usize,
    /// Distinct learners.
    pub learners: usize,
    pub avg_score: f64,
    pub best_score: u32,
    pub worst_score: u32,
    /// Fraction of attempts that passed, 0.0..=1.0.
    pub pass_rate: f64,
    pub avg_time_spent_secs: u64,
    pub certificates_issued: usize,
    /// Per-question statistics, keyed by question id.
    pub per_question: BTreeMap<String, QuestionStats>,
}

/// How one question fared across attempts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionStats {
    pub question_id: String,
    pub answered: usize,
    pub correct: usize,
    pub skipped: usize,
}

impl QuestionStats {
    /// Correct answers over answered attempts.
    pub fn correct_rate(&self) -> f64 {
        if self.answered == 0 {
            0.0
        } else {
            self.correct as f64 / self.answered as f64
        }
    }
}

/// Compute statistics per quiz, keyed by quiz id.
pub fn compute_quiz_stats(reports: &[QuizReport]) -> BTreeMap<String, QuizStats> {
    let mut grouped: BTreeMap<&str, Vec<&QuizReport>> = BTreeMap::new();
    for r in reports {
        grouped.entry(r.quiz.id.as_str()).or_default().push(r);
    }

    grouped
        .into_iter()
        .map(|(quiz_id, group)| (quiz_id.to_string(), stats_for(quiz_id, &group)))
        .collect()
}

fn stats_for(quiz_id: &str, group: &[&QuizReport]) -> QuizStats {
    let attempts = group.len();
    let scores: Vec<u32> = group.iter().map(|r| r.result.score).collect();
    let learners: HashSet<&str> = group.iter().map(|r| r.context.learner_id.as_str()).collect();
    let passed = group.iter().filter(|r| r.result.passed).count();
    let total_time: u64 = group.iter().map(|r| r.result.time_spent_secs).sum();

    let mut per_question: BTreeMap<String, QuestionStats> = BTreeMap::new();
    for report in group {
        for review in &report.review {
            let entry = per_question
                .entry(review.question_id.clone())
                .or_insert_with(|| QuestionStats {
                    question_id: review.question_id.clone(),
                    ..Default::default()
                });
            match review.is_correct {
                Some(true) => {
                    entry.answered += 1;
                    entry.correct += 1;
                }
                Some(false) => entry.answered += 1,
                None => entry.skipped += 1,
            }
        }
    }

    let avg_score = if attempts == 0 {
        0.0
    } else {
        scores.iter().map(|&s| s as f64).sum::<f64>() / attempts as f64
    };

    QuizStats {
        quiz_id: quiz_id.to_string(),
        title: group
            .first()
            .map(|r| r.quiz.title.clone())
            .unwrap_or_default(),
        attempts,
        learners: learners.len(),
        avg_score,
        best_score: scores.iter().copied().max().unwrap_or(0),
        worst_score: scores.iter().copied().min().unwrap_or(0),
        pass_rate: if attempts == 0 {
            0.0
        } else {
            passed as f64 / attempts as f64
        },
        avg_time_spent_secs: if attempts == 0 {
            0
        } else {
            total_time / attempts as u64
        },
        certificates_issued: group.iter().filter(|r| r.certificate.is_some()).count(),
        per_question,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::Certificate;
    use crate::model::{
        AnswerValue, QuestionType, QuizAnswer, QuizConfig, QuizDefinition, QuizQuestion,
    };
    use crate::scoring::{grade, AttemptInfo};
    use chrono::Utc;
    use std::collections::HashMap;

    fn quiz(id: &str) -> QuizDefinition {
        let question = |qid: &str| QuizQuestion {
            id: qid.into(),
            prompt: qid.into(),
            question_type: QuestionType::ShortAnswer,
            options: vec![],
            correct_answer: "yes".into(),
            points: 1,
            time_limit_secs: None,
            explanation: String::new(),
        };
        QuizDefinition {
            id: id.into(),
            title: format!("Quiz {id}"),
            description: String::new(),
            course_id: "c".into(),
            module_id: None,
            config: QuizConfig::default(),
            questions: vec![question("q1"), question("q2")],
        }
    }

    fn attempt(quiz: &QuizDefinition, learner: &str, picks: &[(&str, &str)], secs: u64) -> QuizReport {
        let answers: HashMap<String, QuizAnswer> = picks
            .iter()
            .map(|(id, v)| {
                (
                    id.to_string(),
                    QuizAnswer {
                        question_id: id.to_string(),
                        value: AnswerValue::single(*v),
                        is_correct: None,
                        time_spent_secs: 0,
                        submitted_at: Utc::now(),
                    },
                )
            })
            .collect();
        let result = grade(
            &quiz.questions,
            &answers,
            &quiz.config,
            AttemptInfo {
                attempt: 1,
                time_spent_secs: secs,
            },
        );
        let context = quiz.context_for(learner, learner);
        let certificate = Certificate::issue(&context, &result);
        QuizReport::new(quiz, context, result, certificate)
    }

    #[test]
    fn aggregates_per_quiz() {
        let a = quiz("a");
        let b = quiz("b");
        let reports = vec![
            attempt(&a, "ann", &[("q1", "yes"), ("q2", "yes")], 60),
            attempt(&a, "ann", &[("q1", "yes"), ("q2", "no")], 40),
            attempt(&a, "bob", &[("q1", "no")], 20),
            attempt(&b, "bob", &[("q1", "yes")], 10),
        ];

        let stats = compute_quiz_stats(&reports);
        assert_eq!(stats.len(), 2);

        let a_stats = &stats["a"];
        assert_eq!(a_stats.attempts, 3);
        assert_eq!(a_stats.learners, 2);
        assert_eq!(a_stats.best_score, 100);
        assert_eq!(a_stats.worst_score, 0);
        assert!((a_stats.avg_score - 50.0).abs() < 1e-9);
        assert!((a_stats.pass_rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(a_stats.avg_time_spent_secs, 40);
        assert_eq!(a_stats.certificates_issued, 1);

        let q1 = &a_stats.per_question["q1"];
        assert_eq!(q1.answered, 3);
        assert_eq!(q1.correct, 2);
        let q2 = &a_stats.per_question["q2"];
        assert_eq!(q2.answered, 2);
        assert_eq!(q2.skipped, 1);
        assert!((q2.correct_rate() - 0.5).abs() < 1e-9);

        assert_eq!(stats["b"].attempts, 1);
        assert_eq!(stats["b"].title, "Quiz b");
    }

    #[test]
    fn empty_input() {
        assert!(compute_quiz_stats(&[]).is_empty());
        assert_eq!(QuestionStats::default().correct_rate(), 0.0);
    }
}
