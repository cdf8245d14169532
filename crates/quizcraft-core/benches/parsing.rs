use std::path::PathBuf;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use quizcraft_core::parser::{parse_quiz_str, validate_quiz};

fn generate_quiz_toml(num_questions: usize) -> String {
    let mut toml = String::from(
        r#"[quiz]
id = "bench-quiz"
title = "Benchmark Quiz"
course_id = "bench"

[config]
pass_threshold = 75
time_limit_secs = 600
"#,
    );

    for i in 0..num_questions {
        toml.push_str(&format!(
            r#"
[[questions]]
id = "q{i}"
prompt = "Which option is number {i}?"
type = "multiple_choice"
options = ["A", "B", "C", "D"]
correct_answer = ["A", "C"]
points = 2
explanation = "A and C are both right."
"#
        ));
    }

    toml
}

fn bench_parse_quiz(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_quiz");
    let path = PathBuf::from("bench.toml");

    for size in [5usize, 50, 200] {
        let toml = generate_quiz_toml(size);
        group.bench_function(format!("{size}_questions"), |b| {
            b.iter(|| parse_quiz_str(black_box(&toml), &path))
        });
    }

    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let path = PathBuf::from("bench.toml");
    let quiz = match parse_quiz_str(&generate_quiz_toml(200), &path) {
        Ok(quiz) => quiz,
        Err(e) => panic!("benchmark quiz failed to parse: {e:#}"),
    };

    c.bench_function("validate_200_questions", |b| {
        b.iter(|| validate_quiz(black_box(&quiz)))
    });
}

criterion_group!(benches, bench_parse_quiz, bench_validate);
criterion_main!(benches);
