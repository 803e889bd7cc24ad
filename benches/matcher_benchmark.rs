use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use negotiation_graph::nlq::{build_query, match_question};
use negotiation_graph::{Interpreter, PatternTable, ScriptedGateway, EXAMPLE_QUESTIONS};

/// Benchmark rule selection over the example questions
fn bench_match_question(c: &mut Criterion) {
    let table = PatternTable::builtin().unwrap();
    let mut group = c.benchmark_group("match_question");

    for (i, question) in EXAMPLE_QUESTIONS.iter().enumerate() {
        group.bench_with_input(BenchmarkId::from_parameter(i), question, |b, question| {
            b.iter(|| {
                let matched = match_question(&table, question).unwrap();
                criterion::black_box(matched.map(|m| m.params.len()));
            });
        });
    }
    group.finish();
}

/// Benchmark an unrecognized question, which scans every rule
fn bench_no_match(c: &mut Criterion) {
    let table = PatternTable::builtin().unwrap();
    c.bench_function("match_question_miss", |b| {
        b.iter(|| {
            let matched = match_question(&table, "zzzqqq nonsense about nothing").unwrap();
            criterion::black_box(matched.is_none());
        });
    });
}

/// Benchmark match plus parameter binding
fn bench_build_query(c: &mut Criterion) {
    let table = PatternTable::builtin().unwrap();
    c.bench_function("build_query_round", |b| {
        b.iter(|| {
            if let Some(matched) = match_question(&table, "What did we agree to in round 2?").unwrap() {
                let built = build_query(matched.spec, &matched.params).unwrap();
                criterion::black_box(built.text.len());
            }
        });
    });
}

/// Benchmark a full interpretation cycle against the scripted gateway
fn bench_execute_query(c: &mut Criterion) {
    let interpreter = Interpreter::new(ScriptedGateway::new()).unwrap();
    c.bench_function("execute_query_concessions", |b| {
        b.iter(|| {
            let outcome = interpreter.execute_query("Show me all concessions");
            criterion::black_box(outcome.success);
        });
    });
}

criterion_group!(
    benches,
    bench_match_question,
    bench_no_match,
    bench_build_query,
    bench_execute_query
);
criterion_main!(benches);
