use criterion::{Criterion, black_box, criterion_group, criterion_main};
use soak_harness::{Classifier, MarkerClassifier, TrialPlan};

fn noisy_output() -> String {
    let mut out = String::new();
    for i in 0..2_000 {
        out.push_str(&format!("packet {} retransmitted after 114/140 ms\n", i));
    }
    out.push_str("14/14\n");
    out
}

fn benchmark_classify(c: &mut Criterion) {
    let output = noisy_output();
    let substring = MarkerClassifier::default();
    let token = MarkerClassifier::token("14/14");

    c.bench_function("classify_substring", |b| {
        b.iter(|| assert!(substring.classify(black_box(&output))))
    });
    c.bench_function("classify_token", |b| {
        b.iter(|| assert!(token.classify(black_box(&output))))
    });
}

fn benchmark_plan(c: &mut Criterion) {
    let plan = TrialPlan::new(100, 5).aux_seed(7);

    c.bench_function("plan_iterate_500", |b| {
        b.iter(|| black_box(&plan).iter().map(|s| s.auxiliary as u64).sum::<u64>())
    });
}

criterion_group!(benches, benchmark_classify, benchmark_plan);
criterion_main!(benches);
