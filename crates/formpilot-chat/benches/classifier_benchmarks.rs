//! Benchmarks for the rule-based hot path: intent classification and
//! readiness detection run on every text input.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use formpilot_chat::{indicates_ready, IntentClassifier};

const INPUTS: [&str; 8] = [
    "I need to renew my driver's license before it expires next month",
    "Hi, I just moved here and want to register my car",
    "How do I transfer the title when I sell my vehicle to a friend?",
    "It's my first time getting a driver's license, what do I need?",
    "2",
    "Can you tell me where the nearest office is and what the hours are?",
    "Yes, I have all the documents ready",
    "I'm still missing the proof of address papers",
];

fn bench_classify(c: &mut Criterion) {
    let lenient = IntentClassifier::default();
    let strict = IntentClassifier::new(true);

    let mut group = c.benchmark_group("intent_classifier");
    group.sample_size(200);
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("lenient_mixed_inputs", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let input = INPUTS[idx % INPUTS.len()];
            idx += 1;
            lenient.classify(black_box(input))
        });
    });

    group.bench_function("strict_mixed_inputs", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let input = INPUTS[idx % INPUTS.len()];
            idx += 1;
            strict.classify(black_box(input))
        });
    });

    group.bench_function("no_match_long_input", |b| {
        let long = "please help me understand what is going on with this office ".repeat(30);
        b.iter(|| lenient.classify(black_box(&long)));
    });

    group.finish();
}

fn bench_readiness(c: &mut Criterion) {
    let mut group = c.benchmark_group("readiness_detector");
    group.sample_size(200);

    group.bench_function("mixed_inputs", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let input = INPUTS[idx % INPUTS.len()];
            idx += 1;
            indicates_ready(black_box(input))
        });
    });

    group.finish();
}

criterion_group!(benches, bench_classify, bench_readiness);
criterion_main!(benches);
