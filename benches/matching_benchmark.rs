use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use tripdude::models::{Activity, Price};
use tripdude::services::matching::{build_classifier_prompt, parse_matching_ids, split_into_batches};

/// A full candidate set shaped like real activities API output.
fn candidates(count: usize) -> Vec<Activity> {
    (0..count)
        .map(|i| Activity {
            id: Some(format!("{}", 20_000 + i)),
            name: Some(format!("Guided walking tour number {i} of the old town")),
            short_description: Some("Discover hidden squares and local food".to_string()),
            description: Some(
                "A three hour walk through the historic centre with tastings at \
                 family-run bakeries and a stop at the cathedral."
                    .to_string(),
            ),
            rating: Some("4.6".to_string()),
            price: Some(Price {
                amount: Some("39.00".to_string()),
                currency_code: Some("EUR".to_string()),
            }),
            minimum_duration: Some("3 hours".to_string()),
            ..Default::default()
        })
        .collect()
}

fn benchmark_classifier_round(c: &mut Criterion) {
    let batches = split_into_batches(candidates(200), 50);
    let answer: String = (0u32..50)
        .filter(|i| i % 3 == 0)
        .map(|i| format!("\"{}\"", 20_000 + i))
        .collect::<Vec<_>>()
        .join(", ");

    let mut group = c.benchmark_group("classifier_round");

    group.bench_function("build_prompts_200_candidates", |b| {
        b.iter(|| {
            for batch in &batches {
                black_box(build_classifier_prompt(
                    black_box("food tours with local tastings"),
                    batch,
                ));
            }
        })
    });

    group.bench_function("parse_answer_50_ids", |b| {
        b.iter(|| parse_matching_ids(black_box(&answer)))
    });

    group.finish();
}

criterion_group!(benches, benchmark_classifier_round);
criterion_main!(benches);
