use std::collections::BTreeMap;

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use scorp_core::{Topic, WeightAggregator};

fn populated_aggregator(slots: usize, topics: usize) -> WeightAggregator {
    let mut agg = WeightAggregator::new(slots);
    for day in 1..=7u64 {
        for slot in 0..slots {
            let todays: BTreeMap<Topic, f64> = (0..topics)
                .map(|i| (Topic::new(format!("topic{i}")), (i as f64 + 1.0) * 60.0))
                .collect();
            agg.fold(day, slot, &todays);
        }
    }
    agg
}

fn bench_fold(c: &mut Criterion) {
    let todays: BTreeMap<Topic, f64> = (0..50)
        .map(|i| (Topic::new(format!("topic{i}")), (i as f64 + 1.0) * 60.0))
        .collect();

    c.bench_function("fold_24_slots_50_topics", |b| {
        let mut agg = populated_aggregator(24, 50);
        let mut day = 8u64;
        b.iter(|| {
            let vector = agg.fold(day, (day % 24) as usize, black_box(&todays));
            day += 1;
            black_box(vector)
        });
    });

    c.bench_function("fold_empty_day_decay", |b| {
        let mut agg = populated_aggregator(24, 50);
        let empty = BTreeMap::new();
        let mut day = 8u64;
        b.iter(|| {
            let vector = agg.fold(day, (day % 24) as usize, black_box(&empty));
            day += 1;
            black_box(vector)
        });
    });
}

criterion_group!(benches, bench_fold);
criterion_main!(benches);
