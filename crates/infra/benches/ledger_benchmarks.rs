use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

use stockwatch_core::{FixedClock, OwnerId};
use stockwatch_detection::{DetectionConfig, Detector, DetectorSet};
use stockwatch_infra::event_store::InMemoryEventStore;
use stockwatch_infra::{MutationRequest, RegisterItemRequest, StockLedger};
use stockwatch_inventory::{ChangeType, InventoryItemId, UnitOfMeasure};

struct Bench {
    ledger: StockLedger<InMemoryEventStore>,
    clock: Arc<FixedClock>,
    owner: OwnerId,
    item: InventoryItemId,
}

fn setup(unit: UnitOfMeasure, opening_stock: i64) -> Bench {
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()));
    let ledger = StockLedger::new(InMemoryEventStore::new(), clock.clone(), DetectionConfig::default());
    let owner = OwnerId::new();
    let item = ledger
        .register_item(owner, RegisterItemRequest::new("bench-fish", unit))
        .unwrap()
        .item_id;
    if opening_stock > 0 {
        ledger
            .append_mutation(owner, item, MutationRequest::new(ChangeType::In, Decimal::from(opening_stock)))
            .unwrap();
    }
    Bench {
        ledger,
        clock,
        owner,
        item,
    }
}

fn bench_append_mutation(c: &mut Criterion) {
    let mut group = c.benchmark_group("append_mutation");
    group.sample_size(200);

    // Small alternating moves far apart: every detector runs, none fires.
    group.bench_function("no_anomaly", |b| {
        let bench = setup(UnitOfMeasure::Box, 1_000_000);
        let mut inbound = false;
        b.iter(|| {
            bench.clock.advance(Duration::minutes(10));
            inbound = !inbound;
            let change_type = if inbound { ChangeType::In } else { ChangeType::Out };
            let outcome = bench
                .ledger
                .append_mutation(
                    bench.owner,
                    bench.item,
                    MutationRequest::new(change_type, black_box(Decimal::from(7))),
                )
                .unwrap();
            black_box(outcome);
        });
    });

    // Stock keeps going negative: several records per mutation.
    group.bench_function("negative_and_low_stock", |b| {
        let bench = setup(UnitOfMeasure::Piece, 0);
        b.iter(|| {
            bench.clock.advance(Duration::minutes(10));
            let outcome = bench
                .ledger
                .append_mutation(
                    bench.owner,
                    bench.item,
                    MutationRequest::new(ChangeType::Out, black_box(Decimal::from(4))),
                )
                .unwrap();
            black_box(outcome);
        });
    });

    group.finish();
}

fn bench_detector_subsets(c: &mut Criterion) {
    let mut group = c.benchmark_group("detector_subsets");

    let subsets = [
        ("all", DetectorSet::default()),
        ("negative_only", DetectorSet::only([Detector::NegativeStock])),
        ("duplicate_only", DetectorSet::only([Detector::DuplicateInput])),
    ];

    for (name, detectors) in subsets {
        group.bench_function(name, |b| {
            let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()));
            let ledger = StockLedger::new(InMemoryEventStore::new(), clock.clone(), DetectionConfig::default())
                .with_detectors(detectors.clone());
            let owner = OwnerId::new();
            let item = ledger
                .register_item(owner, RegisterItemRequest::new("bench-fish", UnitOfMeasure::Kg))
                .unwrap()
                .item_id;

            b.iter(|| {
                clock.advance(Duration::seconds(30));
                black_box(
                    ledger
                        .append_mutation(owner, item, MutationRequest::new(ChangeType::In, Decimal::from(12)))
                        .unwrap(),
                );
            });
        });
    }

    group.finish();
}

fn bench_read_model_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_model_rebuild");

    for mutations in [10usize, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*mutations as u64));
        group.bench_with_input(BenchmarkId::new("rebuild", mutations), mutations, |b, &count| {
            let bench = setup(UnitOfMeasure::Box, 0);
            for i in 0..count {
                bench.clock.advance(Duration::minutes(10));
                let change_type = if i % 3 == 0 { ChangeType::Out } else { ChangeType::In };
                bench
                    .ledger
                    .append_mutation(bench.owner, bench.item, MutationRequest::new(change_type, Decimal::from(6)))
                    .unwrap();
            }

            b.iter(|| black_box(bench.ledger.rebuild_read_models().unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_append_mutation,
    bench_detector_subsets,
    bench_read_model_rebuild
);
criterion_main!(benches);
