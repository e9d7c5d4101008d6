use criterion::{black_box, criterion_group, criterion_main, Criterion};
use money_ledger::ledger::book::Ledger;
use money_ledger::simulation::sample::{generate_sample_ledger, SampleConfig};

fn sample(accounts: usize, per_account: usize) -> Ledger {
    let config = SampleConfig {
        account_count: accounts,
        transactions_per_account: per_account,
        seed: Some(2024),
        ..Default::default()
    };
    generate_sample_ledger(&config).expect("sample ledger")
}

fn bench_rebalance_all(c: &mut Criterion) {
    let mut ledger = sample(10, 500);

    c.bench_function("rebalance_all_5k", |b| {
        b.iter(|| black_box(ledger.rebalance_all()))
    });
}

fn bench_recompute_categories(c: &mut Criterion) {
    let mut ledger = sample(10, 500);

    c.bench_function("recompute_category_balances_5k", |b| {
        b.iter(|| ledger.recompute_category_balances())
    });
}

fn bench_check_transfers(c: &mut Criterion) {
    let mut ledger = sample(20, 500);

    c.bench_function("check_transfers_10k", |b| {
        b.iter(|| black_box(ledger.check_transfers()))
    });
}

fn bench_snapshot_round_trip(c: &mut Criterion) {
    let ledger = sample(5, 200);

    c.bench_function("snapshot_round_trip_1k", |b| {
        b.iter(|| {
            let snapshot = ledger.snapshot();
            black_box(Ledger::from_snapshot(snapshot).expect("reload"))
        })
    });
}

criterion_group!(
    benches,
    bench_rebalance_all,
    bench_recompute_categories,
    bench_check_transfers,
    bench_snapshot_round_trip
);
criterion_main!(benches);
