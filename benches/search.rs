use chrono::Utc;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};

use dirserve::index::{IndexEntry, MetadataSnapshot};
use dirserve::search;

const WORDS: &[&str] = &["music", "photos", "backup", "rock", "jazz", "2023", "raw", "docs", "notes", "video"];

fn gen_snapshot(n: usize, seed: u64) -> MetadataSnapshot {
    let mut rng = StdRng::seed_from_u64(seed);
    let now = Utc::now();
    let entries = (0..n)
        .map(|i| {
            let depth = rng.gen_range(1..5);
            let dirs: Vec<&str> = (0..depth).map(|_| WORDS[rng.gen_range(0..WORDS.len())]).collect();
            IndexEntry::file(format!("{}/file_{}.bin", dirs.join("/"), i), rng.gen_range(0..1_000_000), now)
        })
        .collect();
    MetadataSnapshot::from_entries(entries)
}

fn bench_search(c: &mut Criterion) {
    let ns = [10_000usize, 100_000usize];
    let mut group = c.benchmark_group("index_search");
    group.sampling_mode(SamplingMode::Flat);
    group.sample_size(20);

    for &n in &ns {
        let snap = gen_snapshot(n, 0xBEEF_CAFE);
        group.throughput(Throughput::Elements(n as u64));

        // Rare term scans the whole snapshot
        group.bench_with_input(BenchmarkId::new("rare_term", n.to_string()), &snap, |b, snap| {
            b.iter(|| criterion::black_box(search::search("file_99999", snap)));
        });

        // Common term stops at the result cap
        group.bench_with_input(BenchmarkId::new("common_term", n.to_string()), &snap, |b, snap| {
            b.iter(|| criterion::black_box(search::search("music", snap)));
        });

        group.bench_with_input(BenchmarkId::new("negated", n.to_string()), &snap, |b, snap| {
            b.iter(|| criterion::black_box(search::search("rock -jazz -2023", snap)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
