//! Criterion benchmarks for the record engine.
//!
//! Run with:
//!   cargo bench --bench engine

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use qcdb::schema::generate_table;
use qcdb::DbInterface;
use tempfile::TempDir;
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

/// 32-byte benchmark record: `0 ENTRY <n>` / `0 KEY L 1` / `1 PAYLOAD b 24`.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
struct Entry {
    key: u64,
    payload: [u8; 24],
}

fn entry(key: u64) -> Entry {
    let mut e = Entry::new_zeroed();
    e.key = key;
    e.payload = [key as u8; 24];
    e
}

fn entry_table(capacity: usize) -> (TempDir, DbInterface<Entry>) {
    let dir = TempDir::new().unwrap();
    let text = format!("0 ENTRY {}\n0 KEY L 1\n1 PAYLOAD b 24\n", capacity);
    let object = qcdb::parse_schema_str(&text, true).unwrap();
    let path = generate_table(&object, dir.path()).unwrap();
    let db = DbInterface::open(&path).unwrap();
    (dir, db)
}

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_engine");
    let record_size = std::mem::size_of::<Entry>() as u64;

    for &capacity in &[1_024usize, 16_384] {
        let (_dir, db) = entry_table(capacity);

        // ── write_at over rotating slots ────────────────────────────────────
        group.throughput(Throughput::Bytes(record_size));
        group.bench_with_input(BenchmarkId::new("write_at", capacity), &capacity, |b, &n| {
            let record = entry(7);
            let mut slot = 0usize;
            b.iter(|| {
                db.write_at(slot, &record).unwrap();
                slot = (slot + 1) % n;
            })
        });

        // Populate every slot so reads and scans cover the full table.
        for slot in 0..capacity {
            db.write_at(slot, &entry(slot as u64 + 1)).unwrap();
        }

        // ── read over rotating slots ────────────────────────────────────────
        group.throughput(Throughput::Bytes(record_size));
        group.bench_with_input(BenchmarkId::new("read", capacity), &capacity, |b, &n| {
            let mut slot = 0usize;
            b.iter(|| {
                let record = db.read(slot).unwrap();
                slot = (slot + 1) % n;
                record
            })
        });

        // ── read_many with a 32-record batch ────────────────────────────────
        group.throughput(Throughput::Bytes(record_size * 32));
        group.bench_with_input(
            BenchmarkId::new("read_many_32", capacity),
            &capacity,
            |b, &n| {
                let mut pairs: Vec<(usize, Entry)> = (0..32)
                    .map(|i| (i * (n / 32), Entry::new_zeroed()))
                    .collect();
                b.iter(|| db.read_many(&mut pairs).unwrap())
            },
        );

        // ── sharded full-table scan ─────────────────────────────────────────
        group.throughput(Throughput::Bytes(record_size * capacity as u64));
        group.bench_with_input(BenchmarkId::new("find_all", capacity), &capacity, |b, _| {
            b.iter(|| db.find_all(|e: &Entry| e.key % 5 == 0).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_engine);
criterion_main!(benches);
