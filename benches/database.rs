//! Database-level benchmarks: the full insert path (primary plus
//! secondary index maintenance), point lookups, and index scans.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use arbordb::{Arg, IndexSchema, IntField, MemDB, Schema, StringField, TableSchema};

#[derive(Debug, Clone)]
struct Person {
    email: String,
    name: String,
    age: i64,
}

fn person_schema() -> Schema<Person> {
    Schema::new().table(
        TableSchema::new("person")
            .index(
                IndexSchema::new("id", StringField::new(|p: &Person| Some(p.email.as_str())))
                    .unique(),
            )
            .index(IndexSchema::new(
                "name",
                StringField::new(|p: &Person| Some(p.name.as_str())),
            ))
            .index(IndexSchema::new("age", IntField::new(8, |p: &Person| p.age))),
    )
}

fn people(count: usize) -> Vec<Person> {
    (0..count)
        .map(|i| Person {
            email: format!("user{:08}@example.com", i),
            name: format!("Name{:04}", i % 500),
            age: (i % 90) as i64,
        })
        .collect()
}

fn seeded(count: usize) -> MemDB<Person> {
    let db = MemDB::new(person_schema()).unwrap();
    let mut txn = db.txn(true).unwrap();
    for p in people(count) {
        txn.insert("person", p).unwrap();
    }
    txn.commit().unwrap();
    db
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("db_insert");

    for count in [100usize, 1000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new("batched_txn", count),
            &count,
            |b, &count| {
                let rows = people(count);
                b.iter(|| {
                    let db = MemDB::new(person_schema()).unwrap();
                    let mut txn = db.txn(true).unwrap();
                    for p in rows.iter().cloned() {
                        txn.insert("person", p).unwrap();
                    }
                    txn.commit().unwrap();
                    black_box(db)
                });
            },
        );
        group.bench_with_input(
            BenchmarkId::new("txn_per_row", count),
            &count,
            |b, &count| {
                let rows = people(count);
                b.iter(|| {
                    let db = MemDB::new(person_schema()).unwrap();
                    for p in rows.iter().cloned() {
                        let mut txn = db.txn(true).unwrap();
                        txn.insert("person", p).unwrap();
                        txn.commit().unwrap();
                    }
                    black_box(db)
                });
            },
        );
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("db_lookup");
    let db = seeded(10_000);

    group.throughput(Throughput::Elements(1));
    group.bench_function("first_by_id", |b| {
        let txn = db.txn(false).unwrap();
        b.iter(|| {
            black_box(
                txn.first("person", "id", &[Arg::Str("user00004242@example.com")])
                    .unwrap(),
            )
        });
    });
    group.bench_function("get_by_secondary", |b| {
        let txn = db.txn(false).unwrap();
        b.iter(|| {
            black_box(
                txn.get("person", "name", &[Arg::Str("Name0042")])
                    .unwrap()
                    .count(),
            )
        });
    });
    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("db_scan");

    for count in [1000usize, 10_000] {
        let db = seeded(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("full_by_id", count), &db, |b, db| {
            let txn = db.txn(false).unwrap();
            b.iter(|| black_box(txn.get("person", "id", &[]).unwrap().count()));
        });
        group.bench_with_input(BenchmarkId::new("age_lower_bound", count), &db, |b, db| {
            let txn = db.txn(false).unwrap();
            b.iter(|| {
                black_box(
                    txn.lower_bound("person", "age", &[Arg::Int(60)])
                        .unwrap()
                        .count(),
                )
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_insert, bench_lookup, bench_scan);
criterion_main!(benches);
