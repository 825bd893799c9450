//! Coercion overhead benchmarks.
//!
//! Measures the cost of `SchemaDefinition::coerce` against the built-in
//! User schema at a few document sizes.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use scim_server::schema::Direction;
use scim_server::schema::builtin::user_schema;
use serde_json::{Value, json};

fn user_document(id: usize) -> Value {
    json!({
        "userName": format!("user{id}@example.com"),
        "name": {
            "givenName": format!("User{id}"),
            "familyName": "Test",
        },
        "emails": [
            {"value": format!("user{id}@example.com"), "type": "work", "primary": true},
            {"value": format!("user{id}@personal.example.com"), "type": "home", "primary": false}
        ],
        "active": true,
    })
}

fn bench_coerce_in(c: &mut Criterion) {
    let schema = user_schema();
    let mut group = c.benchmark_group("coerce_in");
    for size in [1usize, 10, 100] {
        let documents: Vec<Value> = (0..size).map(user_document).collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("user", size), &documents, |b, documents| {
            b.iter(|| {
                for doc in documents {
                    let _ = schema.coerce(black_box(doc), Direction::In, None, None, None).unwrap();
                }
            });
        });
    }
    group.finish();
}

fn bench_coerce_out(c: &mut Criterion) {
    let schema = user_schema();
    let documents: Vec<Value> = (0..100)
        .map(user_document)
        .map(|d| schema.coerce(&d, Direction::In, None, None, None).unwrap())
        .collect();
    c.bench_function("coerce_out_100", |b| {
        b.iter(|| {
            for doc in &documents {
                let _ = schema.coerce(black_box(doc), Direction::Out, None, None, None).unwrap();
            }
        });
    });
}

criterion_group!(benches, bench_coerce_in, bench_coerce_out);
criterion_main!(benches);
