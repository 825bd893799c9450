//! Filter parsing and matching benchmarks.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use scim_server::Filter;
use serde_json::{Value, json};

fn user_item(id: usize) -> Value {
    json!({
        "userName": format!("user{id}@example.com"),
        "name": {"givenName": format!("User{id}"), "familyName": "Test"},
        "active": id % 2 == 0,
        "emails": [{"value": format!("user{id}@example.com"), "type": "work", "primary": true}],
    })
}

fn bench_parse(c: &mut Criterion) {
    let expressions = [
        r#"userName eq "user1@example.com""#,
        r#"userName sw "user" and active eq true"#,
        r#"emails[type eq "work" and value co "@example.com"]"#,
        r#"(userName co "user" or name.givenName co "User") and not (active eq false)"#,
    ];
    let mut group = c.benchmark_group("parse");
    for (i, expr) in expressions.iter().enumerate() {
        group.bench_with_input(BenchmarkId::new("expr", i), expr, |b, expr| {
            b.iter(|| Filter::parse(black_box(expr)).unwrap());
        });
    }
    group.finish();
}

fn bench_matches(c: &mut Criterion) {
    let filter = Filter::parse(r#"userName sw "user1" or active eq true"#).unwrap();
    let mut group = c.benchmark_group("matches");
    for size in [10usize, 100, 1000] {
        let items: Vec<Value> = (0..size).map(user_item).collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("user_items", size), &items, |b, items| {
            b.iter(|| filter.matches(black_box(items), None));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_matches);
criterion_main!(benches);
