use biograph::core::literal::parse_date_time;
use biograph::core::{Row, Scalar};
use biograph::execution::regroup::regroup;
use biograph::parsing::schema_config::SchemaRegistry;
use biograph::stats::histogram::{bin, BoundaryMode, DatePoint};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::num::NonZeroU32;

const SCHEMA: &str = r#"{
    "people": {
        "id": "?person$anchor",
        "label": "?label",
        "events": {
            "id": "?event$anchor$list",
            "label": "?eventLabel",
            "place": {"id": "?place", "label": "?placeLabel"},
            "relations": {"id": "?other$anchor$list", "label": "?otherLabel"}
        },
        "occupations": {"id": "?occupation$anchor$list", "label": "?occupationLabel"}
    }
}"#;

/// Join-exploded rows: every person × 8 events × 4 relations × 3 occupations.
fn exploded(people: usize) -> Vec<Row> {
    let mut rows = Vec::with_capacity(people * 96);
    for p in 0..people {
        for e in 0..8 {
            for r in 0..4 {
                for o in 0..3 {
                    rows.push(Row::from_pairs([
                        ("person", Scalar::from(format!("p{}", p))),
                        ("label", Scalar::from(format!("Person {}", p))),
                        ("event", Scalar::from(format!("p{}e{}", p, e))),
                        ("eventLabel", Scalar::from(format!("Event {}", e))),
                        ("place", Scalar::from(format!("place{}", e % 5))),
                        ("placeLabel", Scalar::from(format!("Place {}", e % 5))),
                        ("other", Scalar::from(format!("p{}", (p + r + 1) % people.max(1)))),
                        ("otherLabel", Scalar::from(format!("Person {}", (p + r + 1) % people.max(1)))),
                        ("occupation", Scalar::from(format!("o{}", o))),
                        ("occupationLabel", Scalar::from(format!("Occupation {}", o))),
                    ]));
                }
            }
        }
    }
    rows
}

fn bench_regroup(c: &mut Criterion) {
    let registry = SchemaRegistry::from_json_str(SCHEMA).unwrap();
    let schema = registry.get("people").unwrap();

    let mut group = c.benchmark_group("regroup");
    for people in [10, 50, 200] {
        let rows = exploded(people);
        group.bench_with_input(BenchmarkId::from_parameter(rows.len()), &rows, |b, rows| {
            b.iter(|| regroup(black_box(rows), schema, None).unwrap())
        });
    }
    group.finish();
}

fn bench_histogram(c: &mut Criterion) {
    let start = parse_date_time("1700-01-01T00:00:00Z").unwrap();
    let points: Vec<DatePoint> = (0..20_000i64)
        .map(|day| DatePoint::new(start + chrono::TimeDelta::days(day * 5), (day % 7) as u64))
        .collect();
    let bins = NonZeroU32::new(50).unwrap();

    c.bench_function("histogram_20k_points_50_bins", |b| {
        b.iter(|| bin(black_box(points.clone()), bins, BoundaryMode::HalfOpen).unwrap())
    });
}

criterion_group!(benches, bench_regroup, bench_histogram);
criterion_main!(benches);
