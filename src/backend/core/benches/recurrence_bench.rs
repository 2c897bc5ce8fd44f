//! Benchmarks for recurrence resolution and queue throughput.

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;
use tempo_core::calendar::RecurrenceRule;
use tempo_core::jobs::{InMemoryQueue, JobId, Queue};
use tempo_core::schedule::ScheduleBuilder;

fn bench_resolve(c: &mut Criterion) {
    let from = Utc.with_ymd_and_hms(2019, 2, 1, 3, 0, 0).unwrap();
    let mut group = c.benchmark_group("resolve_next_date");

    let rules = [
        ("every_15_minutes", RecurrenceRule::new().every_minutes(15).unwrap()),
        (
            "leap_day",
            RecurrenceRule::new()
                .at_month(2)
                .unwrap()
                .at_day_of_month(29)
                .unwrap()
                .at_minute(25)
                .unwrap()
                .at_second(1)
                .unwrap(),
        ),
        ("last_day_of_month", RecurrenceRule::new().at_last_day_of_month()),
        (
            "weekdays_new_york",
            RecurrenceRule::new()
                .weekdays()
                .at_hour(9)
                .unwrap()
                .in_time_zone(chrono_tz::America::New_York),
        ),
    ];

    for (name, rule) in &rules {
        group.bench_with_input(BenchmarkId::from_parameter(name), rule, |b, rule| {
            b.iter(|| rule.resolve_next_date(black_box(from)))
        });
    }
    group.finish();
}

fn bench_upcoming(c: &mut Criterion) {
    let from = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
    let schedule = ScheduleBuilder::new()
        .every(Duration::from_secs(5 * 60), Duration::from_secs(3600))
        .unwrap()
        .build()
        .unwrap();

    c.bench_function("container_upcoming_100", |b| {
        b.iter(|| schedule.upcoming(black_box(from), 100))
    });
}

fn bench_in_memory_queue(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let queue = InMemoryQueue::new();

    c.bench_function("in_memory_push_pop", |b| {
        b.to_async(&runtime).iter(|| async {
            queue.push(JobId::new()).await.unwrap();
            black_box(queue.pop().await.unwrap())
        })
    });
}

criterion_group!(benches, bench_resolve, bench_upcoming, bench_in_memory_queue);
criterion_main!(benches);
