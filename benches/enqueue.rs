//! Benchmarks for the hot logging path: level checks, routing and enqueue.

use std::hint::black_box;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use jarvis_log_client::test_utils::{ScriptedTransport, SharedBuf};
use jarvis_log_client::{
    Context, FallbackSink, Level, LogShipper, OverflowPolicy, SharedFormatter, ShipperConfig,
};

fn shipper(remote_level: Level) -> LogShipper {
    let config = ShipperConfig::builder()
        .with_remote_level(remote_level)
        .with_capacity(100_000)
        .with_overflow_policy(OverflowPolicy::DropOldest)
        .with_max_batch_size(500)
        .with_flush_interval(Duration::from_millis(50))
        .build()
        .expect("valid config");
    let fallback = FallbackSink::new(SharedBuf::new(), SharedFormatter::default(), Level::Critical);
    LogShipper::with_transport(config, ScriptedTransport::new().boxed(), fallback)
        .expect("shipper starts")
}

fn bench_enqueue(c: &mut Criterion) {
    let shipper = shipper(Level::Debug);
    let logger = shipper.logger("bench");
    c.bench_function("info_without_context", |b| {
        b.iter(|| logger.info(black_box("hello"), Context::new()));
    });
    c.bench_function("info_with_context", |b| {
        b.iter(|| {
            logger.info(
                black_box("order placed"),
                Context::new().with("order_id", 42).with("total", 19.99),
            );
        });
    });
    shipper.shutdown(Duration::from_secs(5));
}

fn bench_filtered(c: &mut Criterion) {
    let shipper = shipper(Level::Error);
    let logger = shipper.logger("bench");
    c.bench_function("debug_filtered_out", |b| {
        b.iter(|| logger.debug(black_box("noise"), Context::new()));
    });
    shipper.shutdown(Duration::from_secs(5));
}

criterion_group!(benches, bench_enqueue, bench_filtered);
criterion_main!(benches);
