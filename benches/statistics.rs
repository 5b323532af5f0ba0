//! Criterion benchmarks for the statistics hot path.
//!
//! The worker must finish one frame before the next sampled frame arrives,
//! otherwise frames are dropped. These benchmarks track:
//! - ROI statistics throughput per sample width and frame size
//! - Cost of a full producer step (select, copy, submit)
//!
//! Run with: cargo bench --bench statistics

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use frame_pool::SlotPool;
use signal_monitor::mock::{Pattern, SyntheticSource};
use signal_monitor::stats;
use signal_monitor::{MetricKind, RegionOfInterest, SignalMonitor};

/// Full-frame statistics for common detector sizes at 8, 16 and 32 bits.
fn statistics_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("statistics_full_frame");

    let sizes = [("256x256", 256u32), ("1024x1024", 1024)];
    for (name, side) in sizes {
        for bits in [8u32, 16, 32] {
            let mut source = SyntheticSource::new(bits, side, side, Pattern::Ramp).unwrap();
            let (frame, _) = source.next_batch();
            let roi = RegionOfInterest::new(0, 0, side, side);

            group.throughput(Throughput::Bytes(frame.len() as u64));
            group.bench_with_input(BenchmarkId::new(format!("{bits}bit"), name), &frame, |b, frame| {
                b.iter(|| {
                    stats::compute(black_box(frame), bits, side, side, roi, MetricKind::StdDev).unwrap()
                });
            });
        }
    }

    group.finish();
}

/// Small ROI inside a large frame: only the clipped rows are visited.
fn statistics_small_roi(c: &mut Criterion) {
    let mut source = SyntheticSource::new(16, 2048, 2048, Pattern::Ramp).unwrap();
    let (frame, _) = source.next_batch();
    let roi = RegionOfInterest::new(1000, 1000, 64, 64);

    c.bench_function("statistics_roi_64x64_in_2048", |b| {
        b.iter(|| stats::compute(black_box(&frame), 16, 2048, 2048, roi, MetricKind::Average).unwrap());
    });
}

/// Slot acquire + copy + release without the worker.
fn pool_copy(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_copy");

    for side in [256u32, 1024] {
        let bytes = (side * side * 2) as usize;
        let pool = SlotPool::with_size(2, bytes).unwrap();
        let source = vec![7u8; bytes * 4];

        group.throughput(Throughput::Bytes(bytes as u64));
        group.bench_with_input(BenchmarkId::new("acquire_write_release", side), &bytes, |b, &bytes| {
            b.iter(|| {
                let mut slot = pool.try_acquire().unwrap();
                slot.write(black_box(&source), bytes, bytes).unwrap();
            });
        });
    }

    group.finish();
}

/// Producer notification cost when every buffer is decimated away.
fn producer_skip_path(c: &mut Criterion) {
    let monitor = SignalMonitor::new().unwrap();
    monitor.set_decimation_factor(u32::MAX);
    let mut source = SyntheticSource::new(16, 512, 512, Pattern::Constant(1)).unwrap();
    let (buffer, descriptor) = source.next_batch();

    c.bench_function("producer_decimated_notification", |b| {
        b.iter(|| monitor.on_raw_frames(black_box(&buffer), &descriptor));
    });
}

criterion_group!(
    benches,
    statistics_throughput,
    statistics_small_roi,
    pool_copy,
    producer_skip_path
);
criterion_main!(benches);
