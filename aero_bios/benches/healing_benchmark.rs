//! BIOS benchmark: CRC over segment-sized blocks, a clean periodic check,
//! and a check that has to heal a corrupted runtime segment.

use std::hint::black_box;
use std::time::Instant;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use aero_bios::memory::RAM_BASE_ADDR;
use aero_bios::{BiosContext, EnvironmentProbes, crc32};
use aero_common::bios::BiosConfig;
use aero_common::subsystem::Subsystem;

fn bench_crc(c: &mut Criterion) {
    let mut group = c.benchmark_group("crc32");
    group.significance_level(0.01);

    for &kib in &[4usize, 64, 128] {
        let data: Vec<u8> = (0..kib * 1024).map(|i| (i * 31 % 251) as u8).collect();
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(kib), &data, |b, data| {
            b.iter(|| crc32(black_box(data)));
        });
    }

    group.finish();
}

fn bench_periodic_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("bios_check");
    group.significance_level(0.01);
    group.sample_size(100);

    let probes = EnvironmentProbes::default();

    let mut clean = BiosContext::new(BiosConfig::default());
    if clean.initialize().is_ok() {
        group.bench_function("clean", |b| {
            b.iter(|| clean.update(&probes, Instant::now()));
        });
    }

    let mut healing = BiosContext::new(BiosConfig::default());
    if healing.initialize().is_ok() {
        group.bench_function("heal_runtime", |b| {
            b.iter(|| {
                let _ = healing.inject_corruption(RAM_BASE_ADDR + 0x1000, 0x100, 0xAA);
                healing.update(&probes, Instant::now())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_crc, bench_periodic_check);
criterion_main!(benches);
