//! VRS cycle benchmark: one full protection cycle (detect, recover, rate
//! limit, actuate) against the 10 ms period.

use std::time::{Duration, Instant};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use aero_common::subsystem::Subsystem;
use aero_common::vrs::{FlightConditions, PressureSensorData, VrsConfig};
use aero_control_unit::vrs::{VortexShieldSystem, VrsInput};

fn profile(vertical_speed: f64) -> VrsInput {
    VrsInput {
        flight: FlightConditions {
            vertical_speed,
            airspeed: if vertical_speed < -5.0 { 0.0 } else { 40.0 },
            ..FlightConditions::default()
        },
        pressure: PressureSensorData::uniform(101_325.0),
        ..VrsInput::default()
    }
}

fn bench_vrs_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("vrs_cycle");
    group.significance_level(0.01);
    group.sample_size(500);

    // Standby skips the vortex field; recovering computes it every cycle.
    for &(label, vs) in &[("standby", 0.0), ("recovering", -15.0)] {
        let mut sys = VortexShieldSystem::new(VrsConfig::default());
        if sys.initialize().is_err() {
            return;
        }
        let input = profile(vs);
        let mut now = Instant::now();

        group.bench_with_input(BenchmarkId::new("profile", label), &input, |b, input| {
            b.iter(|| {
                now += Duration::from_millis(10);
                sys.update(input, now)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_vrs_cycle);
criterion_main!(benches);
