//! Rotor cycle benchmark: element aerodynamics, spectrum, control law and
//! servo batch for rotors of increasing element count.

use std::time::{Duration, Instant};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use aero_common::rotor::{AdaptationMode, RotorConfig, RotorState, VibrationData};
use aero_common::subsystem::Subsystem;
use aero_control_unit::rotor::{AdaptiveRotorSystem, RotorInput};

/// One accelerometer per blade at the blade passing frequency plus noise.
fn refresh_vibrations(out: &mut Vec<VibrationData>, blades: u8, t: f64) {
    out.clear();
    out.extend((0..blades).map(|b| VibrationData {
        frequency: 20.0 + 0.5 * (t * 3.0).sin(),
        amplitude: 0.8 + 0.2 * (t + f64::from(b)).sin(),
        phase: f64::from(b) * std::f64::consts::FRAC_PI_2,
        blade_id: b,
        sensor_id: b * 5,
    }));
}

fn bench_rotor_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("rotor_cycle");
    group.significance_level(0.01);
    group.sample_size(500);

    for &elements in &[10u8, 20, 40] {
        for mode in [
            AdaptationMode::ActiveVibrationSuppression,
            AdaptationMode::PerformanceOptimization,
        ] {
            let config = RotorConfig {
                elements_per_blade: elements,
                mode,
                ..RotorConfig::default()
            };
            let mut sys = AdaptiveRotorSystem::new(config);
            if sys.initialize().is_err() {
                continue;
            }
            let rotor = RotorState::default();
            let mut input = RotorInput {
                rotor,
                vibrations: Vec::with_capacity(usize::from(rotor.num_blades)),
            };
            let mut now = Instant::now();
            let mut cycle = 0u64;

            group.bench_with_input(
                BenchmarkId::new(format!("{mode:?}"), elements),
                &elements,
                |b, _| {
                    b.iter(|| {
                        cycle += 1;
                        now += Duration::from_millis(1);
                        refresh_vibrations(
                            &mut input.vibrations,
                            rotor.num_blades,
                            cycle as f64 * 1e-3,
                        );
                        sys.update(&input, now)
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_rotor_cycle);
criterion_main!(benches);
