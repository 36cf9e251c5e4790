//! Periodic task runner: pace → snapshot → update → publish.
//!
//! ## RT Setup
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`: lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity`: pin to a core.
//! 4. `sched_setscheduler(SCHED_FIFO, prio)`.
//!
//! All four are no-ops without the `rt` feature.
//!
//! ## Deadlines
//! Deadlines are soft. An overrun is logged, counted in [`CycleStats`] and
//! fed to the subsystem's own [`DeadlineMonitor`]; the loop never aborts.
//!
//! ## Cancellation
//! The stop flag is checked between cycles only. When it is raised the
//! runner calls [`Subsystem::shutdown`] before returning.

use crate::subsystem::Subsystem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleStats {
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    pub min_cycle_ns: i64,
    pub max_cycle_ns: i64,
    pub sum_cycle_ns: i64,
    pub overruns: u64,
    /// Largest wake-up lateness observed [ns].
    pub max_latency_ns: i64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record a cycle duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Average cycle time [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Deadline Monitor ───────────────────────────────────────────────

/// Turns overruns into a health factor.
///
/// Each overrun multiplies the factor by [`Self::DECAY`]; each on-time cycle
/// recovers [`Self::RECOVERY`] of the remaining gap to 1.0.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineMonitor {
    budget: Duration,
    factor: f64,
    consecutive: u32,
    total: u64,
}

impl DeadlineMonitor {
    pub const DECAY: f64 = 0.9;
    pub const RECOVERY: f64 = 0.01;
    pub const FLOOR: f64 = 0.1;

    pub const fn new(budget: Duration) -> Self {
        Self {
            budget,
            factor: 1.0,
            consecutive: 0,
            total: 0,
        }
    }

    /// Record one cycle's compute time. Returns `true` on overrun.
    pub fn record(&mut self, elapsed: Duration) -> bool {
        if elapsed > self.budget {
            self.consecutive += 1;
            self.total += 1;
            self.factor = (self.factor * Self::DECAY).max(Self::FLOOR);
            true
        } else {
            self.consecutive = 0;
            self.factor += (1.0 - self.factor) * Self::RECOVERY;
            false
        }
    }

    /// Health multiplier in [`Self::FLOOR`, 1].
    #[inline]
    pub fn health_factor(&self) -> f64 {
        self.factor
    }

    #[inline]
    pub fn consecutive_overruns(&self) -> u32 {
        self.consecutive
    }

    #[inline]
    pub fn total_overruns(&self) -> u64 {
        self.total
    }

    #[inline]
    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.budget);
    }
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Errors during RT setup or task construction.
#[derive(Debug)]
pub enum CycleError {
    /// RT system call failed.
    RtSetup(String),
    /// Period of zero.
    InvalidPeriod,
    /// Subsystem refused to initialize.
    Init(String),
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RtSetup(msg) => write!(f, "RT setup error: {msg}"),
            Self::InvalidPeriod => write!(f, "task period must be non-zero"),
            Self::Init(msg) => write!(f, "subsystem init error: {msg}"),
        }
    }
}

impl std::error::Error for CycleError {}

#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch a stack buffer so the RT thread never page-faults on it.
#[cfg(feature = "rt")]
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, aligned, exclusive reference.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(not(feature = "rt"))]
fn prefault_stack() {}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 targets the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Full RT setup for the calling thread. No-op without the `rt` feature.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Pacing ─────────────────────────────────────────────────────────

/// Absolute-deadline pacer on `CLOCK_MONOTONIC`.
#[cfg(feature = "rt")]
struct Pacer {
    period_ns: i64,
    next_wake: nix::sys::time::TimeSpec,
}

#[cfg(feature = "rt")]
impl Pacer {
    fn new(period: Duration) -> Result<Self, CycleError> {
        use nix::time::{ClockId, clock_gettime};
        let now = clock_gettime(ClockId::CLOCK_MONOTONIC)
            .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;
        Ok(Self {
            period_ns: period.as_nanos() as i64,
            next_wake: now,
        })
    }

    /// Sleep until the next boundary. Returns wake-up lateness [ns].
    fn wait(&mut self) -> i64 {
        use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};
        self.next_wake = timespec_add_ns(self.next_wake, self.period_ns);
        let clock = ClockId::CLOCK_MONOTONIC;
        let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &self.next_wake);
        match clock_gettime(clock) {
            Ok(now) => timespec_diff_ns(&now, &self.next_wake).max(0),
            Err(_) => 0,
        }
    }
}

#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    let total = ts.tv_nsec() + ns;
    let secs = ts.tv_sec() + total.div_euclid(1_000_000_000);
    let nanos = total.rem_euclid(1_000_000_000);
    nix::sys::time::TimeSpec::new(secs, nanos)
}

#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}

/// Sleep-based pacer for simulation builds.
#[cfg(not(feature = "rt"))]
struct Pacer {
    period: Duration,
    next_wake: Instant,
}

#[cfg(not(feature = "rt"))]
impl Pacer {
    fn new(period: Duration) -> Result<Self, CycleError> {
        Ok(Self {
            period,
            next_wake: Instant::now(),
        })
    }

    fn wait(&mut self) -> i64 {
        self.next_wake += self.period;
        let now = Instant::now();
        match self.next_wake.checked_duration_since(now) {
            Some(remaining) => {
                std::thread::sleep(remaining);
                Instant::now()
                    .saturating_duration_since(self.next_wake)
                    .as_nanos() as i64
            }
            None => {
                // Fell behind by more than a period: re-anchor instead of bursting.
                let late = now.duration_since(self.next_wake).as_nanos() as i64;
                self.next_wake = now;
                late
            }
        }
    }
}

// ─── Periodic Task ──────────────────────────────────────────────────

/// Drives one [`Subsystem`] at a fixed period.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    period: Duration,
    stats: CycleStats,
}

impl PeriodicTask {
    pub fn new(name: &'static str, period: Duration) -> Result<Self, CycleError> {
        if period.is_zero() {
            return Err(CycleError::InvalidPeriod);
        }
        Ok(Self {
            name,
            period,
            stats: CycleStats::new(),
        })
    }

    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    #[inline]
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Run until `stop` is raised or `max_cycles` cycles have executed.
    ///
    /// `input` is called once at the top of each cycle to refresh the
    /// snapshot buffer in place. The buffer lives for the whole run and
    /// keeps its previous contents, so `input` may leave it untouched when
    /// nothing changed. `output` receives the subsystem's command. Neither
    /// may block. The subsystem is shut down before this returns.
    pub fn run<S, I, O>(
        &mut self,
        subsystem: &mut S,
        mut input: I,
        mut output: O,
        stop: &AtomicBool,
        max_cycles: Option<u64>,
    ) -> Result<CycleStats, CycleError>
    where
        S: Subsystem,
        S::Input: Default,
        I: FnMut(&mut S::Input),
        O: FnMut(S::Output),
    {
        let budget_ns = self.period.as_nanos() as i64;
        let mut snapshot = S::Input::default();
        let mut pacer = Pacer::new(self.period)?;
        info!(task = self.name, period_us = self.period.as_micros() as u64, "periodic task started");

        let mut latency_ns = 0;
        while !stop.load(Ordering::Acquire) && max_cycles.is_none_or(|max| self.stats.cycle_count < max) {
            let cycle_start = Instant::now();
            input(&mut snapshot);
            let command = subsystem.update(&snapshot, cycle_start);
            output(command);

            let duration_ns = cycle_start.elapsed().as_nanos() as i64;
            self.stats.record(duration_ns, latency_ns);
            if duration_ns > budget_ns {
                self.stats.overruns += 1;
                warn!(
                    task = self.name,
                    actual_ns = duration_ns,
                    budget_ns,
                    "cycle overrun"
                );
            }

            latency_ns = pacer.wait();
        }

        subsystem.shutdown();
        debug!(task = self.name, stats = ?self.stats, "cycle statistics");
        info!(
            task = self.name,
            cycles = self.stats.cycle_count,
            overruns = self.stats.overruns,
            "periodic task stopped"
        );
        Ok(self.stats)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystem::{SubsystemError, SubsystemStatus};

    #[test]
    fn cycle_stats_basic() {
        let mut stats = CycleStats::new();
        assert_eq!(stats.avg_cycle_ns(), 0);
        stats.record(500_000, 1_000);
        stats.record(700_000, 3_000);
        assert_eq!(stats.cycle_count, 2);
        assert_eq!(stats.min_cycle_ns, 500_000);
        assert_eq!(stats.max_cycle_ns, 700_000);
        assert_eq!(stats.avg_cycle_ns(), 600_000);
        assert_eq!(stats.max_latency_ns, 3_000);
    }

    #[test]
    fn deadline_monitor_decays_and_recovers() {
        let mut mon = DeadlineMonitor::new(Duration::from_millis(1));
        assert!(mon.record(Duration::from_millis(2)));
        assert!(mon.record(Duration::from_millis(2)));
        assert_eq!(mon.consecutive_overruns(), 2);
        assert!((mon.health_factor() - 0.81).abs() < 1e-12);

        assert!(!mon.record(Duration::from_micros(500)));
        assert_eq!(mon.consecutive_overruns(), 0);
        assert!(mon.health_factor() > 0.81);
        assert_eq!(mon.total_overruns(), 2);
    }

    #[test]
    fn deadline_monitor_has_floor() {
        let mut mon = DeadlineMonitor::new(Duration::from_nanos(1));
        for _ in 0..1000 {
            mon.record(Duration::from_millis(1));
        }
        assert!((mon.health_factor() - DeadlineMonitor::FLOOR).abs() < 1e-12);
    }

    #[test]
    fn zero_period_rejected() {
        assert!(matches!(
            PeriodicTask::new("t", Duration::ZERO),
            Err(CycleError::InvalidPeriod)
        ));
    }

    #[test]
    fn rt_setup_without_feature_is_noop() {
        #[cfg(not(feature = "rt"))]
        assert!(rt_setup(0, 80).is_ok());
    }

    struct Counter {
        updates: u64,
        shut_down: bool,
    }

    impl Subsystem for Counter {
        type Input = u64;
        type Output = u64;

        fn name(&self) -> &'static str {
            "counter"
        }
        fn initialize(&mut self) -> Result<(), SubsystemError> {
            Ok(())
        }
        fn update(&mut self, input: &u64, _now: Instant) -> u64 {
            self.updates += 1;
            input * 2
        }
        fn shutdown(&mut self) {
            self.shut_down = true;
        }
        fn is_healthy(&self) -> bool {
            true
        }
        fn warnings(&self) -> Vec<String> {
            Vec::new()
        }
        fn status(&self) -> SubsystemStatus {
            SubsystemStatus {
                name: "counter",
                initialized: true,
                healthy: true,
                health: 1.0,
                mode: "test".into(),
                condition_active: false,
                cycles: self.updates,
                overruns: 0,
                warnings: 0,
            }
        }
    }

    #[test]
    fn task_runs_bounded_cycles_then_shuts_down() {
        let mut task = PeriodicTask::new("counter", Duration::from_micros(200)).unwrap();
        let mut sys = Counter {
            updates: 0,
            shut_down: false,
        };
        let stop = AtomicBool::new(false);
        let mut seen = Vec::new();
        let mut n = 0;
        let stats = task
            .run(
                &mut sys,
                |x: &mut u64| {
                    n += 1;
                    *x = n;
                },
                |out| seen.push(out),
                &stop,
                Some(5),
            )
            .unwrap();
        assert_eq!(stats.cycle_count, 5);
        assert_eq!(sys.updates, 5);
        assert!(sys.shut_down);
        assert_eq!(seen, vec![2, 4, 6, 8, 10]);
    }

    #[test]
    fn untouched_input_keeps_last_snapshot() {
        let mut task = PeriodicTask::new("counter", Duration::from_micros(200)).unwrap();
        let mut sys = Counter {
            updates: 0,
            shut_down: false,
        };
        let stop = AtomicBool::new(false);
        let mut seen = Vec::new();
        let mut first = true;
        task.run(
            &mut sys,
            |x: &mut u64| {
                if first {
                    *x = 21;
                    first = false;
                }
            },
            |out| seen.push(out),
            &stop,
            Some(3),
        )
        .unwrap();
        assert_eq!(seen, vec![42, 42, 42]);
    }

    #[test]
    fn raised_stop_flag_skips_all_cycles() {
        let mut task = PeriodicTask::new("counter", Duration::from_millis(1)).unwrap();
        let mut sys = Counter {
            updates: 0,
            shut_down: false,
        };
        let stop = AtomicBool::new(true);
        let stats = task.run(&mut sys, |x: &mut u64| *x = 1, |_| {}, &stop, None).unwrap();
        assert_eq!(stats.cycle_count, 0);
        assert_eq!(sys.updates, 0);
        assert!(sys.shut_down);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn stats_bracket_the_average(durations in prop::collection::vec(0i64..10_000_000, 1..64)) {
                let mut stats = CycleStats::new();
                for &d in &durations {
                    stats.record(d, 0);
                }
                prop_assert_eq!(stats.cycle_count, durations.len() as u64);
                prop_assert!(stats.min_cycle_ns <= stats.avg_cycle_ns());
                prop_assert!(stats.avg_cycle_ns() <= stats.max_cycle_ns);
            }

            #[test]
            fn deadline_factor_stays_in_range(overruns in prop::collection::vec(any::<bool>(), 0..200)) {
                let budget = Duration::from_micros(100);
                let mut monitor = DeadlineMonitor::new(budget);
                for &late in &overruns {
                    let elapsed = if late { budget * 2 } else { budget / 2 };
                    prop_assert_eq!(monitor.record(elapsed), late);
                }
                let factor = monitor.health_factor();
                prop_assert!((DeadlineMonitor::FLOOR..=1.0).contains(&factor));
                prop_assert_eq!(
                    monitor.total_overruns(),
                    overruns.iter().filter(|&&b| b).count() as u64
                );
            }
        }
    }
}
