//! Runtime supervisor: one thread per periodic task.
//!
//! ```text
//!   sensors (10 ms) ──FlightSample──▶ vrs   (10 ms) ──ControlCommand──▶ sensors
//!                   ──FlightSample──▶ rotor (1 ms)
//!                   ──FlightSample──▶ bios  (1 s)  ──BiosCheckReport──▶ report
//! ```
//!
//! Every edge is a [`SnapshotCell`]. The supervisor thread only waits for
//! the stop flag (Ctrl-C or the run duration), then joins the tasks and
//! assembles the [`RuntimeReport`]. If a task cannot be spawned, the ones
//! already running are stopped and joined before the error is returned.

use crate::report::{RuntimeReport, TaskReport};
use crate::sim::{FaultInjector, FlightProfile, FlightSample, FlightSimulator, SimulatedBios};
use aero_bios::{BiosCheckReport, BiosContext, EnvironmentProbes};
use aero_common::config::AeroConfig;
use aero_common::cycle::{CycleError, CycleStats, PeriodicTask, rt_setup};
use aero_common::snapshot::SnapshotCell;
use aero_common::subsystem::Subsystem;
use aero_common::vrs::ControlCommand;
use aero_control_unit::rotor::{AdaptiveRotorSystem, RotorInput};
use aero_control_unit::vrs::{VortexShieldSystem, VrsInput};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info};

/// Stop-flag poll interval of the supervisor thread.
const SUPERVISOR_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to spawn {task} task: {source}")]
    Spawn {
        task: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} task panicked")]
    Panicked(&'static str),

    #[error("{0} task was never started")]
    NotStarted(&'static str),

    #[error("{task} task failed: {source}")]
    Task {
        task: &'static str,
        #[source]
        source: CycleError,
    },
}

/// Knobs that are not part of the TOML configuration.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Stop after this long; `None` runs until the stop flag is raised.
    pub duration: Option<Duration>,
    /// Core and SCHED_FIFO priority of the rotor task (`rt` feature only).
    pub cpu_core: usize,
    pub rt_priority: i32,
    /// Inject a BIOS fault every N checks; 0 disables injection.
    pub fault_every: u64,
    pub fault_seed: u32,
    pub profile: FlightProfile,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            duration: Some(Duration::from_secs(30)),
            cpu_core: 1,
            rt_priority: 80,
            fault_every: 5,
            fault_seed: 0x00AE_0001,
            profile: FlightProfile::default(),
        }
    }
}

type TaskResult<S> = Result<(TaskReport, S), CycleError>;

fn drive<S, I, O>(
    name: &'static str,
    period: Duration,
    subsystem: &mut S,
    input: I,
    output: O,
    stop: &AtomicBool,
    rt: Option<(usize, i32)>,
) -> Result<CycleStats, CycleError>
where
    S: Subsystem,
    S::Input: Default,
    I: FnMut(&mut S::Input),
    O: FnMut(S::Output),
{
    if let Some((core, priority)) = rt {
        rt_setup(core, priority)?;
    }
    subsystem
        .initialize()
        .map_err(|e| CycleError::Init(e.to_string()))?;
    PeriodicTask::new(name, period)?.run(subsystem, input, output, stop, None)
}

/// Run `subsystem` on its own thread until `stop` is raised. A task that
/// fails to start raises `stop` so the rest of the cluster winds down.
fn spawn_task<S, I, O>(
    name: &'static str,
    period: Duration,
    mut subsystem: S,
    input: I,
    output: O,
    stop: Arc<AtomicBool>,
    rt: Option<(usize, i32)>,
) -> Result<JoinHandle<TaskResult<S>>, RuntimeError>
where
    S: Subsystem + Send + 'static,
    S::Input: Default,
    I: FnMut(&mut S::Input) + Send + 'static,
    O: FnMut(S::Output) + Send + 'static,
{
    thread::Builder::new()
        .name(format!("aero-{name}"))
        .spawn(move || {
            match drive(name, period, &mut subsystem, input, output, &stop, rt) {
                Ok(stats) => {
                    let report = TaskReport::new(subsystem.status(), subsystem.warnings(), &stats);
                    Ok((report, subsystem))
                }
                Err(e) => {
                    error!(task = name, error = %e, "task failed, stopping runtime");
                    stop.store(true, Ordering::Release);
                    Err(e)
                }
            }
        })
        .map_err(|source| RuntimeError::Spawn { task: name, source })
}

fn join<S>(
    name: &'static str,
    handle: Option<JoinHandle<TaskResult<S>>>,
) -> Result<(TaskReport, S), RuntimeError> {
    handle
        .ok_or(RuntimeError::NotStarted(name))?
        .join()
        .map_err(|_| RuntimeError::Panicked(name))?
        .map_err(|source| RuntimeError::Task { task: name, source })
}

fn wait<T>(handle: Option<JoinHandle<T>>) {
    if let Some(handle) = handle {
        let _ = handle.join();
    }
}

/// Snapshot cells wiring the tasks together.
struct Links {
    samples: Arc<SnapshotCell<FlightSample>>,
    commands: Arc<SnapshotCell<ControlCommand>>,
    checks: Arc<SnapshotCell<BiosCheckReport>>,
}

/// Handles of the tasks started so far.
#[derive(Default)]
struct Tasks {
    sensors: Option<JoinHandle<TaskResult<FlightSimulator>>>,
    vrs: Option<JoinHandle<TaskResult<VortexShieldSystem>>>,
    rotor: Option<JoinHandle<TaskResult<AdaptiveRotorSystem>>>,
    bios: Option<JoinHandle<TaskResult<SimulatedBios>>>,
}

impl Tasks {
    /// Raise `stop` and wait for every task that did start.
    fn abort(self, stop: &AtomicBool) {
        stop.store(true, Ordering::Release);
        wait(self.sensors);
        wait(self.vrs);
        wait(self.rotor);
        wait(self.bios);
    }
}

/// Spawn the four tasks in order, recording each handle in `tasks` as
/// soon as it exists.
fn start(
    tasks: &mut Tasks,
    links: &Links,
    config: &AeroConfig,
    options: &RuntimeOptions,
    stop: &Arc<AtomicBool>,
) -> Result<(), RuntimeError> {
    let vrs_period = Duration::from_micros(config.vrs.cycle_time_us);
    let rotor_period = Duration::from_micros(config.rotor.cycle_time_us);
    let bios_period = Duration::from_micros(config.bios.cycle_time_us);

    let mut reader = links.commands.reader();
    let out = Arc::clone(&links.samples);
    tasks.sensors = Some(spawn_task(
        "sensors",
        vrs_period,
        FlightSimulator::new(options.profile, vrs_period),
        move |command: &mut ControlCommand| {
            *command = if reader.has_changed() {
                *reader.read()
            } else {
                ControlCommand::hold()
            };
        },
        move |sample| {
            out.publish(sample);
        },
        Arc::clone(stop),
        None,
    )?);

    let mut reader = links.samples.reader();
    let out = Arc::clone(&links.commands);
    tasks.vrs = Some(spawn_task(
        "vrs",
        vrs_period,
        VortexShieldSystem::new(config.vrs.clone()),
        move |input: &mut VrsInput| *input = reader.read().vrs,
        move |command| {
            out.publish(command);
        },
        Arc::clone(stop),
        None,
    )?);

    // The vibration buffer is refilled in place, only on a new sample.
    let mut reader = links.samples.reader();
    tasks.rotor = Some(spawn_task(
        "rotor",
        rotor_period,
        AdaptiveRotorSystem::new(config.rotor.clone()),
        move |input: &mut RotorInput| {
            if reader.has_changed() {
                input.clone_from(&reader.read().rotor);
            }
        },
        |_batch| {},
        Arc::clone(stop),
        Some((options.cpu_core, options.rt_priority)),
    )?);

    let mut reader = links.samples.reader();
    let out = Arc::clone(&links.checks);
    tasks.bios = Some(spawn_task(
        "bios",
        bios_period,
        SimulatedBios::new(
            BiosContext::new(config.bios.clone()),
            FaultInjector::new(options.fault_every, options.fault_seed),
        ),
        move |probes: &mut EnvironmentProbes| *probes = reader.read().probes,
        move |report| {
            out.publish(report);
        },
        Arc::clone(stop),
        None,
    )?);
    Ok(())
}

/// Start every task, wait for the stop flag or the run duration, and
/// collect the final report.
pub fn run(
    config: &AeroConfig,
    options: &RuntimeOptions,
    stop: Arc<AtomicBool>,
) -> Result<RuntimeReport, RuntimeError> {
    let started = Instant::now();
    let links = Links {
        samples: Arc::new(SnapshotCell::default()),
        commands: Arc::new(SnapshotCell::new(ControlCommand::hold())),
        checks: Arc::new(SnapshotCell::default()),
    };

    let mut tasks = Tasks::default();
    if let Err(e) = start(&mut tasks, &links, config, options, &stop) {
        error!(error = %e, "startup failed, stopping started tasks");
        tasks.abort(&stop);
        return Err(e);
    }

    info!(service = %config.shared.service_name, "all tasks started");
    while !stop.load(Ordering::Acquire) {
        if options.duration.is_some_and(|d| started.elapsed() >= d) {
            info!("run duration reached");
            break;
        }
        thread::sleep(SUPERVISOR_POLL);
    }
    stop.store(true, Ordering::Release);

    // Join everything before surfacing the first failure.
    let sensors = join("sensors", tasks.sensors);
    let vrs = join("vrs", tasks.vrs);
    let rotor = join("rotor", tasks.rotor);
    let bios = join("bios", tasks.bios);
    let (sensors, _) = sensors?;
    let (vrs, _) = vrs?;
    let (rotor, _) = rotor?;
    let (bios_report, bios) = bios?;

    Ok(RuntimeReport {
        service: config.shared.service_name.clone(),
        elapsed_s: started.elapsed().as_secs_f64(),
        tasks: vec![sensors, vrs, rotor, bios_report],
        bios_status: bios.bios().bios_status(),
        faults_injected: bios.injected(),
        last_bios_check: (*links.checks.latest()).clone(),
        vrs_commands: links.commands.version(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_stops_and_joins_started_tasks() {
        let stop = Arc::new(AtomicBool::new(false));
        let samples = Arc::new(SnapshotCell::<FlightSample>::default());
        let out = Arc::clone(&samples);
        let period = Duration::from_millis(1);
        let tasks = Tasks {
            sensors: Some(
                spawn_task(
                    "sensors",
                    period,
                    FlightSimulator::new(FlightProfile::default(), period),
                    |_: &mut ControlCommand| {},
                    move |sample| {
                        out.publish(sample);
                    },
                    Arc::clone(&stop),
                    None,
                )
                .unwrap(),
            ),
            ..Tasks::default()
        };
        thread::sleep(Duration::from_millis(30));

        tasks.abort(&stop);
        assert!(stop.load(Ordering::Acquire));
        let published = samples.version();
        assert!(published > 0);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(samples.version(), published, "sensors kept running after abort");
    }

    #[test]
    fn missing_handle_is_reported() {
        let result = join::<FlightSimulator>("sensors", None);
        assert!(matches!(result, Err(RuntimeError::NotStarted("sensors"))));
    }
}
