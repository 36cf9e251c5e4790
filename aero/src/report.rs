//! Final status report printed as JSON when the runtime stops.

use aero_bios::{BiosCheckReport, BiosStatus};
use aero_common::cycle::CycleStats;
use aero_common::subsystem::SubsystemStatus;
use serde::Serialize;

/// Timing and status of one periodic task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub status: SubsystemStatus,
    pub cycles: u64,
    pub overruns: u64,
    pub avg_cycle_us: f64,
    pub max_cycle_us: f64,
    pub max_latency_us: f64,
    pub warnings: Vec<String>,
}

fn us(ns: i64) -> f64 {
    ns as f64 / 1_000.0
}

impl TaskReport {
    pub fn new(status: SubsystemStatus, warnings: Vec<String>, stats: &CycleStats) -> Self {
        Self {
            status,
            cycles: stats.cycle_count,
            overruns: stats.overruns,
            avg_cycle_us: us(stats.avg_cycle_ns()),
            max_cycle_us: us(stats.max_cycle_ns),
            max_latency_us: us(stats.max_latency_ns),
            warnings,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RuntimeReport {
    pub service: String,
    pub elapsed_s: f64,
    pub tasks: Vec<TaskReport>,
    pub bios_status: BiosStatus,
    pub faults_injected: u64,
    pub last_bios_check: BiosCheckReport,
    /// VRS commands published over the run.
    pub vrs_commands: u64,
}

impl RuntimeReport {
    pub fn task(&self, name: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.status.name == name)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
