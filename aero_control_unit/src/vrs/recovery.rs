//! Vortex-ring recovery controller.
//!
//! ```text
//!   Standby ──(detector active)──► Recovering
//!      ▲                              │
//!      ├──(inactive for debounce)─────┤
//!      └──(time cap reached)──────────┘
//! ```
//!
//! While recovering and the detector is active, each cycle emits the
//! selected strategy's deltas. While debouncing (detector inactive but the
//! dwell window not yet elapsed) the controller holds with a zero-delta
//! command. The time cap ends an episode that never clears; the supervisor
//! treats that as a fault and escalates.
//!
//! Progress is elapsed time over the nominal duration and is for reporting
//! only. Completion is driven by the detector.

use aero_common::vrs::{ControlCommand, RecoveryStrategy, StrategySelection, VortexRingState};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Strategy magnitudes at full aggression [deg per cycle].
mod magnitude {
    pub const FORWARD_COLLECTIVE: f64 = -1.0;
    pub const FORWARD_LONGITUDINAL: f64 = 10.0;

    pub const COMBINED_COLLECTIVE: f64 = -3.0;
    pub const COMBINED_LATERAL: f64 = 5.0;
    pub const COMBINED_LONGITUDINAL: f64 = 8.0;
    pub const COMBINED_PEDAL: f64 = 2.0;
    /// Combined maneuver flags emergency above this severity.
    pub const COMBINED_EMERGENCY_SEVERITY: f64 = 0.6;

    pub const EMERGENCY_COLLECTIVE: f64 = 5.0;
    pub const EMERGENCY_LONGITUDINAL: f64 = 15.0;
    pub const EMERGENCY_LATERAL: f64 = 10.0;
    pub const EMERGENCY_PEDAL: f64 = 5.0;

    pub const REDUCTION_COLLECTIVE: f64 = -4.0;

    pub const LATERAL_COLLECTIVE: f64 = -1.0;
    pub const LATERAL_LATERAL: f64 = 10.0;

    pub const CLIMB_COLLECTIVE: f64 = 3.0;
    pub const CLIMB_LONGITUDINAL: f64 = 2.0;
}

/// Controller phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecoveryPhase {
    Standby,
    Recovering {
        entered_at: Instant,
        strategy: RecoveryStrategy,
        /// First cycle of the current inactive run.
        inactive_since: Option<Instant>,
    },
}

/// Phase change reported by the last `update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryTransition {
    Entered(RecoveryStrategy),
    StrategyChanged(RecoveryStrategy),
    Completed,
    TimedOut,
}

/// Timing parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecoveryTiming {
    pub debounce: Duration,
    pub nominal: Duration,
    pub cap: Duration,
}

impl Default for RecoveryTiming {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(750),
            nominal: Duration::from_secs(5),
            cap: Duration::from_secs(10),
        }
    }
}

/// Deltas for one strategy at the given severity and aggression, clamped
/// to the control envelope.
pub fn execute_recovery_maneuver(
    strategy: RecoveryStrategy,
    severity: f64,
    aggression: f64,
) -> ControlCommand {
    use magnitude::*;

    let a = if aggression.is_finite() {
        aggression.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let mut cmd = ControlCommand {
        strategy: Some(strategy),
        ..ControlCommand::hold()
    };
    match strategy {
        RecoveryStrategy::ForwardTranslation => {
            cmd.collective_adjustment = FORWARD_COLLECTIVE * a;
            cmd.longitudinal_cyclic_adjustment = FORWARD_LONGITUDINAL * a;
        }
        RecoveryStrategy::CombinedManeuver => {
            cmd.collective_adjustment = COMBINED_COLLECTIVE * a;
            cmd.lateral_cyclic_adjustment = COMBINED_LATERAL * a;
            cmd.longitudinal_cyclic_adjustment = COMBINED_LONGITUDINAL * a;
            cmd.pedal_adjustment = COMBINED_PEDAL * a;
            cmd.emergency_action = severity > COMBINED_EMERGENCY_SEVERITY;
        }
        RecoveryStrategy::EmergencyPower => {
            cmd.collective_adjustment = EMERGENCY_COLLECTIVE * a;
            cmd.longitudinal_cyclic_adjustment = EMERGENCY_LONGITUDINAL * a;
            cmd.lateral_cyclic_adjustment = EMERGENCY_LATERAL * a;
            cmd.pedal_adjustment = EMERGENCY_PEDAL * a;
            cmd.emergency_action = true;
        }
        RecoveryStrategy::CollectiveReduction => {
            cmd.collective_adjustment = REDUCTION_COLLECTIVE * a;
        }
        RecoveryStrategy::LateralMotion => {
            cmd.collective_adjustment = LATERAL_COLLECTIVE * a;
            cmd.lateral_cyclic_adjustment = LATERAL_LATERAL * a;
        }
        RecoveryStrategy::AltitudeGain => {
            cmd.collective_adjustment = CLIMB_COLLECTIVE * a;
            cmd.longitudinal_cyclic_adjustment = CLIMB_LONGITUDINAL * a;
        }
    }
    cmd.clamped()
}

pub struct VortexRecoveryController {
    phase: RecoveryPhase,
    selection: StrategySelection,
    aggression: f64,
    timing: RecoveryTiming,
    last_transition: Option<RecoveryTransition>,
    episodes: u64,
    timeouts: u64,
}

impl VortexRecoveryController {
    pub fn new(selection: StrategySelection, aggression: f64, timing: RecoveryTiming) -> Self {
        let mut ctrl = Self {
            phase: RecoveryPhase::Standby,
            selection,
            aggression: 0.5,
            timing,
            last_transition: None,
            episodes: 0,
            timeouts: 0,
        };
        ctrl.set_aggression_level(aggression);
        ctrl
    }

    /// Run one cycle against the detector's verdict.
    pub fn update(&mut self, state: &VortexRingState, now: Instant) -> ControlCommand {
        self.last_transition = None;
        let severity = if state.severity.is_finite() {
            state.severity.clamp(0.0, 1.0)
        } else {
            1.0
        };

        match self.phase {
            RecoveryPhase::Standby => {
                if !state.is_active {
                    return ControlCommand::hold();
                }
                let strategy = self.select_strategy(severity);
                self.phase = RecoveryPhase::Recovering {
                    entered_at: now,
                    strategy,
                    inactive_since: None,
                };
                self.episodes += 1;
                self.last_transition = Some(RecoveryTransition::Entered(strategy));
                info!(?strategy, severity, "vortex ring recovery started");
                execute_recovery_maneuver(strategy, severity, self.aggression)
            }
            RecoveryPhase::Recovering {
                entered_at,
                strategy,
                inactive_since,
            } => {
                if now.saturating_duration_since(entered_at) >= self.timing.cap {
                    self.phase = RecoveryPhase::Standby;
                    self.timeouts += 1;
                    self.last_transition = Some(RecoveryTransition::TimedOut);
                    warn!(
                        cap_s = self.timing.cap.as_secs_f64(),
                        "vortex ring recovery hit its time cap"
                    );
                    return ControlCommand::hold();
                }

                if !state.is_active {
                    let since = inactive_since.unwrap_or(now);
                    if now.saturating_duration_since(since) >= self.timing.debounce {
                        self.phase = RecoveryPhase::Standby;
                        self.last_transition = Some(RecoveryTransition::Completed);
                        info!(
                            elapsed_s = now.saturating_duration_since(entered_at).as_secs_f64(),
                            "vortex ring recovery complete"
                        );
                    } else {
                        self.phase = RecoveryPhase::Recovering {
                            entered_at,
                            strategy,
                            inactive_since: Some(since),
                        };
                    }
                    return ControlCommand::hold();
                }

                let next = self.select_strategy(severity);
                if next != strategy {
                    debug!(from = ?strategy, to = ?next, severity, "recovery strategy changed");
                    self.last_transition = Some(RecoveryTransition::StrategyChanged(next));
                }
                self.phase = RecoveryPhase::Recovering {
                    entered_at,
                    strategy: next,
                    inactive_since: None,
                };
                execute_recovery_maneuver(next, severity, self.aggression)
            }
        }
    }

    fn select_strategy(&self, severity: f64) -> RecoveryStrategy {
        match self.selection {
            StrategySelection::BySeverity => RecoveryStrategy::for_severity(severity),
            StrategySelection::Fixed(strategy) => strategy,
        }
    }

    pub fn set_recovery_strategy(&mut self, selection: StrategySelection) {
        self.selection = selection;
    }

    #[inline]
    pub fn strategy_selection(&self) -> StrategySelection {
        self.selection
    }

    /// Clamped to [0, 1]; non-finite values are ignored.
    pub fn set_aggression_level(&mut self, aggression: f64) {
        if aggression.is_finite() {
            self.aggression = aggression.clamp(0.0, 1.0);
        }
    }

    #[inline]
    pub fn aggression_level(&self) -> f64 {
        self.aggression
    }

    #[inline]
    pub fn phase(&self) -> RecoveryPhase {
        self.phase
    }

    #[inline]
    pub fn is_recovery_active(&self) -> bool {
        matches!(self.phase, RecoveryPhase::Recovering { .. })
    }

    /// Strategy of the ongoing episode.
    pub fn current_strategy(&self) -> Option<RecoveryStrategy> {
        match self.phase {
            RecoveryPhase::Recovering { strategy, .. } => Some(strategy),
            RecoveryPhase::Standby => None,
        }
    }

    #[inline]
    pub fn last_transition(&self) -> Option<RecoveryTransition> {
        self.last_transition
    }

    /// Elapsed over nominal duration, in [0, 1]. Zero in standby.
    pub fn recovery_progress(&self, now: Instant) -> f64 {
        match self.phase {
            RecoveryPhase::Recovering { entered_at, .. } => {
                let nominal = self.timing.nominal.as_secs_f64();
                if nominal <= 0.0 {
                    return 1.0;
                }
                (now.saturating_duration_since(entered_at).as_secs_f64() / nominal).clamp(0.0, 1.0)
            }
            RecoveryPhase::Standby => 0.0,
        }
    }

    #[inline]
    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    #[inline]
    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    pub fn reset(&mut self) {
        self.phase = RecoveryPhase::Standby;
        self.last_transition = None;
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
