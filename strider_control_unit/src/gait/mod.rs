//! Gait state machines.
//!
//! Each variant is a hybrid automaton: named states with entry
//! actions, per-tick actions, and guarded transitions. Controllers
//! run after sensor conditioning and before the joint-law pass, so
//! they see debounced contact and may either configure joint modes or
//! write torques directly (leaving those joints `Off`).

pub mod demo;
pub mod legs;
pub mod pendular;
pub mod walker;

use strider_common::config::{ControllerKind, CoreConfig};
use strider_common::consts::MAX_TRANSITION_EVENTS;
use strider_common::state::{Leg, RobotState};
use strider_common::telemetry::TransitionEvent;

use crate::control::Joints;

// ─── State Bookkeeping ──────────────────────────────────────────────

/// Entry-time bookkeeping shared by every variant.
///
/// `transition` stamps the entry time and arms a one-shot entry flag;
/// the controller consumes the flag on the next tick to run its entry
/// actions exactly once per state entry, re-entries included.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateTimer {
    entered_at: f64,
    just_entered: bool,
}

impl StateTimer {
    pub fn new() -> Self {
        Self {
            entered_at: 0.0,
            just_entered: true,
        }
    }

    /// Stamp a state entry at time `t`.
    pub fn enter(&mut self, t: f64) {
        self.entered_at = t;
        self.just_entered = true;
    }

    /// Consume the entry flag. True exactly once after each `enter`.
    pub fn take_entry(&mut self) -> bool {
        std::mem::replace(&mut self.just_entered, false)
    }

    /// Time spent in the current state [s].
    #[inline]
    pub fn elapsed(&self, t: f64) -> f64 {
        t - self.entered_at
    }
}

impl Default for StateTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded record of state transitions between telemetry snapshots.
/// Overflow drops the oldest entry.
#[derive(Debug, Clone, Default)]
pub struct TransitionLog {
    events: heapless::Vec<TransitionEvent, MAX_TRANSITION_EVENTS>,
}

impl TransitionLog {
    pub fn record(&mut self, t: f64, from: u8, to: u8) {
        if self.events.is_full() {
            self.events.remove(0);
        }
        let _ = self.events.push(TransitionEvent { t, from, to });
    }

    /// Take the accumulated events, leaving the log empty.
    pub fn drain(&mut self) -> heapless::Vec<TransitionEvent, MAX_TRANSITION_EVENTS> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Rate-limited reference for feeding position loops from stepped
/// setpoints. Same slewing rule as the rigid `QdPd` mode, kept in the
/// gait layer for joints whose position loop lives elsewhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlewRef {
    q_ref: f64,
}

impl SlewRef {
    pub fn new(q_now: f64) -> Self {
        Self { q_ref: q_now }
    }

    /// Advance the reference toward `q_d` by at most `dt * |qd_d|`.
    pub fn step(&mut self, q_d: f64, qd_d: f64, dt: f64) -> f64 {
        let err = q_d - self.q_ref;
        let dq = dt * qd_d.abs();
        if err.abs() < dq {
            self.q_ref = q_d;
        } else if err > 0.0 {
            self.q_ref += dq;
        } else {
            self.q_ref -= dq;
        }
        self.q_ref
    }

    #[inline]
    pub fn get(&self) -> f64 {
        self.q_ref
    }
}

// ─── Default Joint Gains ────────────────────────────────────────────

/// Hand-tuned default servo gains, shared by the variants.
pub mod gains {
    /// Hip roll PD.
    pub const HIP_ROLL_KP: f64 = 400.0;
    pub const HIP_ROLL_KD: f64 = 2.0;
    /// Hip pitch PD.
    pub const HIP_PITCH_KP: f64 = 40.0;
    pub const HIP_PITCH_KD: f64 = 0.05;
    /// Knee PD.
    pub const KNEE_KP: f64 = 25.0;
    pub const KNEE_KD: f64 = 0.02;
    /// Ankle inner torque loop.
    pub const ANKLE_KP: f64 = 16.0;
    pub const ANKLE_KD: f64 = 0.1;
    /// Ankle outer position loop.
    pub const ANKLE_KPP: f64 = 200.0;
    pub const ANKLE_KDD: f64 = 1.0;
}

// ─── Controller Trait ───────────────────────────────────────────────

/// One gait strategy driving the robot.
pub trait GaitController {
    fn name(&self) -> &'static str;

    /// Current state id for telemetry (variant-specific numbering).
    fn state_id(&self) -> u8;

    /// The leg currently treated as stance.
    fn stance_leg(&self) -> Leg;

    /// Time spent in the current state at robot time `t` [s].
    fn state_elapsed(&self, t: f64) -> f64;

    /// True once the controller has entered its crash sink.
    fn crashed(&self) -> bool;

    /// Force the crash/disable path (external shutdown, fatal fault).
    fn force_crash(&mut self, s: &mut RobotState, joints: &mut Joints, log: &mut TransitionLog);

    /// Run one control tick: entry actions, per-tick actions, guards.
    fn tick(&mut self, s: &mut RobotState, joints: &mut Joints, log: &mut TransitionLog);
}

/// Crash posture shared by the walking variants: every joint law off,
/// torques zeroed, motors de-powered. One-way; callers keep applying
/// it every tick while crashed.
pub(crate) fn crash_posture(s: &mut RobotState, joints: &mut Joints) {
    joints.hip_roll.set_off();
    for i in 0..2 {
        joints.hip_pitch[i].set_off();
        joints.knee[i].set_off();
        joints.ankle[i].set_off();
    }
    s.zero_torques();
    s.powered = strider_common::state::MotorMask::empty();
}

/// Construct the configured gait variant.
pub fn build(cfg: &CoreConfig) -> Box<dyn GaitController + Send> {
    match cfg.controller {
        ControllerKind::Demo => Box::new(demo::DemoController::new(cfg.demo)),
        ControllerKind::Pendular => Box::new(pendular::PendularController::new(cfg.pendular)),
        ControllerKind::Walker => Box::new(walker::WalkerController::new(cfg.walker)),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
