//! Versioned telemetry snapshots.
//!
//! The control core periodically serializes a [`Snapshot`] of the
//! robot blackboard plus controller bookkeeping. Every snapshot
//! carries [`PROTOCOL_VERSION`]; consumers must probe the version
//! before interpreting any other field, and treat a mismatch as an
//! error rather than guessing at field meanings.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert;

use crate::consts::MAX_TRANSITION_EVENTS;
use crate::error::TelemetryError;
use crate::state::{BatteryRails, LegDof, LegTorque, RobotState};

/// Telemetry protocol version. Bump on any incompatible change to
/// [`Snapshot`] or its nested types.
pub const PROTOCOL_VERSION: u32 = 1;

const_assert!(PROTOCOL_VERSION > 0);
const_assert!(MAX_TRANSITION_EVENTS >= 4);

// ─── Snapshot Types ─────────────────────────────────────────────────

/// One gait state transition observed during the reporting interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    /// Time of the transition [s].
    pub t: f64,
    /// State id before the transition.
    pub from: u8,
    /// State id after the transition.
    pub to: u8,
}

/// Controller-side bookkeeping attached to a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    /// Current gait state id (controller-specific numbering).
    pub state_id: u8,
    /// Time spent in the current state [s].
    pub elapsed: f64,
    /// Index of the current stance leg (0 = left, 1 = right).
    pub stance_leg: u8,
    /// Transitions since the previous snapshot, oldest first. Bounded;
    /// overflow drops the oldest events.
    #[serde(default)]
    pub transitions: heapless::Vec<TransitionEvent, MAX_TRANSITION_EVENTS>,
}

/// Cycle timing measurements [µs].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TickTiming {
    /// Time spent reading and filtering sensors.
    pub sensor_us: u32,
    /// Total busy time of the tick.
    pub total_us: u32,
    /// Ticks that overran the cycle budget since startup.
    pub overruns: u64,
}

/// Per-foot contact summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactSnapshot {
    pub back_contact: bool,
    pub front_contact: bool,
    pub back_count: i32,
    pub front_count: i32,
}

/// A complete telemetry frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Protocol version; must equal [`PROTOCOL_VERSION`] to interpret
    /// the rest of the frame.
    pub version: u32,
    /// Tick counter at capture time.
    pub tick: u64,
    /// Robot time [s].
    pub t: f64,

    /// Hip roll angle, velocity, torque.
    pub hip_roll: [f64; 3],
    /// Per-leg joint angles.
    pub q: [LegDof; 2],
    /// Per-leg joint velocities.
    pub qd: [LegDof; 2],
    /// Per-leg commanded torques.
    pub tau: [LegTorque; 2],
    /// Per-foot debounced contact summaries.
    pub contact: [ContactSnapshot; 2],
    /// Battery rail voltages.
    pub battery: BatteryRails,
    /// Motor power enable mask (raw bits).
    pub powered: u8,
    /// Amplifier fault mask (raw bits).
    pub motor_faults: u8,

    /// Controller bookkeeping.
    pub controller: ControllerSnapshot,
    /// Cycle timing.
    pub timing: TickTiming,
}

impl Snapshot {
    /// Capture a frame from the blackboard and controller bookkeeping.
    pub fn capture(
        tick: u64,
        state: &RobotState,
        controller: ControllerSnapshot,
        timing: TickTiming,
    ) -> Self {
        let contact = [0, 1].map(|i| {
            let foot = &state.foot[i];
            ContactSnapshot {
                back_contact: foot.back.contact,
                front_contact: foot.front.contact,
                back_count: foot.back.count,
                front_count: foot.front.count,
            }
        });
        Self {
            version: PROTOCOL_VERSION,
            tick,
            t: state.t,
            hip_roll: [state.hip_roll_q, state.hip_roll_qd, state.hip_roll_tau],
            q: state.q,
            qd: state.qd,
            tau: state.tau,
            contact,
            battery: state.battery,
            powered: state.powered.bits(),
            motor_faults: state.motor_faults.bits(),
            controller,
            timing,
        }
    }

    /// Serialize to a JSON line.
    pub fn encode(&self) -> Result<String, TelemetryError> {
        serde_json::to_string(self).map_err(|e| TelemetryError::Encode(e.to_string()))
    }

    /// Deserialize a frame, checking the protocol version first.
    pub fn decode(raw: &str) -> Result<Self, TelemetryError> {
        let probe: VersionProbe =
            serde_json::from_str(raw).map_err(|e| TelemetryError::Decode(e.to_string()))?;
        if probe.version != PROTOCOL_VERSION {
            return Err(TelemetryError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                found: probe.version,
            });
        }
        serde_json::from_str(raw).map_err(|e| TelemetryError::Decode(e.to_string()))
    }
}

/// Minimal frame header for version checking without a full parse.
#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

// ─── Tests ──────────────────────────────────────────────────────────
