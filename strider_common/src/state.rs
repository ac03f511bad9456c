//! RobotState blackboard and joint/leg identifiers.
//!
//! The blackboard is refreshed from the sensor collaborator at the
//! start of every tick, partially overwritten (torque fields) by the
//! control core, and handed to the actuator collaborator at the end.
//! Single writer per tick; telemetry consumers only ever see copies.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::consts::{CONTACT_CLEAR_COUNT, CONTACT_SET_COUNT, FOOT_SWITCH_THRESHOLD};

// ─── Leg / Joint Identifiers ────────────────────────────────────────

/// Physical leg identifier, usable as an index into the fixed
/// two-element per-leg arrays of [`RobotState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Leg {
    Left = 0,
    Right = 1,
}

impl Leg {
    /// Array index for this leg.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The opposite leg.
    #[inline]
    pub const fn other(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Left),
            1 => Some(Self::Right),
            _ => None,
        }
    }
}

// ─── Pushbuttons / Motor Masks ──────────────────────────────────────

bitflags! {
    /// Front-panel pushbutton state, as bit flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PanelButtons: u16 {
        const BUTTON1 = 0x0001;
        const BUTTON2 = 0x0002;
        const BUTTON3 = 0x0004;
        const BUTTON4 = 0x0008;
        const BUTTON5 = 0x0010;
        const BUTTON6 = 0x0020;
    }
}

bitflags! {
    /// Per-motor mask used for both the power enable word and the
    /// amplifier fault word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MotorMask: u8 {
        const HIP_ROLL      = 0x01;
        const L_HIP_PITCH   = 0x02;
        const L_KNEE        = 0x04;
        const L_ANKLE_PITCH = 0x08;
        const R_HIP_PITCH   = 0x10;
        const R_KNEE        = 0x20;
        const R_ANKLE_PITCH = 0x40;
    }
}

impl MotorMask {
    /// All seven actuated motors.
    pub const ALL_MOTORS: Self = Self::from_bits_truncate(0x7F);

    /// The three actuated motors of one leg.
    #[inline]
    pub const fn leg(leg: Leg) -> Self {
        match leg {
            Leg::Left => Self::from_bits_truncate(
                Self::L_HIP_PITCH.bits() | Self::L_KNEE.bits() | Self::L_ANKLE_PITCH.bits(),
            ),
            Leg::Right => Self::from_bits_truncate(
                Self::R_HIP_PITCH.bits() | Self::R_KNEE.bits() | Self::R_ANKLE_PITCH.bits(),
            ),
        }
    }
}

// ─── Per-Leg Sensor / Actuator Data ─────────────────────────────────

/// Per-leg joint angles or velocities [rad, rad/s].
///
/// One instance each for position and velocity in [`RobotState`].
/// The ankle roll is a passive joint (sensing only), and the ankle
/// pitch carries a motor-side encoder because a series-elastic spring
/// sits between motor and joint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LegDof {
    /// Hip pitch (fore/aft swing) [rad].
    pub hip_pitch: f64,
    /// Knee flexion [rad].
    pub knee: f64,
    /// Ankle pitch, joint side of the series spring [rad].
    pub ankle_pitch: f64,
    /// Ankle pitch, motor side of the series spring [rad].
    pub ankle_pitch_motor: f64,
    /// Ankle roll (passive) [rad].
    pub ankle_roll: f64,
}

/// Per-leg commanded joint torques [Nm].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LegTorque {
    pub hip_pitch: f64,
    pub knee: f64,
    pub ankle_pitch: f64,
}

/// One foot pressure switch with its debounce state.
///
/// `input` and `threshold` classify the raw analog reading; `count`
/// accumulates consecutive agreeing ticks; `contact` is the hysteretic
/// boolean output. The debounce logic itself lives in the control
/// core's contact module.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootSwitch {
    /// Latest raw analog reading [V].
    pub input: f64,
    /// Classification threshold [V]; below means on the ground.
    pub threshold: f64,
    /// Signed debounce counter.
    pub count: i32,
    /// Debounced, hysteretic contact state.
    pub contact: bool,
    /// Counter bound beyond which contact latches on.
    pub set_count: i32,
    /// Counter bound below which contact latches off.
    pub clear_count: i32,
}

impl Default for FootSwitch {
    fn default() -> Self {
        Self {
            input: 0.0,
            threshold: FOOT_SWITCH_THRESHOLD,
            count: 0,
            contact: false,
            set_count: CONTACT_SET_COUNT,
            clear_count: CONTACT_CLEAR_COUNT,
        }
    }
}

/// The two pressure switches of one foot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FootSwitches {
    /// Heel switch.
    pub back: FootSwitch,
    /// Toe switch.
    pub front: FootSwitch,
}

impl FootSwitches {
    /// Either switch reports debounced contact.
    #[inline]
    pub fn any_contact(&self) -> bool {
        self.back.contact || self.front.contact
    }
}

/// Battery rail voltage readings [V].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BatteryRails {
    /// Unswitched motor battery.
    pub motor_unswitched: f64,
    /// Switched motor battery.
    pub motor_switched: f64,
    /// Unswitched computer battery.
    pub computer_unswitched: f64,
    /// Switched computer battery.
    pub computer_switched: f64,
}

// ─── RobotState Blackboard ──────────────────────────────────────────

/// Per-tick sensor/actuator blackboard.
///
/// All angles are calibrated radians and all torques Newton-meters;
/// scaling from raw device units is the sensor collaborator's job.
/// Per-leg arrays are indexed by [`Leg::index`].
#[derive(Debug, Clone, Default)]
pub struct RobotState {
    /// Current time [s] (monotonic, set by the driver).
    pub t: f64,
    /// Nominal tick interval [s].
    pub dt: f64,

    /// Hip roll (lateral) angle [rad]. A single joint couples the legs.
    pub hip_roll_q: f64,
    /// Hip roll velocity [rad/s].
    pub hip_roll_qd: f64,
    /// Hip roll commanded torque [Nm].
    pub hip_roll_tau: f64,

    /// Per-leg joint angles.
    pub q: [LegDof; 2],
    /// Per-leg joint velocities.
    pub qd: [LegDof; 2],
    /// Per-leg commanded torques.
    pub tau: [LegTorque; 2],

    /// Per-foot pressure switches.
    pub foot: [FootSwitches; 2],

    /// Battery voltages.
    pub battery: BatteryRails,
    /// Front-panel pushbutton state.
    pub buttons: PanelButtons,
    /// Amplifier fault flags reported by the motor drivers.
    pub motor_faults: MotorMask,
    /// Motor power enable mask; cleared motors receive zero torque.
    pub powered: MotorMask,
}

impl RobotState {
    /// True when none of the four foot switches reports contact.
    #[inline]
    pub fn airborne(&self) -> bool {
        !self.foot[0].any_contact() && !self.foot[1].any_contact()
    }

    /// Zero every commanded torque, including hip roll.
    #[inline]
    pub fn zero_torques(&mut self) {
        self.hip_roll_tau = 0.0;
        self.tau = [LegTorque::default(); 2];
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leg_indexing() {
        assert_eq!(Leg::Left.index(), 0);
        assert_eq!(Leg::Right.index(), 1);
        assert_eq!(Leg::Left.other(), Leg::Right);
        assert_eq!(Leg::Right.other(), Leg::Left);
        assert_eq!(Leg::from_u8(0), Some(Leg::Left));
        assert_eq!(Leg::from_u8(1), Some(Leg::Right));
        assert_eq!(Leg::from_u8(2), None);
    }

    #[test]
    fn motor_mask_covers_all_motors() {
        let combined = MotorMask::HIP_ROLL | MotorMask::leg(Leg::Left) | MotorMask::leg(Leg::Right);
        assert_eq!(combined, MotorMask::ALL_MOTORS);
    }

    #[test]
    fn airborne_requires_all_switches_off() {
        let mut s = RobotState::default();
        assert!(s.airborne());
        s.foot[Leg::Left.index()].front.contact = true;
        assert!(!s.airborne());
    }

    #[test]
    fn zero_torques_clears_everything() {
        let mut s = RobotState::default();
        s.hip_roll_tau = 1.0;
        s.tau[0].knee = -2.0;
        s.tau[1].ankle_pitch = 3.0;
        s.zero_torques();
        assert_eq!(s.hip_roll_tau, 0.0);
        assert_eq!(s.tau[0].knee, 0.0);
        assert_eq!(s.tau[1].ankle_pitch, 0.0);
    }

    #[test]
    fn foot_switch_defaults() {
        let sw = FootSwitch::default();
        assert_eq!(sw.threshold, FOOT_SWITCH_THRESHOLD);
        assert_eq!(sw.count, 0);
        assert!(!sw.contact);
        assert!(sw.set_count > 0);
        assert!(sw.clear_count < 0);
    }
}
