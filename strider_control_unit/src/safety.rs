//! Output-side safety gates, applied after the joint laws and before
//! the actuator write.
//!
//! Two gates run every tick, in order: per-axis torque saturation
//! against the configured limits, then the power mask, which zeroes
//! the command of every motor whose amplifier is not enabled. The
//! gates only ever shrink commands; no control law may bypass them.

use strider_common::config::TorqueLimits;
use strider_common::state::{Leg, MotorMask, RobotState};

/// Clamp every torque command to its per-axis limit. Returns the
/// number of axes that were saturated this tick.
pub fn clamp_torques(s: &mut RobotState, limits: &TorqueLimits) -> usize {
    let mut clamped = 0;
    let mut clamp = |tau: &mut f64, max: f64| {
        let bounded = tau.clamp(-max, max);
        if bounded != *tau {
            *tau = bounded;
            clamped += 1;
        }
    };

    clamp(&mut s.hip_roll_tau, limits.hip_roll);
    for i in 0..2 {
        clamp(&mut s.tau[i].hip_pitch, limits.hip_pitch);
        clamp(&mut s.tau[i].knee, limits.knee);
        clamp(&mut s.tau[i].ankle_pitch, limits.ankle_pitch);
    }
    clamped
}

/// Zero the torque command of every motor not in the powered mask.
/// Unpowered amplifiers ignore commands anyway; zeroing keeps the
/// written frame honest and the logs readable.
pub fn apply_power_mask(s: &mut RobotState) {
    if !s.powered.contains(MotorMask::HIP_ROLL) {
        s.hip_roll_tau = 0.0;
    }
    for leg in [Leg::Left, Leg::Right] {
        let i = leg.index();
        if !s.powered.intersects(mask_hip_pitch(leg)) {
            s.tau[i].hip_pitch = 0.0;
        }
        if !s.powered.intersects(mask_knee(leg)) {
            s.tau[i].knee = 0.0;
        }
        if !s.powered.intersects(mask_ankle(leg)) {
            s.tau[i].ankle_pitch = 0.0;
        }
    }
}

fn mask_hip_pitch(leg: Leg) -> MotorMask {
    match leg {
        Leg::Left => MotorMask::L_HIP_PITCH,
        Leg::Right => MotorMask::R_HIP_PITCH,
    }
}

fn mask_knee(leg: Leg) -> MotorMask {
    match leg {
        Leg::Left => MotorMask::L_KNEE,
        Leg::Right => MotorMask::R_KNEE,
    }
}

fn mask_ankle(leg: Leg) -> MotorMask {
    match leg {
        Leg::Left => MotorMask::L_ANKLE_PITCH,
        Leg::Right => MotorMask::R_ANKLE_PITCH,
    }
}
