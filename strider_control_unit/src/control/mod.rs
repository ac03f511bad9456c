//! Per-joint control laws and trajectory generation.

pub mod rigid;
pub mod sea;
pub mod spline;

use strider_common::config::SeaConfig;
use strider_common::state::{Leg, RobotState};

use rigid::RigidJoint;
use sea::SeaJoint;

/// All actuated joints of the robot with their active control modes.
///
/// Gait controllers set modes and setpoints; the cycle driver calls
/// [`Joints::apply`] once per tick to turn them into torque commands
/// on the blackboard. Joints in an `Off` mode leave whatever torque
/// the gait controller wrote directly.
#[derive(Debug, Clone)]
pub struct Joints {
    pub hip_roll: RigidJoint,
    pub hip_pitch: [RigidJoint; 2],
    pub knee: [RigidJoint; 2],
    pub ankle: [SeaJoint; 2],
}

impl Joints {
    pub fn new(sea: &SeaConfig) -> Self {
        Self {
            hip_roll: RigidJoint::default(),
            hip_pitch: [RigidJoint::default(); 2],
            knee: [RigidJoint::default(); 2],
            ankle: [
                SeaJoint::new(sea.k_spring(Leg::Left.index()), sea.spring_ratio),
                SeaJoint::new(sea.k_spring(Leg::Right.index()), sea.spring_ratio),
            ],
        }
    }

    /// Put every joint in `Limp`, commanding zero torque everywhere.
    pub fn all_limp(&mut self) {
        self.hip_roll.set_limp();
        for i in 0..2 {
            self.hip_pitch[i].set_limp();
            self.knee[i].set_limp();
            self.ankle[i].set_limp();
        }
    }

    /// Evaluate every joint's control law against the blackboard and
    /// write the resulting torque commands back.
    pub fn apply(&mut self, s: &mut RobotState) {
        let dt = s.dt;

        if let Some(tau) = self.hip_roll.control(s.hip_roll_q, s.hip_roll_qd, dt) {
            s.hip_roll_tau = tau;
        }
        for i in 0..2 {
            if let Some(tau) = self.hip_pitch[i].control(s.q[i].hip_pitch, s.qd[i].hip_pitch, dt) {
                s.tau[i].hip_pitch = tau;
            }
            if let Some(tau) = self.knee[i].control(s.q[i].knee, s.qd[i].knee, dt) {
                s.tau[i].knee = tau;
            }
            if let Some(tau) = self.ankle[i].control(
                s.q[i].ankle_pitch_motor,
                s.qd[i].ankle_pitch_motor,
                s.q[i].ankle_pitch,
                s.qd[i].ankle_pitch,
                dt,
            ) {
                s.tau[i].ankle_pitch = tau;
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
