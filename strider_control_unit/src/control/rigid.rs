//! Control laws for rigidly actuated joints (hips and knees).
//!
//! Each joint runs one mode at a time. Modes own their gains and
//! setpoints, so switching modes always starts from a clean slate;
//! there is no stale state to zero out.

/// Active control mode of a rigid joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RigidMode {
    /// Torque is owned by someone else; the law leaves it untouched.
    Off,
    /// Commanded torque forced to zero.
    Limp,
    /// Pure proportional servo on position.
    P { kp: f64, q_d: f64 },
    /// PD servo on position and velocity.
    Pd { kp: f64, kd: f64, q_d: f64, qd_d: f64 },
    /// PD servo plus feed-forward torque.
    PdFf {
        kp: f64,
        kd: f64,
        q_d: f64,
        qd_d: f64,
        tau_ff: f64,
    },
    /// Velocity-limited reference tracker. An internal reference
    /// `q_ref` slews toward `q_d` at most `|qd_d|` per second and the
    /// PD servo tracks the reference, bounding the commanded speed of
    /// large setpoint jumps.
    QdPd {
        kp: f64,
        kd: f64,
        q_d: f64,
        qd_d: f64,
        q_ref: f64,
    },
}

/// One rigidly actuated joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidJoint {
    mode: RigidMode,
}

impl Default for RigidJoint {
    fn default() -> Self {
        Self { mode: RigidMode::Off }
    }
}

impl RigidJoint {
    #[inline]
    pub fn mode(&self) -> &RigidMode {
        &self.mode
    }

    /// Release the joint: torque untouched by the law pass.
    pub fn set_off(&mut self) {
        self.mode = RigidMode::Off;
    }

    /// Force zero torque.
    pub fn set_limp(&mut self) {
        self.mode = RigidMode::Limp;
    }

    pub fn set_p(&mut self, kp: f64, q_d: f64) {
        self.mode = RigidMode::P { kp, q_d };
    }

    pub fn set_pd(&mut self, kp: f64, kd: f64, q_d: f64, qd_d: f64) {
        self.mode = RigidMode::Pd { kp, kd, q_d, qd_d };
    }

    pub fn set_pd_ff(&mut self, kp: f64, kd: f64, q_d: f64, qd_d: f64, tau_ff: f64) {
        self.mode = RigidMode::PdFf { kp, kd, q_d, qd_d, tau_ff };
    }

    /// Enter or retarget the velocity-limited tracker. On entry from
    /// another mode the internal reference seeds from the measured
    /// angle `q_now`, so the reference never jumps.
    pub fn set_qdpd(&mut self, kp: f64, kd: f64, q_d: f64, qd_d: f64, q_now: f64) {
        let q_ref = match self.mode {
            RigidMode::QdPd { q_ref, .. } => q_ref,
            _ => q_now,
        };
        self.mode = RigidMode::QdPd { kp, kd, q_d, qd_d, q_ref };
    }

    /// Evaluate the control law for one tick.
    ///
    /// Returns `None` in [`RigidMode::Off`], meaning the commanded
    /// torque is left to whoever set it this tick.
    pub fn control(&mut self, q: f64, qd: f64, dt: f64) -> Option<f64> {
        match &mut self.mode {
            RigidMode::Off => None,
            RigidMode::Limp => Some(0.0),
            RigidMode::P { kp, q_d } => Some(*kp * (*q_d - q)),
            RigidMode::Pd { kp, kd, q_d, qd_d } => {
                Some(*kp * (*q_d - q) + *kd * (*qd_d - qd))
            }
            RigidMode::PdFf { kp, kd, q_d, qd_d, tau_ff } => {
                Some(*kp * (*q_d - q) + *kd * (*qd_d - qd) + *tau_ff)
            }
            RigidMode::QdPd { kp, kd, q_d, qd_d, q_ref } => {
                let referror = *q_d - *q_ref;
                let dq = dt * qd_d.abs();
                if referror.abs() < dq {
                    *q_ref = *q_d;
                } else if referror > 0.0 {
                    *q_ref += dq;
                } else {
                    *q_ref -= dq;
                }
                Some(*kp * (*q_ref - q) + *kd * (*qd_d - qd))
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
