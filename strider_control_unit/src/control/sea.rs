//! Control laws for the series-elastic ankle actuators.
//!
//! The motor drives the joint through a spring with lever ratio `r`,
//! so the transmitted load torque is observable from the deflection:
//! `tau_load = k_spring * r^2 * (q_motor - q_joint)`. Torque modes
//! close an inner PD loop on that load torque; position modes wrap an
//! outer position PD around the inner torque loop, low-pass filtering
//! the torque setpoint so sensor noise on the outer loop does not
//! excite the spring.

/// Active control mode of a series-elastic joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeaMode {
    /// Torque is owned by someone else; the law leaves it untouched.
    Off,
    /// Commanded motor torque forced to zero.
    Limp,
    /// Inner PD on load torque.
    TorquePd {
        kp: f64,
        kd: f64,
        tau_d: f64,
        tau_d_prev: f64,
    },
    /// Inner PD on load torque plus the setpoint as feed-forward.
    TorquePdFf {
        kp: f64,
        kd: f64,
        tau_d: f64,
        tau_d_prev: f64,
    },
    /// Outer position PD generating a filtered torque setpoint for
    /// the inner loop.
    PositionPd {
        kpp: f64,
        kdd: f64,
        q_d: f64,
        qd_d: f64,
        kp: f64,
        kd: f64,
        tau_d_prev: f64,
    },
    /// Position PD with the filtered setpoint also fed forward.
    PositionPdFf {
        kpp: f64,
        kdd: f64,
        q_d: f64,
        qd_d: f64,
        kp: f64,
        kd: f64,
        tau_d_prev: f64,
    },
}

/// One series-elastic joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeaJoint {
    /// Spring constant [Nm/rad on the motor side].
    k_spring: f64,
    /// Spring lever transmission ratio.
    ratio: f64,
    mode: SeaMode,
}

impl SeaJoint {
    pub fn new(k_spring: f64, ratio: f64) -> Self {
        Self {
            k_spring,
            ratio,
            mode: SeaMode::Off,
        }
    }

    #[inline]
    pub fn mode(&self) -> &SeaMode {
        &self.mode
    }

    /// Load torque observed from the spring deflection.
    #[inline]
    pub fn tau_load(&self, q_motor: f64, q_joint: f64) -> f64 {
        self.k_spring * self.ratio * self.ratio * (q_motor - q_joint)
    }

    pub fn set_off(&mut self) {
        self.mode = SeaMode::Off;
    }

    pub fn set_limp(&mut self) {
        self.mode = SeaMode::Limp;
    }

    /// Enter or retarget the torque loop. On entry from another mode
    /// the setpoint history seeds from `tau_d`, so the derivative term
    /// sees no step on the first tick.
    pub fn set_torque_pd(&mut self, kp: f64, kd: f64, tau_d: f64) {
        let tau_d_prev = match self.mode {
            SeaMode::TorquePd { tau_d_prev, .. } | SeaMode::TorquePdFf { tau_d_prev, .. } => {
                tau_d_prev
            }
            _ => tau_d,
        };
        self.mode = SeaMode::TorquePd { kp, kd, tau_d, tau_d_prev };
    }

    pub fn set_torque_pd_ff(&mut self, kp: f64, kd: f64, tau_d: f64) {
        let tau_d_prev = match self.mode {
            SeaMode::TorquePd { tau_d_prev, .. } | SeaMode::TorquePdFf { tau_d_prev, .. } => {
                tau_d_prev
            }
            _ => tau_d,
        };
        self.mode = SeaMode::TorquePdFf { kp, kd, tau_d, tau_d_prev };
    }

    /// Enter or retarget the position loop. The filtered torque
    /// setpoint carries over between position modes and seeds at zero
    /// when entering from elsewhere.
    pub fn set_position_pd(&mut self, kpp: f64, kdd: f64, q_d: f64, qd_d: f64, kp: f64, kd: f64) {
        let tau_d_prev = self.position_history();
        self.mode = SeaMode::PositionPd { kpp, kdd, q_d, qd_d, kp, kd, tau_d_prev };
    }

    pub fn set_position_pd_ff(
        &mut self,
        kpp: f64,
        kdd: f64,
        q_d: f64,
        qd_d: f64,
        kp: f64,
        kd: f64,
    ) {
        let tau_d_prev = self.position_history();
        self.mode = SeaMode::PositionPdFf { kpp, kdd, q_d, qd_d, kp, kd, tau_d_prev };
    }

    fn position_history(&self) -> f64 {
        match self.mode {
            SeaMode::PositionPd { tau_d_prev, .. } | SeaMode::PositionPdFf { tau_d_prev, .. } => {
                tau_d_prev
            }
            _ => 0.0,
        }
    }

    /// Evaluate the control law for one tick. Inputs are motor-side
    /// and joint-side angle and velocity. Returns the motor torque
    /// command, or `None` in [`SeaMode::Off`].
    pub fn control(
        &mut self,
        q_motor: f64,
        qd_motor: f64,
        q_joint: f64,
        qd_joint: f64,
        dt: f64,
    ) -> Option<f64> {
        let ks = self.k_spring * self.ratio * self.ratio;
        let tau_load = ks * (q_motor - q_joint);
        let dtau_load = ks * (qd_motor - qd_joint);

        match &mut self.mode {
            SeaMode::Off => None,
            SeaMode::Limp => Some(0.0),
            SeaMode::TorquePd { kp, kd, tau_d, tau_d_prev } => {
                let taud_d = (*tau_d - *tau_d_prev) / dt;
                let tau = (*tau_d - tau_load) * *kp + (taud_d - dtau_load) * *kd;
                *tau_d_prev = *tau_d;
                Some(tau)
            }
            SeaMode::TorquePdFf { kp, kd, tau_d, tau_d_prev } => {
                let taud_d = (*tau_d - *tau_d_prev) / dt;
                let tau = (*tau_d - tau_load) * *kp + (taud_d - dtau_load) * *kd + *tau_d;
                *tau_d_prev = *tau_d;
                Some(tau)
            }
            SeaMode::PositionPd { kpp, kdd, q_d, qd_d, kp, kd, tau_d_prev } => {
                let (tau_d, taud_d) =
                    filtered_setpoint(*kpp, *kdd, *q_d, *qd_d, q_joint, qd_joint, *tau_d_prev, dt);
                let tau = (tau_d - tau_load) * *kp + (taud_d - dtau_load) * *kd;
                *tau_d_prev = tau_d;
                Some(tau)
            }
            SeaMode::PositionPdFf { kpp, kdd, q_d, qd_d, kp, kd, tau_d_prev } => {
                let (tau_d, taud_d) =
                    filtered_setpoint(*kpp, *kdd, *q_d, *qd_d, q_joint, qd_joint, *tau_d_prev, dt);
                let tau = (tau_d - tau_load) * *kp + (taud_d - dtau_load) * *kd + tau_d;
                *tau_d_prev = tau_d;
                Some(tau)
            }
        }
    }
}

/// Outer-loop torque setpoint: raw position PD, one-pole low-pass
/// with a 15/16 pole, then a hard floor at -1.0 Nm so the filter can
/// never wind up commanding the ankle to pull hard into the ground.
/// Returns the filtered setpoint and its per-tick derivative.
#[inline]
fn filtered_setpoint(
    kpp: f64,
    kdd: f64,
    q_d: f64,
    qd_d: f64,
    q_joint: f64,
    qd_joint: f64,
    tau_d_prev: f64,
    dt: f64,
) -> (f64, f64) {
    let raw = (q_d - q_joint) * kpp + (qd_d - qd_joint) * kdd;
    let mut tau_d = (15.0 / 16.0) * tau_d_prev + (1.0 / 16.0) * raw;
    if tau_d < -1.0 {
        tau_d = -1.0;
    }
    let taud_d = (tau_d - tau_d_prev) / dt;
    (tau_d, taud_d)
}

// ─── Tests ──────────────────────────────────────────────────────────
