//! Heuristic pendular walking controller.
//!
//! An ad-hoc strategy that treats each leg as a pendulum: the swing
//! hip servos the relative leg center-of-mass angle along an
//! extension-then-retraction trajectory, the stance hip servos body
//! pitch and absorbs the swing reaction torque, and the knees follow
//! a retract/hold/extend trajectory timed from the start of the
//! stride. Body pitch is estimated from the stance leg joint chain,
//! assuming the stance foot is flat on the ground.
//!
//! Hips run torque-direct (joint law `Off`); knees run the
//! rate-limited rigid tracker; ankles feed a rate-limited reference
//! into the series-elastic position loop.

use tracing::{error, info};

use strider_common::config::PendularConfig;
use strider_common::state::{Leg, MotorMask, PanelButtons, RobotState};

use crate::control::spline;
use crate::control::Joints;
use crate::gait::legs::Roles;
use crate::gait::{crash_posture, gains, GaitController, SlewRef, StateTimer, TransitionLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendularState {
    Begin = 0,
    Launch = 1,
    Swing = 2,
    ToeOff = 3,
    Crash = 4,
}

pub struct PendularController {
    cfg: PendularConfig,
    state: PendularState,
    timer: StateTimer,
    roles: Roles,

    /// Start of the current stride, captured at toe-off entry.
    t0_swing: f64,
    /// Relative leg angle at the start of the stride.
    rel0_ang: f64,
    /// Rate-limited ankle references, indexed like the blackboard.
    ankle_ref: [SlewRef; 2],
    /// Ankle target and rate per side, stepped by the slew each tick.
    ankle_target: [(f64, f64); 2],
}

impl PendularController {
    pub fn new(cfg: PendularConfig) -> Self {
        Self {
            cfg,
            state: PendularState::Begin,
            timer: StateTimer::new(),
            roles: Roles::new(Leg::Left),
            t0_swing: 0.0,
            rel0_ang: cfg.launch_rel_ang,
            ankle_ref: [SlewRef::new(0.0); 2],
            ankle_target: [(0.0, 0.0); 2],
        }
    }

    fn transition(&mut self, to: PendularState, t: f64, log: &mut TransitionLog) {
        info!(from = self.state as u8, to = to as u8, t, "pendular transition");
        log.record(t, self.state as u8, to as u8);
        self.state = to;
        self.timer.enter(t);
    }

    /// Desired relative leg angle along the stride: quintic extension
    /// over `t_hip_extend`, then constant-rate retraction capped at
    /// the configured maximum.
    fn relative_leg_trajectory(&self, t: f64) -> f64 {
        let p = &self.cfg;
        let tt = ((t - self.t0_swing) / p.t_hip_extend).max(0.0);
        if tt < 1.0 {
            spline::quintic(
                tt,
                self.rel0_ang,
                0.0,
                0.0,
                p.ext_rel_ang_com,
                p.ret_rel_omega_com,
                0.0,
            )
            .x
        } else {
            let angle = p.ext_rel_ang_com + p.ret_rel_omega_com * (tt - 1.0);
            angle.min(p.ret_max_ang_com)
        }
    }

    /// Desired swing knee angle: retract, hold bent, extend.
    fn knee_trajectory(&self, t: f64) -> f64 {
        let p = &self.cfg;
        let mut dt = t - self.t0_swing;
        if dt < p.t_knee_retract {
            return spline::quintic_pp(dt / p.t_knee_retract, p.st_q_d_knee, p.sw_q_d_knee).x;
        }
        dt -= p.t_knee_retract;
        if dt < p.t_knee_bent {
            return p.sw_q_d_knee;
        }
        dt -= p.t_knee_bent;
        spline::quintic_pp(dt / p.t_knee_extend, p.sw_q_d_knee, p.st_q_d_knee).x
    }

    /// Retarget one ankle's slewed reference.
    fn set_ankle_target(&mut self, leg: usize, q_now: f64, q_d: f64, qd_d: f64, reseed: bool) {
        if reseed {
            self.ankle_ref[leg] = SlewRef::new(q_now);
        }
        self.ankle_target[leg] = (q_d, qd_d);
    }

    /// Step both ankle references and push them into the SEA loops.
    fn drive_ankles(&mut self, s: &RobotState, joints: &mut Joints, k: [f64; 2], b: [f64; 2]) {
        for leg in 0..2 {
            let (q_d, qd_d) = self.ankle_target[leg];
            let q_ref = self.ankle_ref[leg].step(q_d, qd_d, s.dt);
            joints.ankle[leg].set_position_pd(
                k[leg],
                b[leg],
                q_ref,
                qd_d,
                gains::ANKLE_KP,
                gains::ANKLE_KD,
            );
        }
    }

    /// Torque-direct hip actuation shared by `Swing` and `ToeOff`.
    fn hip_actuation(&mut self, s: &mut RobotState) {
        let p = self.cfg;
        let rel_ang = -self.roles.rel_hip_q(s); // swing minus stance
        let rel_omega = -self.roles.rel_hip_qd(s);
        let rel_d = self.relative_leg_trajectory(s.t);

        let sw_tau = -p.sw_k_hip * (rel_ang - rel_d) - p.sw_b_hip * rel_omega;
        let pitch = self.roles.pitch(s);
        let st_tau = p.st_k_hip * (pitch - p.q_d_pitch)
            - p.st_b_hip * s.qd[self.roles.st()].hip_pitch
            - sw_tau;

        s.tau[self.roles.sw()].hip_pitch = sw_tau;
        s.tau[self.roles.st()].hip_pitch = st_tau;
    }
}

impl GaitController for PendularController {
    fn name(&self) -> &'static str {
        "pendular"
    }

    fn state_id(&self) -> u8 {
        self.state as u8
    }

    fn stance_leg(&self) -> Leg {
        self.roles.stance()
    }

    fn state_elapsed(&self, t: f64) -> f64 {
        self.timer.elapsed(t)
    }

    fn crashed(&self) -> bool {
        self.state == PendularState::Crash
    }

    fn force_crash(&mut self, s: &mut RobotState, joints: &mut Joints, log: &mut TransitionLog) {
        if self.state != PendularState::Crash {
            error!("pendular controller crashing, motors off");
            self.transition(PendularState::Crash, s.t, log);
        }
        crash_posture(s, joints);
    }

    fn tick(&mut self, s: &mut RobotState, joints: &mut Joints, log: &mut TransitionLog) {
        let p = self.cfg;

        match self.state {
            PendularState::Begin => {
                joints.all_limp();
                self.roles = Roles::new(Leg::Left);
                self.transition(PendularState::Launch, s.t, log);
            }

            PendularState::Launch => {
                if self.timer.take_entry() {
                    info!("launch posture held, press button 2 to walk");
                    self.rel0_ang = p.launch_rel_ang;

                    joints.hip_roll.set_qdpd(
                        p.k_hip_roll,
                        p.b_hip_roll,
                        p.q_d_hip_roll,
                        p.qd_d_hip_roll,
                        s.hip_roll_q,
                    );
                    let (st, sw) = (self.roles.st(), self.roles.sw());
                    joints.hip_pitch[st].set_qdpd(
                        p.st_k_hip,
                        p.st_b_hip,
                        p.launch_q_d_hip,
                        0.5,
                        s.q[st].hip_pitch,
                    );
                    joints.hip_pitch[sw].set_qdpd(
                        p.sw_k_hip,
                        p.sw_b_hip,
                        p.launch_q_d_hip + self.rel0_ang,
                        0.5,
                        s.q[sw].hip_pitch,
                    );
                    joints.knee[st].set_qdpd(
                        p.st_k_knee,
                        p.st_b_knee,
                        p.st_q_d_knee,
                        p.st_qd_d_knee,
                        s.q[st].knee,
                    );
                    joints.knee[sw].set_qdpd(
                        p.sw_k_knee,
                        p.sw_b_knee,
                        p.sw_q_d_knee,
                        p.sw_qd_d_knee,
                        s.q[sw].knee,
                    );
                    self.set_ankle_target(st, s.q[st].ankle_pitch, p.st_q_d_ankle, p.st_qd_d_ankle, true);
                    self.set_ankle_target(sw, s.q[sw].ankle_pitch, p.sw_q_d_ankle, p.sw_qd_d_ankle, true);
                }

                let (st, sw) = (self.roles.st(), self.roles.sw());
                let mut k = [0.0; 2];
                let mut b = [0.0; 2];
                k[st] = p.st_k_ankle;
                k[sw] = p.sw_k_ankle;
                b[st] = p.st_b_ankle;
                b[sw] = p.sw_b_ankle;
                self.drive_ankles(s, joints, k, b);

                let (st_back, st_front) = self.roles.st_contact(s);
                let (sw_back, sw_front) = self.roles.sw_contact(s);
                if st_back
                    && st_front
                    && !sw_back
                    && !sw_front
                    && s.buttons.contains(PanelButtons::BUTTON2)
                {
                    self.transition(PendularState::Swing, s.t, log);
                }
            }

            PendularState::Swing => {
                let (st, sw) = (self.roles.st(), self.roles.sw());
                if self.timer.take_entry() {
                    info!(stance = ?self.roles.stance(), "entering swing");

                    joints.hip_roll.set_qdpd(
                        p.k_hip_roll,
                        p.b_hip_roll,
                        p.q_d_hip_roll,
                        p.qd_d_hip_roll,
                        s.hip_roll_q,
                    );
                    // Hip pitch torques are computed explicitly.
                    joints.hip_pitch[st].set_off();
                    joints.hip_pitch[sw].set_off();

                    joints.knee[sw].set_qdpd(
                        p.sw_k_knee,
                        p.sw_b_knee,
                        p.sw_q_d_knee,
                        p.sw_qd_d_knee,
                        s.q[sw].knee,
                    );
                    joints.knee[st].set_qdpd(
                        p.st_k_knee,
                        p.st_b_knee,
                        p.st_q_d_knee,
                        p.st_qd_d_knee,
                        s.q[st].knee,
                    );
                    // Retract the swing ankle for ground clearance,
                    // hold the stance ankle.
                    self.set_ankle_target(sw, s.q[sw].ankle_pitch, p.sw_q_d_ankle, p.sw_qd_d_ankle, true);
                    self.set_ankle_target(st, s.q[st].ankle_pitch, p.st_q_d_ankle, p.st_qd_d_ankle, true);
                }

                self.hip_actuation(s);

                let knee_q_d = self.knee_trajectory(s.t);
                joints.knee[sw].set_qdpd(
                    p.sw_k_knee,
                    p.sw_b_knee,
                    knee_q_d,
                    p.sw_qd_d_knee,
                    s.q[sw].knee,
                );

                // Re-extend the swing ankle for a shallow landing.
                if s.t - self.t0_swing > p.t_ankle_bent {
                    self.ankle_target[sw].0 = p.st_q_d_ankle;
                }
                let mut k = [0.0; 2];
                let mut b = [0.0; 2];
                k[st] = p.st_k_ankle;
                k[sw] = p.sw_k_ankle;
                b[st] = p.st_b_ankle;
                b[sw] = p.sw_b_ankle;
                self.drive_ankles(s, joints, k, b);

                // Touchdown ends the step; the roles swap here and
                // nowhere else in the cycle.
                let (st_back, st_front) = self.roles.st_contact(s);
                let (sw_back, _) = self.roles.sw_contact(s);
                if self.timer.elapsed(s.t) > p.tmin_swing && st_back && st_front && sw_back {
                    self.roles.swap();
                    self.transition(PendularState::ToeOff, s.t, log);
                }
            }

            PendularState::ToeOff => {
                let (st, sw) = (self.roles.st(), self.roles.sw());
                if self.timer.take_entry() {
                    info!(stance = ?self.roles.stance(), "entering toe off");
                    // The stride restarts here: the rear (now swing)
                    // leg begins its trajectory from the measured
                    // separation.
                    self.t0_swing = s.t;
                    self.rel0_ang = -self.roles.rel_hip_q(s);

                    // The new stance leg is the front leg; the rear
                    // knee keeps its stance gains through toe-off.
                    joints.knee[st].set_qdpd(
                        p.st_k_knee,
                        p.st_b_knee,
                        p.st_q_d_knee,
                        p.st_qd_d_knee,
                        s.q[st].knee,
                    );
                    // Front ankle to stance gains, rear ankle toes off.
                    self.set_ankle_target(st, s.q[st].ankle_pitch, p.st_q_d_ankle, p.st_qd_d_ankle, false);
                    self.set_ankle_target(sw, s.q[sw].ankle_pitch, p.to_q_d_ankle, p.st_qd_d_ankle, false);
                }

                self.hip_actuation(s);

                let knee_q_d = self.knee_trajectory(s.t);
                joints.knee[sw].set_qdpd(
                    p.st_k_knee,
                    p.st_b_knee,
                    knee_q_d,
                    p.st_qd_d_knee,
                    s.q[sw].knee,
                );

                let mut k = [0.0; 2];
                let mut b = [0.0; 2];
                k[st] = p.st_k_ankle;
                k[sw] = p.to_k_ankle;
                b[st] = p.st_b_ankle;
                b[sw] = p.to_b_ankle;
                self.drive_ankles(s, joints, k, b);

                let (st_back, st_front) = self.roles.st_contact(s);
                let (sw_back, sw_front) = self.roles.sw_contact(s);
                if self.timer.elapsed(s.t) > p.tmin_toeoff
                    && !sw_back
                    && st_back
                    && st_front
                    && (!sw_front || s.q[sw].ankle_pitch > p.to_q_d_ankle)
                {
                    self.transition(PendularState::Swing, s.t, log);
                }
            }

            PendularState::Crash => {
                crash_posture(s, joints);
            }
        }

        s.powered = if self.state == PendularState::Crash {
            MotorMask::empty()
        } else {
            MotorMask::ALL_MOTORS
        };
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
