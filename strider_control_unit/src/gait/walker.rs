//! Staged walking controller.
//!
//! Walks by explicit stages: stand and settle (`GetReady`), launch
//! the first step (`Initiate`), then cycle `EarlySwing` →
//! `LateSwing` → `ToeOff` with the stance flag flipping only at toe
//! off. Losing all four foot switches in any walking state drops to
//! `NoStanceLeg`, an airborne recovery posture, which returns to
//! `GetReady` once both feet are firmly down again.
//!
//! The hips run torque-direct: a PD on the relative hip angle tracks
//! a quintic swing trajectory, a bisecting torso controller leans the
//! body forward, and the stance hip carries the negated swing torque
//! plus the bisecting term. Transition guards read the raw signed
//! debounce counts against larger bounds than the contact latch,
//! trading latency for certainty.

use tracing::{error, info};

use strider_common::config::WalkerConfig;
use strider_common::state::{Leg, MotorMask, PanelButtons, RobotState};

use crate::control::spline;
use crate::control::Joints;
use crate::gait::legs::Roles;
use crate::gait::{crash_posture, gains, GaitController, StateTimer, TransitionLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkerState {
    Begin = 0,
    GetReady = 1,
    Initiate = 2,
    EarlySwing = 3,
    LateSwing = 4,
    ToeOff = 5,
    NoStanceLeg = 6,
    Crash = 7,
}

// Per-state servo tunings that are not walking-cycle parameters.
const READY_KNEE_KP: f64 = 35.0;
const READY_KNEE_KD: f64 = 2.0;
const READY_HIP_KP: f64 = 80.0;
const READY_HIP_KD: f64 = 0.2;
const READY_ANKLE_TAU: f64 = 4.0;
const LAUNCH_SWING_ANKLE_TAU: f64 = 5.5;
const SWING_HIP_KP: f64 = 40.0;
const SWING_HIP_KD: f64 = 5.0;
const BISECT_KP: f64 = 150.0;
const BISECT_KD: f64 = 4.0;
const STANCE_KNEE_KP: f64 = 70.0;
const STANCE_KNEE_KD: f64 = 3.0;
const TOEOFF_FRONT_KNEE_KP: f64 = 80.0;
const TOEOFF_FRONT_KNEE_KD: f64 = 2.0;
const SWING_ANKLE_KPP: f64 = 120.0;
const SWING_ANKLE_KDD: f64 = 2.0;
const SWING_ANKLE_KP: f64 = 4.0;
const PUSHOFF_TAU: f64 = 4.0;
const SETTLE_TAU: f64 = 2.5;
const CLEARANCE_ANKLE_Q: f64 = -0.4;
const LANDING_ANKLE_Q: f64 = 0.1;
const STANCE_ANKLE_OFFSET: f64 = 0.02;
const ANKLE_PHASE_TIME: f64 = 0.1;
const RAMP_TIME: f64 = 1.0;
const RECOVERY_KNEE_KP: f64 = 20.0;
const RECOVERY_KNEE_KD: f64 = 1.0;
const RECOVERY_HIP_KP: f64 = 10.0;
const RECOVERY_HIP_KD: f64 = 0.1;
const RECOVERY_ANKLE_KPP: f64 = 100.0;

/// Spline bookkeeping for one position-tracked joint: boundary
/// conditions of the active segment plus the last commanded setpoint,
/// from which the next segment starts and the reference velocity is
/// derived by differencing.
#[derive(Debug, Clone, Copy, Default)]
struct Track {
    start: f64,
    start_qd: f64,
    target: f64,
    last_q: f64,
    last_qd: f64,
}

impl Track {
    /// Start a new segment from the last commanded setpoint.
    fn rearm(&mut self, target: f64, start_qd: f64) {
        self.start = self.last_q;
        self.start_qd = start_qd;
        self.target = target;
    }

    /// Start a new segment from an explicit position.
    fn rearm_from(&mut self, start: f64, target: f64) {
        self.start = start;
        self.start_qd = 0.0;
        self.target = target;
        self.last_q = start;
        self.last_qd = 0.0;
    }

    /// Sample the segment at scaled time `ts`.
    fn sample(&self, ts: f64) -> f64 {
        spline::quintic(ts, self.start, self.start_qd, 0.0, self.target, 0.0, 0.0).x
    }

    /// Record the (possibly clamped) commanded setpoint and derive
    /// the reference velocity by differencing.
    fn commit(&mut self, q_d: f64, dt: f64) -> (f64, f64) {
        let qd_d = (q_d - self.last_q) / dt;
        self.last_q = q_d;
        self.last_qd = qd_d;
        (q_d, qd_d)
    }
}

pub struct WalkerController {
    cfg: WalkerConfig,
    state: WalkerState,
    timer: StateTimer,
    roles: Roles,

    /// Trajectory phase carried across EarlySwing → LateSwing.
    t1: f64,
    /// Reserved second carry-over (stays zero with a zero-dwell toe
    /// off, kept because the phase sum defines the trajectory time).
    t2: f64,
    /// Relative hip angle at the start of the hip trajectory.
    rel_prev: f64,
    /// Per-leg knee spline bookkeeping, blackboard indexing.
    knee: [Track; 2],
    /// Per-leg hip recovery splines for `NoStanceLeg`.
    hip: [Track; 2],
}

impl WalkerController {
    pub fn new(cfg: WalkerConfig) -> Self {
        let mut knee = [Track::default(); 2];
        let mut hip = [Track::default(); 2];
        for i in 0..2 {
            knee[i].rearm_from(cfg.knee_pos, cfg.knee_pos);
            hip[i].rearm_from(cfg.hip_pitch_pos, cfg.hip_pitch_pos);
        }
        Self {
            cfg,
            state: WalkerState::Begin,
            timer: StateTimer::new(),
            roles: Roles::new(Leg::Right),
            t1: 0.0,
            t2: 0.0,
            rel_prev: 0.0,
            knee,
            hip,
        }
    }

    fn transition(&mut self, to: WalkerState, t: f64, log: &mut TransitionLog) {
        info!(from = self.state as u8, to = to as u8, t, "walker transition");
        log.record(t, self.state as u8, to as u8);
        self.state = to;
        self.timer.enter(t);
    }

    /// All four switches firmly off the ground.
    fn picked_up(&self, s: &RobotState) -> bool {
        let cn = self.cfg.release_count;
        s.foot.iter().all(|f| f.back.count < cn && f.front.count < cn)
    }

    /// Both feet firmly down on at least one switch each.
    fn both_feet_down(&self, s: &RobotState) -> bool {
        let cp = self.cfg.contact_count;
        s.foot.iter().all(|f| f.back.count > cp || f.front.count > cp)
    }

    /// Torque-direct hip actuation: relative-angle PD along the swing
    /// trajectory plus the bisecting torso controller on the stance
    /// side. `phase` is the accumulated trajectory time, `leaning`
    /// the (possibly ramped) forward lean offset.
    fn hip_actuation(&mut self, s: &mut RobotState, phase: f64, leaning: f64) {
        let p = &self.cfg;
        let (st, sw) = (self.roles.st(), self.roles.sw());

        let rel_q = self.roles.rel_hip_q(s);
        let rel_qd = self.roles.rel_hip_qd(s);
        let rel_q_d = spline::quintic(
            p.hip_time_scale * phase,
            self.rel_prev,
            0.0,
            0.0,
            p.hip_swing,
            0.0,
            0.0,
        )
        .x;

        let bisect = -BISECT_KP * (s.q[sw].hip_pitch + s.q[st].hip_pitch + leaning)
            - BISECT_KD * (s.qd[sw].hip_pitch + s.qd[st].hip_pitch);

        let sw_tau = SWING_HIP_KP * (rel_q - rel_q_d) + SWING_HIP_KD * rel_qd;
        s.tau[sw].hip_pitch = sw_tau;
        s.tau[st].hip_pitch = -sw_tau + bisect;
    }

    /// Ankle torque/position schedule by state and time-in-state.
    /// The stance ankle pushes off with a torque proportional to how
    /// far it has rolled forward, floored at zero so it never pulls
    /// the toe into the ground.
    fn ankle_schedule(&mut self, s: &RobotState, joints: &mut Joints, elapsed: f64) {
        let p = &self.cfg;
        let (st, sw) = (self.roles.st(), self.roles.sw());
        let pushoff =
            (PUSHOFF_TAU - p.k_ankle * (s.q[st].ankle_pitch + STANCE_ANKLE_OFFSET)).max(0.0);

        match self.state {
            WalkerState::ToeOff => {
                joints.ankle[st].set_torque_pd(gains::ANKLE_KP, gains::ANKLE_KD, PUSHOFF_TAU);
                joints.ankle[sw].set_torque_pd(SWING_ANKLE_KP, gains::ANKLE_KD, PUSHOFF_TAU);
            }
            WalkerState::LateSwing if elapsed > ANKLE_PHASE_TIME => {
                // Stretch the swing ankle to land shallow.
                joints.ankle[sw].set_position_pd(
                    SWING_ANKLE_KPP,
                    SWING_ANKLE_KDD,
                    LANDING_ANKLE_Q,
                    0.0,
                    SWING_ANKLE_KP,
                    gains::ANKLE_KD,
                );
                joints.ankle[st].set_torque_pd(gains::ANKLE_KP, gains::ANKLE_KD, pushoff);
            }
            WalkerState::EarlySwing if elapsed < ANKLE_PHASE_TIME => {
                // Swing ankle curls for ground clearance; the fresh
                // stance foot settles onto the ground gently.
                joints.ankle[sw].set_position_pd(
                    SWING_ANKLE_KPP,
                    SWING_ANKLE_KDD,
                    CLEARANCE_ANKLE_Q,
                    0.0,
                    SWING_ANKLE_KP,
                    gains::ANKLE_KD,
                );
                joints.ankle[st].set_torque_pd(gains::ANKLE_KP, gains::ANKLE_KD, SETTLE_TAU);
            }
            _ => {
                joints.ankle[sw].set_position_pd(
                    SWING_ANKLE_KPP,
                    SWING_ANKLE_KDD,
                    CLEARANCE_ANKLE_Q,
                    0.0,
                    SWING_ANKLE_KP,
                    gains::ANKLE_KD,
                );
                joints.ankle[st].set_torque_pd(gains::ANKLE_KP, gains::ANKLE_KD, pushoff);
            }
        }
    }
}

impl GaitController for WalkerController {
    fn name(&self) -> &'static str {
        "walker"
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
        self.state == WalkerState::Crash
    }

    fn force_crash(&mut self, s: &mut RobotState, joints: &mut Joints, log: &mut TransitionLog) {
        if self.state != WalkerState::Crash {
            error!("walker crashing, motors off");
            self.transition(WalkerState::Crash, s.t, log);
        }
        crash_posture(s, joints);
    }

    fn tick(&mut self, s: &mut RobotState, joints: &mut Joints, log: &mut TransitionLog) {
        let p = self.cfg;
        let elapsed = self.timer.elapsed(s.t);

        match self.state {
            WalkerState::Begin => {
                joints.all_limp();
                self.transition(WalkerState::GetReady, s.t, log);
            }

            WalkerState::GetReady => {
                if self.timer.take_entry() {
                    info!("standing, press button 2 to start walking");
                    self.roles = Roles::new(Leg::Right);
                    self.t2 = 0.0;

                    joints.hip_roll.set_pd(
                        gains::HIP_ROLL_KP,
                        gains::HIP_ROLL_KD,
                        p.hip_roll_pos,
                        0.0,
                    );
                    for i in 0..2 {
                        joints.hip_pitch[i].set_pd(READY_HIP_KP, READY_HIP_KD, p.hip_pitch_pos, 0.0);
                        joints.knee[i].set_pd(READY_KNEE_KP, READY_KNEE_KD, p.knee_pos, 0.0);
                        joints.ankle[i].set_torque_pd(gains::ANKLE_KP, gains::ANKLE_KD, READY_ANKLE_TAU);
                        self.knee[i].rearm_from(p.knee_pos, p.knee_pos);
                        self.hip[i].rearm_from(p.hip_pitch_pos, p.hip_pitch_pos);
                    }
                }

                // With both heels firmly planted, trade ankle preload
                // against the measured roll-forward.
                let both_heels = s.foot.iter().all(|f| f.back.count > p.contact_count);
                for i in 0..2 {
                    let tau = if both_heels {
                        (READY_ANKLE_TAU - p.k_ankle * s.q[i].ankle_pitch).max(0.0)
                    } else {
                        READY_ANKLE_TAU
                    };
                    joints.ankle[i].set_torque_pd(gains::ANKLE_KP, gains::ANKLE_KD, tau);
                }

                if s.buttons.contains(PanelButtons::BUTTON2) {
                    self.transition(WalkerState::Initiate, s.t, log);
                }
            }

            WalkerState::Initiate => {
                let (st, sw) = (self.roles.st(), self.roles.sw());
                if self.timer.take_entry() {
                    info!(stance = ?self.roles.stance(), "initiating first step");
                    joints.hip_pitch[st].set_off();
                    joints.hip_pitch[sw].set_off();
                    joints.ankle[sw].set_torque_pd(
                        gains::ANKLE_KP,
                        gains::ANKLE_KD,
                        LAUNCH_SWING_ANKLE_TAU,
                    );
                    self.rel_prev = self.roles.rel_hip_q(s);
                    self.t1 = 0.0;
                    self.t2 = 0.0;
                }

                // Build up the forward lean gently so the bisecting
                // controller does not kick.
                let ramp = (elapsed / RAMP_TIME).min(1.0);
                self.hip_actuation(s, elapsed, ramp * p.leaning);

                // Ramp the swing knee stiffness in over the same
                // interval; the leg first swings back on its own
                // dynamics, then stiffens toward the hold posture.
                joints.knee[sw].set_pd(
                    ramp * p.swing_knee_kp,
                    ramp * p.swing_knee_kd,
                    p.knee_pos,
                    0.0,
                );

                if self.picked_up(s) {
                    self.transition(WalkerState::NoStanceLeg, s.t, log);
                } else if self.roles.sw_counts(s).0 > p.contact_count_fast {
                    self.transition(WalkerState::ToeOff, s.t, log);
                }
            }

            WalkerState::EarlySwing => {
                let (st, sw) = (self.roles.st(), self.roles.sw());
                if self.timer.take_entry() {
                    info!(stance = ?self.roles.stance(), "entering early swing");
                    joints.hip_pitch[st].set_off();
                    joints.hip_pitch[sw].set_off();
                    joints.knee[sw].set_pd(p.swing_knee_kp, p.swing_knee_kd, p.knee_pos, 0.0);
                    joints.knee[st].set_pd(STANCE_KNEE_KP, STANCE_KNEE_KD, p.knee_pos, 0.0);

                    let qd = self.knee[sw].last_qd;
                    self.knee[sw].rearm(p.knee_swing, qd);
                    self.rel_prev = self.roles.rel_hip_q(s);
                    self.t1 = 0.0;
                }

                self.hip_actuation(s, elapsed + self.t1 + self.t2, p.leaning);

                // Retract the swing knee; clamp so the spline cannot
                // overshoot the bend target.
                let raw = self.knee[sw]
                    .sample(p.knee_swing_time_scale * elapsed)
                    .min(p.knee_swing);
                let (q_d, qd_d) = self.knee[sw].commit(raw, s.dt);
                joints.knee[sw].set_pd(p.swing_knee_kp, p.swing_knee_kd, q_d, qd_d);

                self.ankle_schedule(s, joints, elapsed);

                if self.picked_up(s) {
                    self.transition(WalkerState::NoStanceLeg, s.t, log);
                } else if s.q[sw].hip_pitch < p.early_swing_exit_angle - p.leaning {
                    // Carry the phase so the hip trajectory continues
                    // seamlessly through late swing.
                    self.t1 = elapsed;
                    self.transition(WalkerState::LateSwing, s.t, log);
                }
            }

            WalkerState::LateSwing => {
                let sw = self.roles.sw();
                if self.timer.take_entry() {
                    self.knee[sw].rearm(p.knee_pos, 0.0);
                }

                self.hip_actuation(s, elapsed + self.t1 + self.t2, p.leaning);

                // Extend the knee for landing; clamp against
                // overshooting past straight.
                let raw = self.knee[sw]
                    .sample(p.knee_stretch_time_scale * elapsed)
                    .max(p.knee_pos);
                let (q_d, qd_d) = self.knee[sw].commit(raw, s.dt);
                joints.knee[sw].set_pd(p.swing_knee_kp, p.swing_knee_kd, q_d, qd_d);

                self.ankle_schedule(s, joints, elapsed);

                if self.picked_up(s) {
                    self.transition(WalkerState::NoStanceLeg, s.t, log);
                } else if self.roles.sw_counts(s).0 > p.contact_count_fast {
                    self.transition(WalkerState::ToeOff, s.t, log);
                }
            }

            WalkerState::ToeOff => {
                let (st, sw) = (self.roles.st(), self.roles.sw());
                if self.timer.take_entry() {
                    info!(stance = ?self.roles.stance(), "toe off");
                    // The stance leg is about to go airborne: soften
                    // its knee, stiffen the landing leg's.
                    joints.knee[st].set_pd(p.swing_knee_kp, p.swing_knee_kd, p.knee_pos, 0.0);
                    joints.knee[sw].set_pd(
                        TOEOFF_FRONT_KNEE_KP,
                        TOEOFF_FRONT_KNEE_KD,
                        p.knee_pos,
                        0.0,
                    );
                    self.t1 = 0.0;
                    self.t2 = 0.0;
                }

                self.hip_actuation(s, elapsed, p.leaning);
                self.ankle_schedule(s, joints, elapsed);

                // Hold both knees at the standing bend.
                for leg in [st, sw] {
                    let (q_d, qd_d) = self.knee[leg].commit(p.knee_pos, s.dt);
                    let (kp, kd) = if leg == st {
                        (p.swing_knee_kp, p.swing_knee_kd)
                    } else {
                        (TOEOFF_FRONT_KNEE_KP, TOEOFF_FRONT_KNEE_KD)
                    };
                    joints.knee[leg].set_pd(kp, kd, q_d, qd_d);
                }

                if self.picked_up(s) {
                    self.transition(WalkerState::NoStanceLeg, s.t, log);
                } else if elapsed > p.time_toe_off {
                    // The only place the stance flag flips.
                    self.roles.swap();
                    self.transition(WalkerState::EarlySwing, s.t, log);
                }
            }

            WalkerState::NoStanceLeg => {
                if self.timer.take_entry() {
                    info!("airborne, recovering neutral posture");
                    joints.hip_roll.set_pd(
                        gains::HIP_ROLL_KP,
                        gains::HIP_ROLL_KD,
                        p.hip_roll_pos,
                        0.0,
                    );
                    for i in 0..2 {
                        self.knee[i].rearm(p.knee_pos, 0.0);
                        self.hip[i].rearm_from(s.q[i].hip_pitch, p.hip_pitch_pos);
                        joints.ankle[i].set_position_pd(
                            RECOVERY_ANKLE_KPP,
                            SWING_ANKLE_KDD,
                            p.ankle_pos,
                            0.0,
                            SWING_ANKLE_KP,
                            gains::ANKLE_KD,
                        );
                    }
                }

                let ts = p.recovery_time_scale * elapsed;
                for i in 0..2 {
                    let raw = self.knee[i].sample(ts);
                    let (q_d, qd_d) = self.knee[i].commit(raw, s.dt);
                    joints.knee[i].set_pd(RECOVERY_KNEE_KP, RECOVERY_KNEE_KD, q_d, qd_d);

                    let raw = self.hip[i].sample(ts);
                    let (q_d, qd_d) = self.hip[i].commit(raw, s.dt);
                    joints.hip_pitch[i].set_pd(RECOVERY_HIP_KP, RECOVERY_HIP_KD, q_d, qd_d);
                }

                if self.both_feet_down(s) {
                    self.transition(WalkerState::GetReady, s.t, log);
                }
            }

            WalkerState::Crash => {
                crash_posture(s, joints);
            }
        }

        s.powered = if self.state == WalkerState::Crash {
            MotorMask::empty()
        } else {
            MotorMask::ALL_MOTORS
        };
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use strider_common::config::SeaConfig;
    use strider_common::state::FootSwitches;

    use crate::control::sea::SeaMode;

    const DT: f64 = 0.001;

    fn setup() -> (WalkerController, RobotState, Joints, TransitionLog) {
        let mut s = RobotState::default();
        s.dt = DT;
        (
            WalkerController::new(WalkerConfig::default()),
            s,
            Joints::new(&SeaConfig::default()),
            TransitionLog::default(),
        )
    }

    fn step(c: &mut WalkerController, s: &mut RobotState, j: &mut Joints, log: &mut TransitionLog) {
        c.tick(s, j, log);
        s.t += DT;
    }

    fn set_counts(foot: &mut FootSwitches, back: i32, front: i32) {
        foot.back.count = back;
        foot.front.count = front;
    }

    fn stand(s: &mut RobotState) {
        set_counts(&mut s.foot[0], 25, 25);
        set_counts(&mut s.foot[1], 25, 25);
    }

    /// Drive a fresh controller to GetReady.
    fn to_get_ready(c: &mut WalkerController, s: &mut RobotState, j: &mut Joints, log: &mut TransitionLog) {
        stand(s);
        step(c, s, j, log); // Begin -> GetReady
        assert_eq!(c.state_id(), WalkerState::GetReady as u8);
    }

    /// Drive a fresh controller to Initiate: lift the swing (left)
    /// foot and press the walk button.
    fn to_initiate(c: &mut WalkerController, s: &mut RobotState, j: &mut Joints, log: &mut TransitionLog) {
        to_get_ready(c, s, j, log);
        set_counts(&mut s.foot[0], -5, -5);
        s.buttons = PanelButtons::BUTTON2;
        step(c, s, j, log);
        s.buttons = PanelButtons::empty();
        assert_eq!(c.state_id(), WalkerState::Initiate as u8);
    }

    #[test]
    fn begin_reaches_get_ready_in_one_tick() {
        let (mut c, mut s, mut j, mut log) = setup();
        step(&mut c, &mut s, &mut j, &mut log);
        assert_eq!(c.state_id(), WalkerState::GetReady as u8);
        assert_eq!(c.stance_leg(), Leg::Right);
    }

    #[test]
    fn button_starts_walking_in_one_tick() {
        let (mut c, mut s, mut j, mut log) = setup();
        to_get_ready(&mut c, &mut s, &mut j, &mut log);
        for _ in 0..10 {
            step(&mut c, &mut s, &mut j, &mut log);
        }
        assert_eq!(c.state_id(), WalkerState::GetReady as u8);
        s.buttons = PanelButtons::BUTTON2;
        step(&mut c, &mut s, &mut j, &mut log);
        assert_eq!(c.state_id(), WalkerState::Initiate as u8);
    }

    #[test]
    fn swing_heel_strike_drives_toe_off_and_role_swap() {
        let (mut c, mut s, mut j, mut log) = setup();
        to_initiate(&mut c, &mut s, &mut j, &mut log);
        assert_eq!(c.stance_leg(), Leg::Right);

        // Swing (left) heel reaches the fast contact count.
        for _ in 0..5 {
            step(&mut c, &mut s, &mut j, &mut log);
        }
        set_counts(&mut s.foot[0], 11, 0);
        step(&mut c, &mut s, &mut j, &mut log);
        assert_eq!(c.state_id(), WalkerState::ToeOff as u8);
        assert_eq!(c.stance_leg(), Leg::Right, "swap happens on leaving toe off");

        // Default toe-off dwell is zero: next tick swaps and swings.
        step(&mut c, &mut s, &mut j, &mut log);
        assert_eq!(c.state_id(), WalkerState::EarlySwing as u8);
        assert_eq!(c.stance_leg(), Leg::Left);
    }

    #[test]
    fn early_swing_exits_at_hip_angle() {
        let (mut c, mut s, mut j, mut log) = setup();
        to_initiate(&mut c, &mut s, &mut j, &mut log);
        set_counts(&mut s.foot[0], 11, 0);
        step(&mut c, &mut s, &mut j, &mut log); // -> ToeOff
        set_counts(&mut s.foot[0], 25, 25);
        step(&mut c, &mut s, &mut j, &mut log); // -> EarlySwing, stance Left
        assert_eq!(c.state_id(), WalkerState::EarlySwing as u8);

        // Swing (right) hip not yet past the exit angle.
        for _ in 0..10 {
            step(&mut c, &mut s, &mut j, &mut log);
        }
        assert_eq!(c.state_id(), WalkerState::EarlySwing as u8);

        s.q[1].hip_pitch = -0.2; // well past -0.05 - leaning
        step(&mut c, &mut s, &mut j, &mut log);
        assert_eq!(c.state_id(), WalkerState::LateSwing as u8);
        assert!(c.t1 > 0.0, "phase carry-over captured");
    }

    #[test]
    fn picked_up_from_any_walking_state_recovers() {
        for prime in 0..3 {
            let (mut c, mut s, mut j, mut log) = setup();
            to_initiate(&mut c, &mut s, &mut j, &mut log);
            // Optionally advance deeper into the cycle.
            if prime > 0 {
                set_counts(&mut s.foot[0], 11, 0);
                step(&mut c, &mut s, &mut j, &mut log); // ToeOff
            }
            if prime > 1 {
                stand(&mut s);
                step(&mut c, &mut s, &mut j, &mut log); // EarlySwing
            }
            // All four switches firmly off the ground.
            set_counts(&mut s.foot[0], -60, -60);
            set_counts(&mut s.foot[1], -60, -60);
            step(&mut c, &mut s, &mut j, &mut log);
            assert_eq!(c.state_id(), WalkerState::NoStanceLeg as u8);

            // Both feet regained: back to GetReady.
            stand(&mut s);
            step(&mut c, &mut s, &mut j, &mut log); // entry actions
            step(&mut c, &mut s, &mut j, &mut log);
            assert_eq!(c.state_id(), WalkerState::GetReady as u8);
        }
    }

    #[test]
    fn stance_ankle_pushoff_is_floored() {
        let (mut c, mut s, mut j, mut log) = setup();
        to_initiate(&mut c, &mut s, &mut j, &mut log);
        set_counts(&mut s.foot[0], 11, 0);
        step(&mut c, &mut s, &mut j, &mut log); // ToeOff
        stand(&mut s);
        step(&mut c, &mut s, &mut j, &mut log); // EarlySwing, stance Left
        // Deep in stance with the ankle rolled far forward the raw
        // push-off torque would go negative; it must clamp at zero.
        s.q[0].ankle_pitch = 0.5;
        s.t += 0.2; // past the settle window
        step(&mut c, &mut s, &mut j, &mut log);
        match joints_stance_ankle_mode(&j) {
            SeaMode::TorquePd { tau_d, .. } => assert_eq!(tau_d, 0.0),
            other => panic!("stance ankle not in torque mode: {other:?}"),
        }

        fn joints_stance_ankle_mode(j: &Joints) -> SeaMode {
            *j.ankle[0].mode()
        }
    }

    #[test]
    fn swing_hip_torque_is_direct_and_opposed() {
        let (mut c, mut s, mut j, mut log) = setup();
        to_initiate(&mut c, &mut s, &mut j, &mut log);
        step(&mut c, &mut s, &mut j, &mut log);
        // With zero angles and zero lean ramp progress small, the
        // swing torque tracks the trajectory error; the stance hip
        // carries its negation plus the bisecting term.
        let sw_tau = s.tau[0].hip_pitch; // left is swing
        let st_tau = s.tau[1].hip_pitch;
        assert!(sw_tau != 0.0);
        // bisect term with zero angles is only the leaning ramp
        let bisect = -BISECT_KP * (DT / RAMP_TIME).min(1.0) * c.cfg.leaning;
        assert!((st_tau - (-sw_tau + bisect)).abs() < 1e-9);
    }

    #[test]
    fn crash_is_permanent_and_unpowered() {
        let (mut c, mut s, mut j, mut log) = setup();
        to_initiate(&mut c, &mut s, &mut j, &mut log);
        c.force_crash(&mut s, &mut j, &mut log);
        assert!(c.crashed());
        stand(&mut s);
        s.buttons = PanelButtons::BUTTON2;
        for _ in 0..10 {
            step(&mut c, &mut s, &mut j, &mut log);
        }
        assert!(c.crashed());
        assert_eq!(s.powered, MotorMask::empty());
        assert_eq!(s.tau[0].hip_pitch, 0.0);
    }
}
