//! Bench demo oscillator.
//!
//! Sleeps with the motors off until button 1 is pressed, then servos
//! every joint along a slow sinusoid around the posture captured at
//! wake-up. Pressing button 1 again goes back to sleep. Useful for
//! exercising the whole actuation chain with the robot on a stand.

use std::f64::consts::TAU;

use tracing::info;

use strider_common::config::DemoConfig;
use strider_common::state::{Leg, MotorMask, PanelButtons, RobotState};

use crate::control::Joints;
use crate::gait::{gains, GaitController, StateTimer, TransitionLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DemoState {
    Sleep = 0,
    Wave = 1,
}

/// Captured wake-up posture the sinusoid oscillates around.
#[derive(Debug, Clone, Copy, Default)]
struct Posture {
    hip_roll: f64,
    hip_pitch: [f64; 2],
    knee: [f64; 2],
    ankle: [f64; 2],
}

pub struct DemoController {
    cfg: DemoConfig,
    state: DemoState,
    timer: StateTimer,
    posture: Posture,
    prev_buttons: PanelButtons,
    disabled: bool,
}

impl DemoController {
    pub fn new(cfg: DemoConfig) -> Self {
        Self {
            cfg,
            state: DemoState::Sleep,
            timer: StateTimer::new(),
            posture: Posture::default(),
            prev_buttons: PanelButtons::empty(),
            disabled: false,
        }
    }

    fn transition(&mut self, to: DemoState, t: f64, log: &mut TransitionLog) {
        info!(from = self.state as u8, to = to as u8, t, "demo transition");
        log.record(t, self.state as u8, to as u8);
        self.state = to;
        self.timer.enter(t);
    }

    /// Rising edge of button 1 since the previous tick.
    fn wake_button(&self, s: &RobotState) -> bool {
        s.buttons.contains(PanelButtons::BUTTON1)
            && !self.prev_buttons.contains(PanelButtons::BUTTON1)
    }
}

impl GaitController for DemoController {
    fn name(&self) -> &'static str {
        "demo"
    }

    fn state_id(&self) -> u8 {
        self.state as u8
    }

    fn stance_leg(&self) -> Leg {
        Leg::Left
    }

    fn state_elapsed(&self, t: f64) -> f64 {
        self.timer.elapsed(t)
    }

    fn crashed(&self) -> bool {
        self.disabled
    }

    fn force_crash(&mut self, s: &mut RobotState, joints: &mut Joints, log: &mut TransitionLog) {
        if self.state != DemoState::Sleep {
            self.transition(DemoState::Sleep, s.t, log);
        }
        joints.all_limp();
        s.powered = MotorMask::empty();
        self.disabled = true;
    }

    fn tick(&mut self, s: &mut RobotState, joints: &mut Joints, log: &mut TransitionLog) {
        if self.disabled {
            s.powered = MotorMask::empty();
            return;
        }
        let wake = self.wake_button(s);
        self.prev_buttons = s.buttons;

        match self.state {
            DemoState::Sleep => {
                if self.timer.take_entry() {
                    joints.all_limp();
                }
                s.powered = MotorMask::empty();
                if wake {
                    self.transition(DemoState::Wave, s.t, log);
                }
            }
            DemoState::Wave => {
                if self.timer.take_entry() {
                    self.posture = Posture {
                        hip_roll: s.hip_roll_q,
                        hip_pitch: [s.q[0].hip_pitch, s.q[1].hip_pitch],
                        knee: [s.q[0].knee, s.q[1].knee],
                        ankle: [s.q[0].ankle_pitch, s.q[1].ankle_pitch],
                    };
                    s.powered = MotorMask::ALL_MOTORS;
                    info!(amplitude = self.cfg.amplitude, frequency = self.cfg.frequency, "waving");
                }

                let phase = TAU * self.cfg.frequency * self.timer.elapsed(s.t);
                let offset = self.cfg.amplitude * phase.sin();
                let vel = self.cfg.amplitude * TAU * self.cfg.frequency * phase.cos();

                joints.hip_roll.set_pd(
                    gains::HIP_ROLL_KP,
                    gains::HIP_ROLL_KD,
                    self.posture.hip_roll + offset,
                    vel,
                );
                for i in 0..2 {
                    joints.hip_pitch[i].set_pd(
                        gains::HIP_PITCH_KP,
                        gains::HIP_PITCH_KD,
                        self.posture.hip_pitch[i] + offset,
                        vel,
                    );
                    joints.knee[i].set_pd(
                        gains::KNEE_KP,
                        gains::KNEE_KD,
                        self.posture.knee[i] + offset,
                        vel,
                    );
                    joints.ankle[i].set_position_pd(
                        gains::ANKLE_KPP,
                        gains::ANKLE_KDD,
                        self.posture.ankle[i] + offset,
                        vel,
                        gains::ANKLE_KP,
                        gains::ANKLE_KD,
                    );
                }

                if wake {
                    self.transition(DemoState::Sleep, s.t, log);
                }
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
