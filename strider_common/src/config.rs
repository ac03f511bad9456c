//! Configuration structures for the locomotion core.
//!
//! All config types use `serde::Deserialize` for TOML loading, with
//! `#[serde(default)]` on every tuning field so a partial file pulls in
//! the hand-tuned defaults. Validation rejects out-of-range bounds
//! before the control loop starts; parameters are immutable afterwards.

use serde::{Deserialize, Serialize};

use crate::consts::{
    ANALOG_MAX, ANALOG_MIN, CONTACT_CLEAR_COUNT, CONTACT_SET_COUNT, DEFAULT_CYCLE_TIME_US,
    FOOT_SWITCH_THRESHOLD,
};

// ─── Controller Selection ───────────────────────────────────────────

/// Which gait strategy drives the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    /// Sinusoidal posture oscillator for bench demos.
    Demo,
    /// Heuristic pendular walker (leg-COM angle servo).
    Pendular,
    /// Staged walker with explicit lift-off and toe-off phases.
    Walker,
}

impl Default for ControllerKind {
    fn default() -> Self {
        Self::Walker
    }
}

// ─── Top-Level Config ───────────────────────────────────────────────

/// Top-level locomotion core configuration.
///
/// Loaded from TOML at startup; immutable once the cycle loop runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Target cycle time in microseconds (default: 1000 = 1 kHz).
    #[serde(default = "default_cycle_time_us")]
    pub cycle_time_us: u32,

    /// Active gait strategy.
    #[serde(default)]
    pub controller: ControllerKind,

    /// Telemetry snapshot interval [ticks] (default: 10).
    #[serde(default = "default_telemetry_interval")]
    pub telemetry_interval: u32,

    /// Per-axis torque limits.
    #[serde(default)]
    pub limits: TorqueLimits,

    /// Foot switch thresholds and debounce bounds.
    #[serde(default)]
    pub contact: ContactConfig,

    /// Series-elastic ankle parameters.
    #[serde(default)]
    pub sea: SeaConfig,

    /// Demo oscillator tuning.
    #[serde(default)]
    pub demo: DemoConfig,

    /// Pendular walker tuning.
    #[serde(default)]
    pub pendular: PendularConfig,

    /// Staged walker tuning.
    #[serde(default)]
    pub walker: WalkerConfig,
}

fn default_cycle_time_us() -> u32 {
    DEFAULT_CYCLE_TIME_US
}
fn default_telemetry_interval() -> u32 {
    10
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            cycle_time_us: default_cycle_time_us(),
            controller: ControllerKind::default(),
            telemetry_interval: default_telemetry_interval(),
            limits: TorqueLimits::default(),
            contact: ContactConfig::default(),
            sea: SeaConfig::default(),
            demo: DemoConfig::default(),
            pendular: PendularConfig::default(),
            walker: WalkerConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Validate parameter bounds. Returns a human-readable reason on
    /// the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.cycle_time_us == 0 || self.cycle_time_us > 100_000 {
            return Err(format!(
                "cycle_time_us {} out of range (0, 100000]",
                self.cycle_time_us
            ));
        }
        if self.telemetry_interval == 0 {
            return Err("telemetry_interval must be >= 1".into());
        }
        self.limits.validate()?;
        self.contact.validate()?;
        self.sea.validate()?;
        self.walker.validate()?;
        self.pendular.validate()?;
        Ok(())
    }

    /// Tick interval [s].
    #[inline]
    pub fn dt(&self) -> f64 {
        self.cycle_time_us as f64 / 1_000_000.0
    }
}

// ─── Torque Limits ──────────────────────────────────────────────────

/// Per-axis torque saturation limits [Nm], applied after the control
/// laws and before the actuator write.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TorqueLimits {
    #[serde(default = "default_hip_roll_tau_max")]
    pub hip_roll: f64,
    #[serde(default = "default_hip_pitch_tau_max")]
    pub hip_pitch: f64,
    #[serde(default = "default_knee_tau_max")]
    pub knee: f64,
    #[serde(default = "default_ankle_tau_max")]
    pub ankle_pitch: f64,
}

fn default_hip_roll_tau_max() -> f64 {
    20.0
}
fn default_hip_pitch_tau_max() -> f64 {
    40.0
}
fn default_knee_tau_max() -> f64 {
    30.0
}
fn default_ankle_tau_max() -> f64 {
    25.0
}

impl Default for TorqueLimits {
    fn default() -> Self {
        Self {
            hip_roll: default_hip_roll_tau_max(),
            hip_pitch: default_hip_pitch_tau_max(),
            knee: default_knee_tau_max(),
            ankle_pitch: default_ankle_tau_max(),
        }
    }
}

impl TorqueLimits {
    fn validate(&self) -> Result<(), String> {
        for (name, v) in [
            ("limits.hip_roll", self.hip_roll),
            ("limits.hip_pitch", self.hip_pitch),
            ("limits.knee", self.knee),
            ("limits.ankle_pitch", self.ankle_pitch),
        ] {
            if !(v > 0.0 && v.is_finite()) {
                return Err(format!("{name} must be positive and finite, got {v}"));
            }
        }
        Ok(())
    }
}

// ─── Contact / Debounce ─────────────────────────────────────────────

/// Foot switch classification threshold and debounce bounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ContactConfig {
    /// Analog threshold [V]; readings below mean ground contact.
    #[serde(default = "default_foot_threshold")]
    pub threshold: f64,
    /// Counter bound beyond which contact latches on.
    #[serde(default = "default_set_count")]
    pub set_count: i32,
    /// Counter bound below which contact latches off.
    #[serde(default = "default_clear_count")]
    pub clear_count: i32,
}

fn default_foot_threshold() -> f64 {
    FOOT_SWITCH_THRESHOLD
}
fn default_set_count() -> i32 {
    CONTACT_SET_COUNT
}
fn default_clear_count() -> i32 {
    CONTACT_CLEAR_COUNT
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            threshold: default_foot_threshold(),
            set_count: default_set_count(),
            clear_count: default_clear_count(),
        }
    }
}

impl ContactConfig {
    fn validate(&self) -> Result<(), String> {
        if !(self.threshold > ANALOG_MIN && self.threshold < ANALOG_MAX) {
            return Err(format!(
                "contact.threshold {} outside analog range ({ANALOG_MIN}, {ANALOG_MAX})",
                self.threshold
            ));
        }
        if self.set_count <= 0 {
            return Err(format!("contact.set_count must be > 0, got {}", self.set_count));
        }
        if self.clear_count >= 0 {
            return Err(format!(
                "contact.clear_count must be < 0, got {}",
                self.clear_count
            ));
        }
        Ok(())
    }
}

// ─── Series-Elastic Ankles ──────────────────────────────────────────

/// Series-elastic ankle actuator parameters. The spring constants
/// differ per side because the physical springs do.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeaConfig {
    /// Left ankle spring constant [Nm/rad at the motor].
    #[serde(default = "default_k_spring_left")]
    pub k_spring_left: f64,
    /// Right ankle spring constant [Nm/rad at the motor].
    #[serde(default = "default_k_spring_right")]
    pub k_spring_right: f64,
    /// Spring lever transmission ratio between motor and joint.
    #[serde(default = "default_spring_ratio")]
    pub spring_ratio: f64,
}

fn default_k_spring_left() -> f64 {
    13046.0
}
fn default_k_spring_right() -> f64 {
    12445.0
}
fn default_spring_ratio() -> f64 {
    0.045
}

impl Default for SeaConfig {
    fn default() -> Self {
        Self {
            k_spring_left: default_k_spring_left(),
            k_spring_right: default_k_spring_right(),
            spring_ratio: default_spring_ratio(),
        }
    }
}

impl SeaConfig {
    fn validate(&self) -> Result<(), String> {
        if self.k_spring_left <= 0.0 || self.k_spring_right <= 0.0 {
            return Err("sea.k_spring_* must be positive".into());
        }
        if self.spring_ratio <= 0.0 {
            return Err("sea.spring_ratio must be positive".into());
        }
        Ok(())
    }

    /// Spring constant for one side.
    #[inline]
    pub fn k_spring(&self, leg_index: usize) -> f64 {
        if leg_index == 0 {
            self.k_spring_left
        } else {
            self.k_spring_right
        }
    }
}

// ─── Demo Oscillator ────────────────────────────────────────────────

/// Demo oscillator tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Oscillation amplitude [rad].
    #[serde(default = "default_demo_amplitude")]
    pub amplitude: f64,
    /// Oscillation frequency [Hz].
    #[serde(default = "default_demo_frequency")]
    pub frequency: f64,
}

fn default_demo_amplitude() -> f64 {
    0.1
}
fn default_demo_frequency() -> f64 {
    0.2
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            amplitude: default_demo_amplitude(),
            frequency: default_demo_frequency(),
        }
    }
}

// ─── Pendular Walker ────────────────────────────────────────────────

/// Heuristic pendular walker tuning. The leg center-of-mass angle is
/// approximated by the relative hip pitch angle throughout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PendularConfig {
    /// Desired body pitch [rad].
    pub q_d_pitch: f64,
    /// Minimum swing time before a touchdown can end the step [s].
    pub tmin_swing: f64,

    /// Hip roll hold target [rad] and reference speed [rad/s].
    pub q_d_hip_roll: f64,
    pub qd_d_hip_roll: f64,
    /// Hip roll servo gains.
    pub k_hip_roll: f64,
    pub b_hip_roll: f64,

    /// Swing/stance hip pitch servo gains.
    pub sw_k_hip: f64,
    pub sw_b_hip: f64,
    pub st_k_hip: f64,
    pub st_b_hip: f64,

    /// Duration of the leg extension trajectory [s].
    pub t_hip_extend: f64,
    /// Relative leg angle at full extension [rad].
    pub ext_rel_ang_com: f64,
    /// Retraction rate after extension [rad/s].
    pub ret_rel_omega_com: f64,
    /// Retraction angle cap [rad].
    pub ret_max_ang_com: f64,

    /// Swing knee target [rad], reference speed, and gains.
    pub sw_q_d_knee: f64,
    pub sw_qd_d_knee: f64,
    pub sw_k_knee: f64,
    pub sw_b_knee: f64,
    /// Stance knee target [rad], reference speed, and gains.
    pub st_q_d_knee: f64,
    pub st_qd_d_knee: f64,
    pub st_k_knee: f64,
    pub st_b_knee: f64,
    /// Knee retract / hold / extend segment durations [s].
    pub t_knee_retract: f64,
    pub t_knee_bent: f64,
    pub t_knee_extend: f64,

    /// Stance ankle target [rad], reference speed, and outer-loop gains.
    pub st_q_d_ankle: f64,
    pub st_qd_d_ankle: f64,
    pub st_k_ankle: f64,
    pub st_b_ankle: f64,
    /// Swing ankle target [rad], reference speed, and outer-loop gains.
    pub sw_q_d_ankle: f64,
    pub sw_qd_d_ankle: f64,
    pub sw_k_ankle: f64,
    pub sw_b_ankle: f64,
    /// Time into the step at which the swing ankle re-extends [s].
    pub t_ankle_bent: f64,

    /// Toe-off ankle target [rad] and gains.
    pub to_q_d_ankle: f64,
    pub to_k_ankle: f64,
    pub to_b_ankle: f64,
    /// Toe-off ankle feed-forward torque [Nm].
    pub to_ff_tau_ankle: f64,
    /// Minimum and maximum toe-off duration [s].
    pub tmin_toeoff: f64,
    pub tmax_toeoff: f64,

    /// Stance hip target during manual launch [rad].
    pub launch_q_d_hip: f64,
    /// Assumed initial leg separation at launch [rad].
    pub launch_rel_ang: f64,
}

impl Default for PendularConfig {
    fn default() -> Self {
        Self {
            q_d_pitch: 0.0,
            tmin_swing: 0.1,
            q_d_hip_roll: 0.0,
            qd_d_hip_roll: 1.0,
            k_hip_roll: 200.0,
            b_hip_roll: 10.0,
            sw_k_hip: 50.0,
            sw_b_hip: 1.0,
            st_k_hip: 50.0,
            st_b_hip: 1.0,
            t_hip_extend: 0.2,
            ext_rel_ang_com: -0.35,
            ret_rel_omega_com: 0.80,
            ret_max_ang_com: -0.32,
            sw_q_d_knee: 1.35,
            sw_qd_d_knee: 10.0,
            sw_k_knee: 20.0,
            sw_b_knee: 1.0,
            st_q_d_knee: 0.0,
            st_qd_d_knee: 4.0,
            st_k_knee: 40.0,
            st_b_knee: 1.0,
            t_knee_retract: 0.13,
            t_knee_bent: 0.05,
            t_knee_extend: 0.2,
            st_q_d_ankle: -0.14,
            st_qd_d_ankle: 0.20,
            st_k_ankle: 100.0,
            st_b_ankle: 5.0,
            sw_q_d_ankle: -0.09,
            sw_qd_d_ankle: 0.3,
            sw_k_ankle: 100.0,
            sw_b_ankle: 5.0,
            t_ankle_bent: 0.260,
            to_q_d_ankle: -0.34,
            to_k_ankle: 100.0,
            to_b_ankle: 5.0,
            to_ff_tau_ankle: 0.0,
            tmin_toeoff: 0.0,
            tmax_toeoff: 0.12,
            launch_q_d_hip: -0.20,
            launch_rel_ang: 0.3,
        }
    }
}

impl PendularConfig {
    fn validate(&self) -> Result<(), String> {
        for (name, v) in [
            ("pendular.t_hip_extend", self.t_hip_extend),
            ("pendular.t_knee_retract", self.t_knee_retract),
            ("pendular.t_knee_extend", self.t_knee_extend),
        ] {
            if v <= 0.0 {
                return Err(format!("{name} must be positive, got {v}"));
            }
        }
        if self.tmin_swing < 0.0 || self.tmin_toeoff < 0.0 {
            return Err("pendular minimum dwell times must be non-negative".into());
        }
        Ok(())
    }
}

// ─── Staged Walker ──────────────────────────────────────────────────

/// Staged walker tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkerConfig {
    /// Raw debounce count meaning "firmly on the ground".
    pub contact_count: i32,
    /// Lower raw count accepted when heel strike is imminent.
    pub contact_count_fast: i32,
    /// Raw debounce count meaning "firmly off the ground".
    pub release_count: i32,

    /// Minimum toe-off dwell before the leg roles swap [s].
    pub time_toe_off: f64,
    /// Relative hip swing amplitude [rad].
    pub hip_swing: f64,
    /// Forward leaning offset fed to the bisecting controller [rad].
    pub leaning: f64,
    /// Rate multiplier of the relative hip trajectory.
    pub hip_time_scale: f64,
    /// Rate multiplier of the early-swing knee trajectory.
    pub knee_swing_time_scale: f64,
    /// Rate multiplier of the late-swing knee extension.
    pub knee_stretch_time_scale: f64,
    /// Rate multiplier of the airborne recovery trajectories.
    pub recovery_time_scale: f64,
    /// Swing knee target during the step [rad].
    pub knee_swing: f64,
    /// Swing knee servo gains.
    pub swing_knee_kp: f64,
    pub swing_knee_kd: f64,
    /// Stance ankle push-off stiffness [Nm/rad].
    pub k_ankle: f64,
    /// Swing hip angle at which early swing ends [rad].
    pub early_swing_exit_angle: f64,

    /// Neutral posture targets [rad].
    pub hip_roll_pos: f64,
    pub hip_pitch_pos: f64,
    pub knee_pos: f64,
    pub ankle_pos: f64,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            contact_count: 20,
            contact_count_fast: 10,
            release_count: -50,
            time_toe_off: 0.0,
            hip_swing: 0.5,
            leaning: 0.06,
            hip_time_scale: 2.2,
            knee_swing_time_scale: 2.2,
            knee_stretch_time_scale: 3.0,
            recovery_time_scale: 2.0,
            knee_swing: 0.8,
            swing_knee_kp: 20.0,
            swing_knee_kd: 0.6,
            k_ankle: 40.0,
            early_swing_exit_angle: -0.05,
            hip_roll_pos: 0.0,
            hip_pitch_pos: 0.0,
            knee_pos: 0.1,
            ankle_pos: 0.0,
        }
    }
}

impl WalkerConfig {
    fn validate(&self) -> Result<(), String> {
        if self.contact_count <= 0 || self.contact_count_fast <= 0 {
            return Err("walker contact counts must be positive".into());
        }
        if self.release_count >= 0 {
            return Err(format!(
                "walker.release_count must be negative, got {}",
                self.release_count
            ));
        }
        if self.contact_count_fast > self.contact_count {
            return Err("walker.contact_count_fast must not exceed contact_count".into());
        }
        if self.time_toe_off < 0.0 {
            return Err("walker.time_toe_off must be non-negative".into());
        }
        for (name, v) in [
            ("walker.hip_time_scale", self.hip_time_scale),
            ("walker.knee_swing_time_scale", self.knee_swing_time_scale),
            ("walker.knee_stretch_time_scale", self.knee_stretch_time_scale),
            ("walker.recovery_time_scale", self.recovery_time_scale),
        ] {
            if v <= 0.0 {
                return Err(format!("{name} must be positive, got {v}"));
            }
        }
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
