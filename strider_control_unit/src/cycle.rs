//! Deterministic control cycle: read → condition → control → write.
//!
//! One tick, strictly ordered: sensor read, analog clamping and foot
//! switch debounce, gait update, joint-law evaluation, torque clamp
//! and power mask, actuator write, throttled telemetry. The loop is
//! single-threaded and allocation-free once running; on robot
//! hardware (`rt` feature) it paces with
//! `clock_nanosleep(TIMER_ABSTIME)` under SCHED_FIFO, in simulation
//! it paces with `std::thread::sleep`.
//!
//! RT setup sequence, done once before the loop:
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`
//! 2. prefault stack pages
//! 3. `sched_setaffinity` onto the isolated core
//! 4. `sched_setscheduler(SCHED_FIFO)`
//!
//! Shutdown is cooperative: an external flag (wired to SIGINT by the
//! binary) makes the next tick run the controller's crash path and
//! write one final all-zero torque frame, never a mid-tick abort.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, info, warn};

use strider_common::config::CoreConfig;
use strider_common::consts::{ANALOG_MAX, ANALOG_MIN};
use strider_common::state::RobotState;
use strider_common::telemetry::{ControllerSnapshot, Snapshot, TickTiming};

use crate::contact;
use crate::control::Joints;
use crate::gait::{self, GaitController, TransitionLog};
use crate::safety;

// ─── Collaborator Seams ─────────────────────────────────────────────

/// Inbound sensor boundary. Implementations fill the measurement
/// fields of the blackboard (angles, velocities, switch voltages,
/// battery rails, buttons, fault mask); time and torque commands
/// belong to the driver.
pub trait SensorSource {
    fn read_into(&mut self, s: &mut RobotState) -> Result<(), CycleError>;
}

/// Outbound actuator boundary, handed the blackboard after the
/// safety gates have run.
pub trait ActuatorSink {
    fn write_from(&mut self, s: &RobotState) -> Result<(), CycleError>;
}

/// Telemetry boundary. Publication is throttled by the driver;
/// implementations must not block the tick.
pub trait TelemetrySink {
    fn publish(&mut self, snapshot: &Snapshot);
}

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-tick timing statistics, updated without allocation.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total ticks executed.
    pub tick_count: u64,
    /// Last tick busy time [ns].
    pub last_ns: i64,
    /// Minimum tick busy time [ns].
    pub min_ns: i64,
    /// Maximum tick busy time [ns].
    pub max_ns: i64,
    /// Running sum for the average.
    pub sum_ns: i64,
    /// Ticks whose busy time exceeded the cycle budget.
    pub overruns: u64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            tick_count: 0,
            last_ns: 0,
            min_ns: i64::MAX,
            max_ns: 0,
            sum_ns: 0,
            overruns: 0,
        }
    }

    #[inline]
    pub fn record(&mut self, duration_ns: i64) {
        self.tick_count += 1;
        self.last_ns = duration_ns;
        if duration_ns < self.min_ns {
            self.min_ns = duration_ns;
        }
        if duration_ns > self.max_ns {
            self.max_ns = duration_ns;
        }
        self.sum_ns += duration_ns;
    }

    /// Average tick busy time [ns]; 0 before the first tick.
    #[inline]
    pub fn avg_ns(&self) -> i64 {
        if self.tick_count == 0 {
            0
        } else {
            self.sum_ns / self.tick_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Errors ─────────────────────────────────────────────────────────

/// Errors at the cycle boundaries. The control logic between the
/// boundaries is total and cannot fail.
#[derive(Debug)]
pub enum CycleError {
    /// RT system call failed during setup.
    RtSetup(String),
    /// The sensor source failed to produce a reading.
    Sensor(String),
    /// The actuator sink rejected a command frame.
    Actuator(String),
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RtSetup(msg) => write!(f, "RT setup error: {msg}"),
            Self::Sensor(msg) => write!(f, "sensor error: {msg}"),
            Self::Actuator(msg) => write!(f, "actuator error: {msg}"),
        }
    }
}

impl std::error::Error for CycleError {}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Lock all current and future pages so the loop never page-faults.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch a large stack buffer so its pages are resident before the
/// loop starts.
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

/// Pin the current thread to the isolated CPU core.
#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

/// Switch to SCHED_FIFO at the given priority.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Full RT setup. All calls are no-ops without the `rt` feature.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Cycle Driver ───────────────────────────────────────────────────

/// Owns the blackboard, the joint laws, the active gait controller
/// and the collaborator seams, and drives them once per tick.
pub struct CycleRunner<S, A, T> {
    cfg: CoreConfig,
    sensors: S,
    actuators: A,
    telemetry: T,
    state: RobotState,
    joints: Joints,
    controller: Box<dyn GaitController + Send>,
    log: TransitionLog,
    stats: CycleStats,
    tick: u64,
    cycle_time_ns: i64,
    shutdown: Arc<AtomicBool>,
}

impl<S: SensorSource, A: ActuatorSink, T: TelemetrySink> CycleRunner<S, A, T> {
    pub fn new(cfg: CoreConfig, sensors: S, actuators: A, telemetry: T) -> Self {
        let mut state = RobotState::default();
        state.dt = cfg.dt();
        for foot in state.foot.iter_mut() {
            for sw in [&mut foot.back, &mut foot.front] {
                sw.threshold = cfg.contact.threshold;
                sw.set_count = cfg.contact.set_count;
                sw.clear_count = cfg.contact.clear_count;
            }
        }
        let joints = Joints::new(&cfg.sea);
        let controller = gait::build(&cfg);
        let cycle_time_ns = cfg.cycle_time_us as i64 * 1000;
        info!(
            controller = controller.name(),
            cycle_time_us = cfg.cycle_time_us,
            "cycle runner ready"
        );
        Self {
            cfg,
            sensors,
            actuators,
            telemetry,
            state,
            joints,
            controller,
            log: TransitionLog::default(),
            stats: CycleStats::new(),
            tick: 0,
            cycle_time_ns,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that requests a clean shutdown at the next tick boundary.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn state(&self) -> &RobotState {
        &self.state
    }

    pub fn controller(&self) -> &dyn GaitController {
        &*self.controller
    }

    /// Run ticks until the shutdown flag is raised, then run the
    /// crash path once and write a final zero-torque frame.
    pub fn run(&mut self) -> Result<(), CycleError> {
        #[cfg(feature = "rt")]
        {
            self.run_rt_loop()
        }
        #[cfg(not(feature = "rt"))]
        {
            self.run_sim_loop()
        }
    }

    /// Absolute-time paced loop on CLOCK_MONOTONIC, drift-free.
    #[cfg(feature = "rt")]
    fn run_rt_loop(&mut self) -> Result<(), CycleError> {
        use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

        let clock = ClockId::CLOCK_MONOTONIC;
        let mut next_wake = clock_gettime(clock)
            .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return self.shutdown_tick();
            }

            next_wake = timespec_add_ns(next_wake, self.cycle_time_ns);
            self.step()?;
            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);
        }
    }

    /// Approximate pacing with `std::thread::sleep`.
    #[cfg(not(feature = "rt"))]
    fn run_sim_loop(&mut self) -> Result<(), CycleError> {
        let budget = std::time::Duration::from_nanos(self.cycle_time_ns as u64);

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return self.shutdown_tick();
            }

            let start = Instant::now();
            self.step()?;
            if let Some(remaining) = budget.checked_sub(start.elapsed()) {
                std::thread::sleep(remaining);
            }
        }
    }

    /// Execute one tick of the seven-step cycle body.
    pub fn step(&mut self) -> Result<(), CycleError> {
        let start = Instant::now();

        // 1. Sensors.
        self.sensors.read_into(&mut self.state)?;
        let sensor_ns = start.elapsed().as_nanos() as i64;

        // 2. Conditioning: analog clamp, then debounce.
        self.condition_sensors();

        // 3-4. Gait update, then the joint laws. The gait layer may
        // write torques directly; laws in the off mode leave those
        // untouched.
        self.state.zero_torques();
        self.controller
            .tick(&mut self.state, &mut self.joints, &mut self.log);
        self.joints.apply(&mut self.state);

        // 5. Safety gates.
        let clamped = safety::clamp_torques(&mut self.state, &self.cfg.limits);
        if clamped > 0 {
            debug!(clamped, tick = self.tick, "torque commands saturated");
        }
        safety::apply_power_mask(&mut self.state);

        // 6. Actuators.
        self.actuators.write_from(&self.state)?;

        // 7. Throttled telemetry.
        self.tick += 1;
        if self.tick % self.cfg.telemetry_interval as u64 == 0 {
            let busy_ns = start.elapsed().as_nanos() as i64;
            let timing = TickTiming {
                sensor_us: (sensor_ns / 1000) as u32,
                total_us: (busy_ns / 1000) as u32,
                overruns: self.stats.overruns,
            };
            let controller = self.controller_snapshot();
            let snapshot = Snapshot::capture(self.tick, &self.state, controller, timing);
            self.telemetry.publish(&snapshot);
        }

        let busy_ns = start.elapsed().as_nanos() as i64;
        self.stats.record(busy_ns);
        if busy_ns > self.cycle_time_ns {
            self.stats.overruns += 1;
            warn!(
                busy_ns,
                budget_ns = self.cycle_time_ns,
                tick = self.tick,
                "cycle overrun"
            );
        }

        self.state.t += self.state.dt;
        Ok(())
    }

    /// Final tick on shutdown: force the crash path, gate, write.
    fn shutdown_tick(&mut self) -> Result<(), CycleError> {
        info!(tick = self.tick, "shutdown requested, disabling motors");
        self.controller
            .force_crash(&mut self.state, &mut self.joints, &mut self.log);
        safety::apply_power_mask(&mut self.state);
        self.actuators.write_from(&self.state)?;
        Ok(())
    }

    /// Clamp analog channels into the converter range, then debounce
    /// the foot switches.
    fn condition_sensors(&mut self) {
        let s = &mut self.state;
        let mut clamped = 0usize;
        let mut clamp = |v: &mut f64| {
            let bounded = v.clamp(ANALOG_MIN, ANALOG_MAX);
            if bounded != *v {
                *v = bounded;
                clamped += 1;
            }
        };

        for foot in s.foot.iter_mut() {
            clamp(&mut foot.back.input);
            clamp(&mut foot.front.input);
        }
        clamp(&mut s.battery.motor_unswitched);
        clamp(&mut s.battery.motor_switched);
        clamp(&mut s.battery.computer_unswitched);
        clamp(&mut s.battery.computer_switched);

        if clamped > 0 {
            warn!(clamped, tick = self.tick, "analog readings out of range");
        }

        contact::debounce_all(s);
    }

    fn controller_snapshot(&mut self) -> ControllerSnapshot {
        ControllerSnapshot {
            state_id: self.controller.state_id(),
            elapsed: self.controller.state_elapsed(self.state.t),
            stance_leg: self.controller.stance_leg().index() as u8,
            transitions: self.log.drain(),
        }
    }
}

// ─── Time Helpers ───────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let mut secs = ts.tv_sec();
    let mut nanos = ts.tv_nsec() + ns;
    while nanos >= 1_000_000_000 {
        secs += 1;
        nanos -= 1_000_000_000;
    }
    TimeSpec::new(secs, nanos)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use strider_common::state::{MotorMask, PanelButtons};

    /// Sensor source replaying a canned sequence of switch voltages.
    /// Channels it does not script are left as the driver last wrote
    /// them.
    struct ScriptedSensors {
        /// (tick, all-switch voltage, buttons) rows, in order.
        script: Vec<(u64, f64, PanelButtons)>,
        tick: u64,
    }

    impl ScriptedSensors {
        fn new(script: Vec<(u64, f64, PanelButtons)>) -> Self {
            Self { script, tick: 0 }
        }
    }

    impl SensorSource for ScriptedSensors {
        fn read_into(&mut self, s: &mut RobotState) -> Result<(), CycleError> {
            for (at, volts, buttons) in &self.script {
                if *at == self.tick {
                    for foot in s.foot.iter_mut() {
                        foot.back.input = *volts;
                        foot.front.input = *volts;
                    }
                    s.buttons = *buttons;
                }
            }
            self.tick += 1;
            Ok(())
        }
    }

    /// Actuator sink recording every written torque frame.
    #[derive(Default)]
    struct RecordingSink {
        frames: Vec<[f64; 7]>,
    }

    impl ActuatorSink for &mut RecordingSink {
        fn write_from(&mut self, s: &RobotState) -> Result<(), CycleError> {
            self.frames.push([
                s.hip_roll_tau,
                s.tau[0].hip_pitch,
                s.tau[0].knee,
                s.tau[0].ankle_pitch,
                s.tau[1].hip_pitch,
                s.tau[1].knee,
                s.tau[1].ankle_pitch,
            ]);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CollectingTelemetry {
        snapshots: Vec<Snapshot>,
    }

    impl TelemetrySink for &mut CollectingTelemetry {
        fn publish(&mut self, snapshot: &Snapshot) {
            self.snapshots.push(snapshot.clone());
        }
    }

    fn runner<'a>(
        cfg: CoreConfig,
        sink: &'a mut RecordingSink,
        tel: &'a mut CollectingTelemetry,
    ) -> CycleRunner<ScriptedSensors, &'a mut RecordingSink, &'a mut CollectingTelemetry> {
        // Ground contact (0 V) from the start, no buttons.
        let sensors = ScriptedSensors::new(vec![(0, 0.0, PanelButtons::empty())]);
        CycleRunner::new(cfg, sensors, sink, tel)
    }

    #[test]
    fn contact_config_seeds_every_foot_switch() {
        let mut cfg = CoreConfig::default();
        cfg.contact.threshold = 2.5;
        cfg.contact.set_count = 7;
        cfg.contact.clear_count = -3;
        let mut sink = RecordingSink::default();
        let mut tel = CollectingTelemetry::default();
        let r = runner(cfg, &mut sink, &mut tel);
        for foot in &r.state().foot {
            for sw in [&foot.back, &foot.front] {
                assert_eq!(sw.threshold, 2.5);
                assert_eq!(sw.set_count, 7);
                assert_eq!(sw.clear_count, -3);
            }
        }
    }

    #[test]
    fn time_advances_by_dt_each_tick() {
        let mut sink = RecordingSink::default();
        let mut tel = CollectingTelemetry::default();
        let mut r = runner(CoreConfig::default(), &mut sink, &mut tel);
        for _ in 0..5 {
            r.step().unwrap();
        }
        assert!((r.state().t - 5.0 * r.state().dt).abs() < 1e-12);
        assert_eq!(r.stats().tick_count, 5);
    }

    #[test]
    fn telemetry_is_throttled_to_interval() {
        let mut cfg = CoreConfig::default();
        cfg.telemetry_interval = 10;
        let mut sink = RecordingSink::default();
        let mut tel = CollectingTelemetry::default();
        let mut r = runner(cfg, &mut sink, &mut tel);
        for _ in 0..25 {
            r.step().unwrap();
        }
        drop(r);
        assert_eq!(tel.snapshots.len(), 2);
        assert_eq!(tel.snapshots[0].tick, 10);
        assert_eq!(tel.snapshots[1].tick, 20);
    }

    #[test]
    fn written_torques_respect_limits() {
        let mut sink = RecordingSink::default();
        let mut tel = CollectingTelemetry::default();
        let cfg = CoreConfig::default();
        let limits = cfg.limits;
        let mut r = runner(cfg, &mut sink, &mut tel);
        for _ in 0..200 {
            r.step().unwrap();
        }
        drop(r);
        let max = [
            limits.hip_roll,
            limits.hip_pitch,
            limits.knee,
            limits.ankle_pitch,
            limits.hip_pitch,
            limits.knee,
            limits.ankle_pitch,
        ];
        for frame in &sink.frames {
            for (tau, bound) in frame.iter().zip(max) {
                assert!(tau.abs() <= bound + 1e-12);
            }
        }
    }

    #[test]
    fn out_of_range_analog_is_clamped_before_debounce() {
        let mut sink = RecordingSink::default();
        let mut tel = CollectingTelemetry::default();
        let sensors = ScriptedSensors::new(vec![(0, -500.0, PanelButtons::empty())]);
        let mut r = CycleRunner::new(CoreConfig::default(), sensors, &mut sink, &mut tel);
        r.step().unwrap();
        for foot in r.state().foot.iter() {
            assert_eq!(foot.back.input, ANALOG_MIN);
            assert_eq!(foot.front.input, ANALOG_MIN);
        }
    }

    #[test]
    fn shutdown_tick_writes_unpowered_zero_frame() {
        let mut sink = RecordingSink::default();
        let mut tel = CollectingTelemetry::default();
        let mut r = runner(CoreConfig::default(), &mut sink, &mut tel);
        for _ in 0..3 {
            r.step().unwrap();
        }
        r.shutdown_handle().store(true, Ordering::Relaxed);
        r.run().unwrap();
        assert!(r.controller().crashed());
        assert_eq!(r.state().powered, MotorMask::empty());
        drop(r);
        let last = sink.frames.last().unwrap();
        assert!(last.iter().all(|tau| *tau == 0.0));
    }
}
