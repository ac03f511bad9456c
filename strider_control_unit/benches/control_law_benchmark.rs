//! Control-law micro-benchmark.
//!
//! Measures throughput of the per-joint laws and of a full gait tick,
//! the hot path that must fit the 1 kHz cycle budget.

use criterion::{Criterion, criterion_group, criterion_main};

use strider_common::config::{CoreConfig, SeaConfig};
use strider_common::state::RobotState;
use strider_control_unit::contact;
use strider_control_unit::control::Joints;
use strider_control_unit::control::rigid::RigidJoint;
use strider_control_unit::control::sea::SeaJoint;
use strider_control_unit::control::spline;
use strider_control_unit::gait::{self, TransitionLog};

const DT: f64 = 0.001; // 1 kHz

fn bench_rigid_qdpd(c: &mut Criterion) {
    let mut joint = RigidJoint::default();
    joint.set_qdpd(120.0, 2.0, 0.5, 1.0, 0.0);
    let mut cycle = 0u64;

    c.bench_function("rigid_qdpd_control", |b| {
        b.iter(|| {
            cycle += 1;
            let t = cycle as f64 * DT;
            let q = 0.4 * t.sin();
            let qd = 0.4 * t.cos();
            joint.control(q, qd, DT)
        });
    });
}

fn bench_sea_position_law(c: &mut Criterion) {
    let sea = SeaConfig::default();
    let mut joint = SeaJoint::new(sea.k_spring(0), sea.spring_ratio);
    joint.set_position_pd(120.0, 2.0, -0.4, 0.0, 4.0, 0.1);
    let mut cycle = 0u64;

    c.bench_function("sea_position_control", |b| {
        b.iter(|| {
            cycle += 1;
            let t = cycle as f64 * DT;
            let q_joint = 0.2 * t.sin();
            let qd_joint = 0.2 * t.cos();
            let q_motor = q_joint + 0.01 * t.sin();
            joint.control(q_motor, 0.0, q_joint, qd_joint, DT)
        });
    });
}

fn bench_quintic_spline(c: &mut Criterion) {
    let mut cycle = 0u64;

    c.bench_function("quintic_eval", |b| {
        b.iter(|| {
            cycle += 1;
            let t = (cycle % 1000) as f64 * DT;
            spline::quintic(t, 0.1, 0.0, 0.0, 0.8, 0.0, 0.0)
        });
    });
}

fn bench_debounce(c: &mut Criterion) {
    let mut s = RobotState::default();
    let mut cycle = 0u64;

    c.bench_function("debounce_all", |b| {
        b.iter(|| {
            cycle += 1;
            // Alternate contact every 7 ticks so the counters move.
            let volts = if (cycle / 7) % 2 == 0 { 0.0 } else { 5.0 };
            for foot in s.foot.iter_mut() {
                foot.back.input = volts;
                foot.front.input = volts;
            }
            contact::debounce_all(&mut s);
        });
    });
}

fn bench_full_walker_tick(c: &mut Criterion) {
    let cfg = CoreConfig::default();
    let mut controller = gait::build(&cfg);
    let mut s = RobotState::default();
    s.dt = DT;
    let mut joints = Joints::new(&cfg.sea);
    let mut log = TransitionLog::default();

    // Both feet planted so the controller settles into standing.
    for foot in s.foot.iter_mut() {
        foot.back.count = 25;
        foot.front.count = 25;
        foot.back.contact = true;
        foot.front.contact = true;
    }

    c.bench_function("walker_tick_and_laws", |b| {
        b.iter(|| {
            s.zero_torques();
            controller.tick(&mut s, &mut joints, &mut log);
            joints.apply(&mut s);
            log.drain();
            s.t += DT;
        });
    });
}

criterion_group!(
    benches,
    bench_rigid_qdpd,
    bench_sea_position_law,
    bench_quintic_spline,
    bench_debounce,
    bench_full_walker_tick,
);
criterion_main!(benches);
