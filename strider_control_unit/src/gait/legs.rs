//! Stance/swing leg role binding.
//!
//! Walking code reads more naturally in terms of "swing" and "stance"
//! than "left" and "right", while the roles swap every step. The
//! roles are bound by index into the blackboard's fixed per-leg
//! arrays, so swapping is a single flag flip and nothing dangles.

use strider_common::state::{Leg, RobotState};

/// Current assignment of the stance role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roles {
    stance: Leg,
}

impl Roles {
    pub fn new(stance: Leg) -> Self {
        Self { stance }
    }

    #[inline]
    pub fn stance(&self) -> Leg {
        self.stance
    }

    #[inline]
    pub fn swing(&self) -> Leg {
        self.stance.other()
    }

    /// Blackboard index of the stance leg.
    #[inline]
    pub fn st(&self) -> usize {
        self.stance.index()
    }

    /// Blackboard index of the swing leg.
    #[inline]
    pub fn sw(&self) -> usize {
        self.stance.other().index()
    }

    /// Swap stance and swing.
    pub fn swap(&mut self) {
        self.stance = self.stance.other();
    }

    /// Relative hip pitch angle, stance minus swing.
    #[inline]
    pub fn rel_hip_q(&self, s: &RobotState) -> f64 {
        s.q[self.st()].hip_pitch - s.q[self.sw()].hip_pitch
    }

    /// Relative hip pitch velocity, stance minus swing.
    #[inline]
    pub fn rel_hip_qd(&self, s: &RobotState) -> f64 {
        s.qd[self.st()].hip_pitch - s.qd[self.sw()].hip_pitch
    }

    /// Body pitch estimate assuming the stance foot is flat.
    #[inline]
    pub fn pitch(&self, s: &RobotState) -> f64 {
        let st = &s.q[self.st()];
        -st.ankle_pitch - st.knee - st.hip_pitch
    }

    /// Raw debounce counts (back, front) of the stance foot.
    #[inline]
    pub fn st_counts(&self, s: &RobotState) -> (i32, i32) {
        let foot = &s.foot[self.st()];
        (foot.back.count, foot.front.count)
    }

    /// Raw debounce counts (back, front) of the swing foot.
    #[inline]
    pub fn sw_counts(&self, s: &RobotState) -> (i32, i32) {
        let foot = &s.foot[self.sw()];
        (foot.back.count, foot.front.count)
    }

    /// Debounced contact (back, front) of the stance foot.
    #[inline]
    pub fn st_contact(&self, s: &RobotState) -> (bool, bool) {
        let foot = &s.foot[self.st()];
        (foot.back.contact, foot.front.contact)
    }

    /// Debounced contact (back, front) of the swing foot.
    #[inline]
    pub fn sw_contact(&self, s: &RobotState) -> (bool, bool) {
        let foot = &s.foot[self.sw()];
        (foot.back.contact, foot.front.contact)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_flips_roles() {
        let mut roles = Roles::new(Leg::Left);
        assert_eq!(roles.st(), 0);
        assert_eq!(roles.sw(), 1);
        roles.swap();
        assert_eq!(roles.stance(), Leg::Right);
        assert_eq!(roles.st(), 1);
        assert_eq!(roles.sw(), 0);
    }

    #[test]
    fn relative_hip_is_stance_minus_swing() {
        let mut s = RobotState::default();
        s.q[0].hip_pitch = 0.3;
        s.q[1].hip_pitch = -0.1;
        let roles = Roles::new(Leg::Left);
        assert!((roles.rel_hip_q(&s) - 0.4).abs() < 1e-12);
        let roles = Roles::new(Leg::Right);
        assert!((roles.rel_hip_q(&s) + 0.4).abs() < 1e-12);
    }

    #[test]
    fn pitch_uses_stance_chain() {
        let mut s = RobotState::default();
        s.q[1].ankle_pitch = 0.1;
        s.q[1].knee = 0.2;
        s.q[1].hip_pitch = -0.05;
        let roles = Roles::new(Leg::Right);
        assert!((roles.pitch(&s) + 0.25).abs() < 1e-12);
    }
}
