//! System-wide constants for the STRIDER workspace.
//!
//! Single source of truth for numeric limits and defaults.
//! Imported by all crates — no duplication permitted.

/// Number of legs.
pub const NUM_LEGS: usize = 2;

/// Number of actuated joints: hip roll + per leg (hip pitch, knee, ankle pitch).
pub const NUM_ACTUATED_JOINTS: usize = 7;

/// Number of foot pressure switches (front + back per foot).
pub const NUM_FOOT_SWITCHES: usize = 4;

/// Default control cycle time in microseconds (1 kHz = 1000 µs).
pub const DEFAULT_CYCLE_TIME_US: u32 = 1000;

/// Default foot switch analog threshold [V]. Switches are normally
/// open, pulled up to the rail off the ground, so a reading below the
/// threshold means ground contact.
pub const FOOT_SWITCH_THRESHOLD: f64 = 2.5;

/// Default debounce counter bound for latching contact on.
pub const CONTACT_SET_COUNT: i32 = 3;

/// Default debounce counter bound for latching contact off.
pub const CONTACT_CLEAR_COUNT: i32 = -3;

/// Maximum transition events recorded per tick for telemetry.
pub const MAX_TRANSITION_EVENTS: usize = 8;

/// Maximum analog sensor reading accepted before clamping [V].
pub const ANALOG_MAX: f64 = 10.0;

/// Minimum analog sensor reading accepted before clamping [V].
pub const ANALOG_MIN: f64 = -10.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert_eq!(NUM_LEGS, 2);
        assert_eq!(NUM_FOOT_SWITCHES, 2 * NUM_LEGS);
        assert!(DEFAULT_CYCLE_TIME_US > 0);
        assert!(CONTACT_SET_COUNT > 0);
        assert!(CONTACT_CLEAR_COUNT < 0);
        assert!(ANALOG_MIN < ANALOG_MAX);
    }
}
