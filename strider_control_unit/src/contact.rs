//! Hysteretic foot contact debouncing.
//!
//! Raw foot switch readings chatter near the threshold during heel
//! strike and toe off. A signed counter accumulates consecutive
//! agreeing classifications, resetting through zero on disagreement,
//! and the boolean contact state only latches once the counter passes
//! a bound: above `set_count` it latches on, below `clear_count` it
//! latches off, and in between it holds its previous value.
//!
//! Gait controllers that need more certainty than the latch offers
//! (for example, "firmly planted for 20 ticks") read the raw counter
//! directly.

use strider_common::state::{FootSwitch, RobotState};

/// Advance one switch's debounce state by one tick. The raw reading
/// must already be stored in `sw.input`.
pub fn debounce(sw: &mut FootSwitch) {
    let on_floor = sw.input < sw.threshold;

    if on_floor {
        if sw.count > 0 {
            sw.count = sw.count.saturating_add(1);
        } else {
            // Disagreement with a negative streak restarts at 1.
            sw.count = 1;
        }
    } else if sw.count <= 0 {
        sw.count = sw.count.saturating_sub(1);
    } else {
        // Disagreement with a positive streak resets to 0 first; a
        // single bad sample never swings the counter negative.
        sw.count = 0;
    }

    if sw.count > sw.set_count {
        sw.contact = true;
    } else if sw.count < sw.clear_count {
        sw.contact = false;
    }
    // Otherwise the latch holds.
}

/// Debounce all four switches on the blackboard.
pub fn debounce_all(s: &mut RobotState) {
    for foot in &mut s.foot {
        debounce(&mut foot.back);
        debounce(&mut foot.front);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
