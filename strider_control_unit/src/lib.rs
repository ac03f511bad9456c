//! STRIDER locomotion control core.
//!
//! A fixed-cycle controller for a planar biped with rigid hips and
//! knees and series-elastic ankles. Each tick the cycle driver reads
//! sensors, debounces foot contact, steps the active gait state
//! machine, evaluates the per-joint control laws, applies safety
//! limits, and writes actuator commands.

pub mod config;
pub mod contact;
pub mod control;
pub mod cycle;
pub mod gait;
pub mod safety;
