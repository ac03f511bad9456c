//! STRIDER Common Library
//!
//! Shared types and definitions for the STRIDER biped workspace:
//! the per-tick sensor/actuator blackboard, pushbutton and motor
//! bitmasks, TOML configuration with validation, error types, and the
//! versioned telemetry snapshot format consumed by the remote console
//! and trajectory recorder.
//!
//! # Module Structure
//!
//! - [`consts`] - System-wide constants
//! - [`state`] - RobotState blackboard and joint/leg identifiers
//! - [`config`] - Configuration structs and validation
//! - [`error`] - Error types
//! - [`telemetry`] - Versioned state snapshot codec

pub mod config;
pub mod consts;
pub mod error;
pub mod state;
pub mod telemetry;
