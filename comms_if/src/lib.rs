//! # Communications interface crate.
//!
//! Provides every message crossing the boundary of the longitudinal planner:
//! the snapshots supplied by external collaborators each cycle, the plan
//! published for the actuator controller, and the scenario commands used to
//! drive replays.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Ego vehicle state, driver setpoint and controller state
pub mod car;

/// Lead tracks and radar health
pub mod radar;

/// Map derived speed limits and curvature
pub mod map;

/// The published longitudinal plan and MPC diagnostics
pub mod plan;

/// Scenario commands for replaying the planner
pub mod scenario;
