//! # Longitudinal planning library.
//!
//! This library allows other crates in the workspace (and the integration tests and benchmarks)
//! to access the planner core defined inside the exec crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Longitudinal MPC wrapper - tracks the lead, picks a following time-gap and drives the solver
pub mod long_mpc;

/// Longitudinal planner - fuses limits, smooths the cruise profile and arbitrates the solutions
pub mod long_plan;

/// Simulated world the scenario replay runs the planner against
pub mod world;
