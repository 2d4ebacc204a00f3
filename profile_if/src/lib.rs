//! # Profile interface crate.
//!
//! Provides the trajectory and motor-controller channel interfaces shared
//! between the offline trajectory compiler and the online streaming engine.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Motor-controller channel driver interface
pub mod chan;

/// Trajectory data model and artifact persistence
pub mod traj;
