//! # Drive executable library
//!
//! Online half of the Castor drive software: loads compiled trajectory
//! artifacts and streams them into the two motor-controller channels of the
//! differential drive, keeping both sides in lockstep until the final point
//! is reached on each.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod mp_ctrl;
pub mod path_follow;
pub mod telemetry;
