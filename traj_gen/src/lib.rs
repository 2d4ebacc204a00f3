//! # Trajectory generation library
//!
//! Offline compiler turning a geometric path definition into the two
//! device-unit wheel trajectories of a differential drive maneuver. The
//! pipeline is:
//!
//! ```text
//! waypoints -> spline generator -> wheelbase split -> device units
//! ```
//!
//! The output artifact is persisted through `profile_if::traj` and consumed
//! at runtime by the streaming engine in `drive_exec`.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod compile;
pub mod feed_forward;
pub mod params;
pub mod path_def;
pub mod spline;
pub mod tank_split;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use compile::*;
pub use params::*;
pub use path_def::*;
