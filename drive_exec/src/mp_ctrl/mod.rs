//! # Motion profile control module
//!
//! The synchronized dual-buffer streaming engine. An `MpCtrl` owns the two
//! motor-controller channels of the drive, loads a compiled trajectory into
//! their staging buffers, paces the staging-to-execution refill with a
//! periodic notifier, supervises for stalls and underruns, and declares the
//! run finished only once both channels report their final point.
//!
//! The caller contract is `start` once per maneuver, `control` every tick
//! until `is_finished`, then `stop` exactly once. Runtime device failures
//! are absorbed into the state machine and surface only through the
//! [`RunOutcome`] of the finished run.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod pair;
mod params;
mod sim;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use pair::*;
pub use params::*;
pub use sim::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors raised when misusing the streaming controller.
///
/// These are caller errors which fail fast before any channel buffer is
/// touched. Runtime device failures are never returned here: they abort the
/// run internally and show up as the run's [`RunOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum MpCtrlError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(#[from] util::params::LoadError),

    #[error("Attempted to start a run while one is already active")]
    RunAlreadyActive,

    #[error("The artifact's sample duration is zero, cannot derive a stream rate")]
    ZeroSampleDuration,
}
