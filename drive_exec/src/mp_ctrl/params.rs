//! Motion profile control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use profile_if::chan::Side;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Tunable parameters of the streaming controller.
///
/// The stall budget and sync point count in particular are deliberately
/// configuration rather than constants: the right values depend on the
/// control tick rate and the measured startup latency of the controllers.
#[derive(Clone, Debug, Deserialize)]
pub struct Params {
    /// Number of zero-motion points prepended to the sync channel to soak up
    /// the systematic startup latency between the two controllers
    pub sync_point_count: u32,

    /// Which channel receives the sync points. Never both: padding both
    /// sides would double the offset instead of cancelling it.
    pub sync_side: Side,

    /// Execution-buffer occupancy both channels must exceed before
    /// closed-loop output is enabled
    pub min_buffered_points: u32,

    /// Execution-buffer occupancy above which the refill task stops
    /// transferring points
    pub execution_buffer_cap: u32,

    /// Number of control ticks without forward progress before the run is
    /// declared stalled and aborted
    pub stall_budget_ticks: u32,
}
