//! # Streaming telemetry
//!
//! Fire-and-forget diagnostics for the streaming engine: a per-tick CSV
//! archive of both channels' status under the session archive root, and an
//! end-of-run JSON report written through the session save thread. Archive
//! failures are logged and swallowed - telemetry must never block or abort
//! the control tick.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use serde::Serialize;

// Internal
use crate::mp_ctrl::{PairStatus, Phase, RunOutcome};
use util::archive::Archiver;
use util::session::{self, Session};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Per-tick channel status archiver.
pub struct StreamTelemetry {
    archiver: Archiver,
}

/// One archived row of channel status.
#[derive(Serialize)]
struct StatusRecord {
    time_s: f64,
    phase: String,

    left_staging: u32,
    left_execution: u32,
    left_underrun: bool,
    left_active_valid: bool,
    left_is_last: bool,

    right_staging: u32,
    right_execution: u32,
    right_underrun: bool,
    right_active_valid: bool,
    right_is_last: bool,
}

/// Summary of one finished run, saved as JSON next to the archives.
#[derive(Serialize)]
pub struct RunReport {
    pub maneuver: String,
    pub reverse: bool,
    pub outcome: Option<RunOutcome>,
    pub num_ticks: u64,
    pub num_underrun_ticks: u64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StreamTelemetry {
    /// Create the telemetry archive under the session archive root.
    pub fn new(session: &Session) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            archiver: Archiver::from_path(session, "mp_ctrl/channel_status.csv")?,
        })
    }

    /// Archive one tick's status snapshot.
    pub fn record(&mut self, phase: Phase, status: &PairStatus) {
        let record = StatusRecord {
            time_s: session::get_elapsed_seconds(),
            phase: format!("{:?}", phase),
            left_staging: status.left.staging_count,
            left_execution: status.left.execution_count,
            left_underrun: status.left.is_underrun,
            left_active_valid: status.left.active_point_valid,
            left_is_last: status.left.is_last,
            right_staging: status.right.staging_count,
            right_execution: status.right.execution_count,
            right_underrun: status.right.is_underrun,
            right_active_valid: status.right.active_point_valid,
            right_is_last: status.right.is_last,
        };

        if let Err(e) = self.archiver.serialise(record) {
            warn!("Could not archive channel status: {}", e);
        }
    }
}

impl RunReport {
    /// Queue the report for saving in the session's background thread.
    pub fn save(self) {
        session::save("run_report.json", self);
    }
}
