//! Lockstep channel pair
//!
//! The left and right channels are always driven through this pair so the
//! streaming logic is written once and cannot act on one side alone.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;

// Internal
use profile_if::chan::{ChannelError, ChannelStatus, ProfileChannel, Side};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The two channels of the differential drive.
pub struct ChannelPair<C: ProfileChannel> {
    pub left: C,
    pub right: C,
}

/// Status of both channels, fetched together once per control tick.
///
/// All decisions within a tick are made against one `PairStatus` so the two
/// sides can never be judged against snapshots from different instants.
#[derive(Clone, Copy, Debug)]
pub struct PairStatus {
    pub left: ChannelStatus,
    pub right: ChannelStatus,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<C: ProfileChannel> ChannelPair<C> {
    /// The channel actuating the given side.
    pub fn get_mut(&mut self, side: Side) -> &mut C {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// Apply a fallible device operation to both channels, left first.
    pub fn try_for_each<F>(&mut self, mut func: F) -> Result<(), ChannelError>
    where
        F: FnMut(&mut C) -> Result<(), ChannelError>,
    {
        func(&mut self.left)?;
        func(&mut self.right)
    }

    /// Fetch the per-tick status snapshot of both channels.
    pub fn statuses(&mut self) -> Result<PairStatus, ChannelError> {
        Ok(PairStatus {
            left: self.left.status()?,
            right: self.right.status()?,
        })
    }
}

impl PairStatus {
    /// True when both execution buffers hold more than `min` points.
    pub fn both_buffered_above(&self, min: u32) -> bool {
        self.left.execution_count > min && self.right.execution_count > min
    }

    /// True when either execution buffer is currently starved.
    pub fn any_underrun(&self) -> bool {
        self.left.is_underrun || self.right.is_underrun
    }

    /// True when both channels hold a valid active point flagged as the last
    /// of the sequence - the completion condition of a run.
    pub fn both_at_last_point(&self) -> bool {
        self.left.active_point_valid
            && self.left.is_last
            && self.right.active_point_valid
            && self.right.is_last
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// One refill pass: transfer staged points towards the execution buffers.
///
/// Runs on the notifier thread at twice the sample rate. Points move only
/// when both execution buffers are below the cap, so neither channel's
/// feed advances without the other. Device errors are logged and left for
/// the stall supervision to act on.
pub fn refill_pass<C: ProfileChannel>(pair: &mut ChannelPair<C>, execution_buffer_cap: u32) {
    let left = match pair.left.status() {
        Ok(s) => s,
        Err(e) => {
            warn!("Refill status read failed: {}", e);
            return;
        }
    };
    let right = match pair.right.status() {
        Ok(s) => s,
        Err(e) => {
            warn!("Refill status read failed: {}", e);
            return;
        }
    };

    if left.execution_count < execution_buffer_cap && right.execution_count < execution_buffer_cap
    {
        if let Err(e) = pair.try_for_each(|chan| chan.process_buffer()) {
            warn!("Refill buffer transfer failed: {}", e);
        }
    }
}
