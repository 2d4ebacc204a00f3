//! # Motor-controller channel driver interface
//!
//! One `ProfileChannel` is the streaming engine's view of one closed-loop
//! motor controller: a staging buffer points are pushed into, an execution
//! buffer the device consumes at the sample rate, and a status record read
//! back over the control bus. All calls are synchronous bounded-latency
//! device transactions.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use crate::traj::TrajectorySample;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// One side of the differential drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// Output mode of a channel's closed-loop controller.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum OutputMode {
    /// Closed-loop output off, motor coasting
    Disabled,

    /// Closed-loop profile execution enabled
    Enabled,

    /// Direct open-loop demand in the range [-1, +1]
    PercentOutput(f64),
}

/// Possible errors raised by a channel driver.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// A control-bus transaction failed. Fatal to the current run.
    #[error("{side:?} channel bus transaction failed: {reason}")]
    BusError { side: Side, reason: String },

    /// The staging buffer cannot accept another point.
    #[error("{side:?} channel staging buffer is full")]
    StagingFull { side: Side },
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One point pushed into a channel's staging buffer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    /// Target wheel position in encoder ticks
    pub position_ticks: i32,

    /// Feed-forward term in volts
    pub feed_forward_v: f64,

    /// Target heading in IMU heading ticks
    pub heading_ticks: f64,

    /// Time the device holds this point
    pub duration_ms: u32,

    /// Marks the final point of the sequence, the completion signal
    pub is_last: bool,

    /// Zeroes the controller's position reference when this point activates
    pub zero_pos: bool,
}

/// Status snapshot read back from a channel once per control tick.
///
/// This is an immutable value: every tick fetches a fresh snapshot and all
/// decisions within a tick are made against that one snapshot.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ChannelStatus {
    /// Number of points waiting in the staging buffer
    pub staging_count: u32,

    /// Remaining free slots in the staging buffer
    pub staging_remaining: u32,

    /// Number of points in the device execution buffer
    pub execution_count: u32,

    /// The execution buffer ran dry this control cycle
    pub is_underrun: bool,

    /// An underrun has occurred at some point since last cleared
    pub has_underrun: bool,

    /// The device is holding a valid active point
    pub active_point_valid: bool,

    /// The active point is flagged as the last of the sequence
    pub is_last: bool,

    /// Current output mode of the closed-loop controller
    pub output_mode: OutputMode,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Driver interface to one motor-controller channel.
///
/// The streaming engine is generic over this trait so the left/right lockstep
/// logic is written once, and so tests can substitute a software device
/// model for the hardware driver.
pub trait ProfileChannel {
    /// Which side of the drive this channel actuates.
    fn side(&self) -> Side;

    /// Set the output mode of the closed-loop controller.
    fn set_output_mode(&mut self, mode: OutputMode) -> Result<(), ChannelError>;

    /// Push one trajectory point into the staging buffer.
    fn push_point(&mut self, point: &TrajectoryPoint) -> Result<(), ChannelError>;

    /// Transfer points from the staging buffer into the execution buffer.
    ///
    /// A bounded transfer which returns immediately; safe to call at a higher
    /// rate than points are consumed.
    fn process_buffer(&mut self) -> Result<(), ChannelError>;

    /// Discard all buffered trajectory points, staging and execution.
    fn clear_trajectories(&mut self) -> Result<(), ChannelError>;

    /// Clear the latched underrun flag.
    fn clear_underrun(&mut self) -> Result<(), ChannelError>;

    /// Read the current channel status.
    fn status(&mut self) -> Result<ChannelStatus, ChannelError>;

    /// Configure the period of the control frames carrying buffered points.
    fn set_frame_period_ms(&mut self, period_ms: u32) -> Result<(), ChannelError>;
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TrajectoryPoint {
    /// Build a point from an artifact sample plus its buffer flags.
    pub fn from_sample(sample: &TrajectorySample, is_last: bool, zero_pos: bool) -> Self {
        Self {
            position_ticks: sample.position_ticks,
            feed_forward_v: sample.feed_forward_v,
            heading_ticks: sample.heading_ticks,
            duration_ms: sample.duration_ms,
            is_last,
            zero_pos,
        }
    }

    /// A zero-motion point used to pad the start of one channel, holding the
    /// given heading.
    pub fn sync_point(heading_ticks: f64, duration_ms: u32) -> Self {
        Self {
            position_ticks: 0,
            feed_forward_v: 0.0,
            heading_ticks,
            duration_ms,
            is_last: false,
            zero_pos: false,
        }
    }
}

impl Side {
    /// The opposite side of the drive.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl Default for OutputMode {
    fn default() -> Self {
        OutputMode::Disabled
    }
}
