//! Simulated motor-controller channel
//!
//! A software model of one closed-loop motor controller's trajectory buffers,
//! standing in for the hardware driver when running without the real
//! mechanisms and backing the streaming engine's tests. The model mirrors
//! the device semantics the engine relies on: bounded staging and execution
//! queues, point consumption at the sample cadence while output is enabled,
//! a latched underrun flag when the execution buffer starves, and the final
//! point held indefinitely once reached.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::VecDeque;

// Internal
use profile_if::chan::{
    ChannelError, ChannelStatus, OutputMode, ProfileChannel, Side, TrajectoryPoint,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Capacity of the staging buffer.
const STAGING_CAPACITY: usize = 2048;

/// Capacity of the device execution buffer.
const EXECUTION_CAPACITY: usize = 128;

/// Maximum points moved per `process_buffer` call.
const PROCESS_CHUNK: usize = 8;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Software model of one motor-controller channel.
pub struct SimChannel {
    side: Side,

    staging: VecDeque<TrajectoryPoint>,
    execution: VecDeque<TrajectoryPoint>,

    /// The point currently held by the closed-loop controller
    active: Option<TrajectoryPoint>,

    /// Time spent on the active point so far
    active_elapsed_ms: u32,

    mode: OutputMode,
    is_underrun: bool,
    has_underrun: bool,
    frame_period_ms: u32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimChannel {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            staging: VecDeque::new(),
            execution: VecDeque::new(),
            active: None,
            active_elapsed_ms: 0,
            mode: OutputMode::Disabled,
            is_underrun: false,
            has_underrun: false,
            frame_period_ms: 0,
        }
    }

    /// Advance simulated time, consuming execution-buffer points at the
    /// sample cadence while output is enabled.
    pub fn advance_ms(&mut self, ms: u32) {
        if self.mode != OutputMode::Enabled {
            return;
        }

        let mut remaining_ms = ms;

        loop {
            // Take the next point if nothing is active
            if self.active.is_none() {
                match self.execution.pop_front() {
                    Some(point) => {
                        self.active = Some(point);
                        self.active_elapsed_ms = 0;
                        self.is_underrun = false;
                    }
                    None => {
                        self.is_underrun = true;
                        self.has_underrun = true;
                        return;
                    }
                }
            }

            let active = match self.active {
                Some(point) => point,
                None => return,
            };

            // The final point is held until the profile is torn down
            if active.is_last {
                self.is_underrun = false;
                return;
            }

            let left_in_point = active.duration_ms.saturating_sub(self.active_elapsed_ms);
            if remaining_ms < left_in_point {
                self.active_elapsed_ms += remaining_ms;
                return;
            }
            remaining_ms -= left_in_point;

            // Point complete, move to the next or starve
            match self.execution.pop_front() {
                Some(next) => {
                    self.active = Some(next);
                    self.active_elapsed_ms = 0;
                    self.is_underrun = false;
                }
                None => {
                    // Underrun: the device keeps holding the stale point
                    self.active_elapsed_ms = active.duration_ms;
                    self.is_underrun = true;
                    self.has_underrun = true;
                    return;
                }
            }
        }
    }

    /// The configured control frame period.
    pub fn frame_period_ms(&self) -> u32 {
        self.frame_period_ms
    }

    /// All buffered points in execution order, execution buffer first.
    pub fn buffered(&self) -> Vec<TrajectoryPoint> {
        self.execution
            .iter()
            .chain(self.staging.iter())
            .copied()
            .collect()
    }
}

impl ProfileChannel for SimChannel {
    fn side(&self) -> Side {
        self.side
    }

    fn set_output_mode(&mut self, mode: OutputMode) -> Result<(), ChannelError> {
        self.mode = mode;
        Ok(())
    }

    fn push_point(&mut self, point: &TrajectoryPoint) -> Result<(), ChannelError> {
        if self.staging.len() >= STAGING_CAPACITY {
            return Err(ChannelError::StagingFull { side: self.side });
        }

        self.staging.push_back(*point);
        Ok(())
    }

    fn process_buffer(&mut self) -> Result<(), ChannelError> {
        let mut moved = 0;

        while moved < PROCESS_CHUNK && self.execution.len() < EXECUTION_CAPACITY {
            match self.staging.pop_front() {
                Some(point) => self.execution.push_back(point),
                None => break,
            }
            moved += 1;
        }

        Ok(())
    }

    fn clear_trajectories(&mut self) -> Result<(), ChannelError> {
        self.staging.clear();
        self.execution.clear();
        self.active = None;
        self.active_elapsed_ms = 0;
        self.is_underrun = false;
        Ok(())
    }

    fn clear_underrun(&mut self) -> Result<(), ChannelError> {
        self.is_underrun = false;
        self.has_underrun = false;
        Ok(())
    }

    fn status(&mut self) -> Result<ChannelStatus, ChannelError> {
        Ok(ChannelStatus {
            staging_count: self.staging.len() as u32,
            staging_remaining: (STAGING_CAPACITY - self.staging.len()) as u32,
            execution_count: self.execution.len() as u32,
            is_underrun: self.is_underrun,
            has_underrun: self.has_underrun,
            active_point_valid: self.active.is_some(),
            is_last: self.active.map(|point| point.is_last).unwrap_or(false),
            output_mode: self.mode,
        })
    }

    fn set_frame_period_ms(&mut self, period_ms: u32) -> Result<(), ChannelError> {
        self.frame_period_ms = period_ms;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn point(position_ticks: i32, duration_ms: u32, is_last: bool) -> TrajectoryPoint {
        TrajectoryPoint {
            position_ticks,
            feed_forward_v: 0.0,
            heading_ticks: 0.0,
            duration_ms,
            is_last,
            zero_pos: false,
        }
    }

    #[test]
    fn test_consumes_at_sample_cadence() {
        let mut chan = SimChannel::new(Side::Left);

        for i in 0..3 {
            chan.push_point(&point(i, 10, i == 2)).unwrap();
        }
        chan.process_buffer().unwrap();
        chan.set_output_mode(OutputMode::Enabled).unwrap();

        // First advance activates the first point
        chan.advance_ms(5);
        let status = chan.status().unwrap();
        assert!(status.active_point_valid);
        assert!(!status.is_last);
        assert!(!status.is_underrun);

        // 10 ms later the second point is active, 10 more reaches the last
        chan.advance_ms(10);
        assert!(!chan.status().unwrap().is_last);
        chan.advance_ms(10);
        let status = chan.status().unwrap();
        assert!(status.is_last);
        assert!(!status.is_underrun);

        // The last point is held indefinitely
        chan.advance_ms(100);
        assert!(chan.status().unwrap().is_last);
    }

    #[test]
    fn test_underrun_when_starved() {
        let mut chan = SimChannel::new(Side::Left);

        chan.push_point(&point(0, 10, false)).unwrap();
        chan.process_buffer().unwrap();
        chan.set_output_mode(OutputMode::Enabled).unwrap();

        // Run past the only buffered point
        chan.advance_ms(25);
        let status = chan.status().unwrap();
        assert!(status.is_underrun);
        assert!(status.has_underrun);

        // Refilling recovers the live flag, the latched one stays up
        chan.push_point(&point(1, 10, true)).unwrap();
        chan.process_buffer().unwrap();
        chan.advance_ms(10);
        let status = chan.status().unwrap();
        assert!(!status.is_underrun);
        assert!(status.has_underrun);

        chan.clear_underrun().unwrap();
        assert!(!chan.status().unwrap().has_underrun);
    }

    #[test]
    fn test_disabled_consumes_nothing() {
        let mut chan = SimChannel::new(Side::Left);

        chan.push_point(&point(0, 10, true)).unwrap();
        chan.process_buffer().unwrap();

        chan.advance_ms(100);
        let status = chan.status().unwrap();
        assert!(!status.active_point_valid);
        assert_eq!(status.execution_count, 1);
    }
}
