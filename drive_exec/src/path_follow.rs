//! # Path follow task
//!
//! Thin per-tick adapter between the owner's command cycle and the streaming
//! controller: starts the run once, polls `control` every tick, and performs
//! the cleanup exactly once when the controller reports finished.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::info;

// Internal
use crate::mp_ctrl::{MpCtrl, MpCtrlError, RunOutcome};
use profile_if::chan::ProfileChannel;
use profile_if::traj::TrajectoryArtifact;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Follows one compiled path to completion.
pub struct PathFollower<C: ProfileChannel + Send + 'static> {
    ctrl: MpCtrl<C>,
    artifact: TrajectoryArtifact,
    reverse: bool,
    started: bool,
    ended: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<C: ProfileChannel + Send + 'static> PathFollower<C> {
    /// Create a follower for the given artifact.
    pub fn new(ctrl: MpCtrl<C>, artifact: TrajectoryArtifact, reverse: bool) -> Self {
        Self {
            ctrl,
            artifact,
            reverse,
            started: false,
            ended: false,
        }
    }

    /// Process one tick of path following.
    ///
    /// Returns `true` once the run is over and cleaned up. Polling after
    /// that is a no-op.
    pub fn poll(&mut self) -> Result<bool, MpCtrlError> {
        if self.ended {
            return Ok(true);
        }

        if !self.started {
            self.ctrl.start(&self.artifact, self.reverse)?;
            self.started = true;
            return Ok(false);
        }

        if self.ctrl.is_finished() {
            self.end();
            return Ok(true);
        }

        self.ctrl.control();

        Ok(false)
    }

    /// How the run ended, `None` while it is still in progress.
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.ctrl.outcome()
    }

    /// The wrapped controller, for run statistics.
    pub fn ctrl(&self) -> &MpCtrl<C> {
        &self.ctrl
    }

    /// Release everything exactly once.
    fn end(&mut self) {
        info!("Path follower cleaning up");
        self.ctrl.stop();
        self.ended = true;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mp_ctrl::{ChannelPair, Params, SimChannel};
    use profile_if::chan::Side;
    use profile_if::traj::TrajectorySample;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_follows_to_completion() {
        let pair = Arc::new(Mutex::new(ChannelPair {
            left: SimChannel::new(Side::Left),
            right: SimChannel::new(Side::Right),
        }));

        let params = Params {
            sync_point_count: 2,
            sync_side: Side::Left,
            min_buffered_points: 5,
            execution_buffer_cap: 100,
            stall_budget_ticks: 50,
        };

        let samples: Vec<TrajectorySample> = (0..20)
            .map(|i| TrajectorySample {
                position_ticks: i * 10,
                feed_forward_v: 1.0,
                heading_ticks: 0.0,
                duration_ms: 10,
            })
            .collect();
        let artifact = TrajectoryArtifact::new(samples.clone(), samples).unwrap();

        let ctrl = MpCtrl::new(params, pair.clone());
        let mut follower = PathFollower::new(ctrl, artifact, false);

        let mut finished = false;
        for _ in 0..1000 {
            thread::sleep(Duration::from_millis(10));
            {
                let mut guard = pair.lock().unwrap();
                guard.left.advance_ms(10);
                guard.right.advance_ms(10);
            }

            if follower.poll().unwrap() {
                finished = true;
                break;
            }
        }

        assert!(finished);
        assert_eq!(follower.outcome(), Some(RunOutcome::AtGoal));

        // Polling again after the end is a no-op
        assert!(follower.poll().unwrap());
    }
}
