//! Streaming controller state machine

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

// Internal
use super::{refill_pass, ChannelPair, MpCtrlError, PairStatus, Params};
use crate::telemetry::StreamTelemetry;
use profile_if::chan::{ChannelError, OutputMode, ProfileChannel, Side, TrajectoryPoint};
use profile_if::traj::{TrajectoryArtifact, TrajectorySample};
use util::notifier::Notifier;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Phases of a streaming run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No run active
    Idle,

    /// Cleaning the channels and loading the staging buffers
    Priming,

    /// Waiting for the execution buffers to hold enough points to survive
    /// the first control cycles
    AwaitingBufferReady,

    /// Closed-loop output enabled, profile executing
    Running,

    /// Run over, releasing the refill task's resources
    Draining,
}

/// How a finished run ended.
///
/// Anything except `AtGoal` means the mechanism stopped without completing
/// the trajectory: "finished" tells the caller the run is over, not that the
/// goal was reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    /// Both channels reached their final trajectory point
    AtGoal,

    /// The stall budget expired with no forward progress
    Stalled,

    /// A device bus transaction failed mid-run
    DeviceFault,

    /// The caller stopped the run before it completed
    Stopped,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The synchronized dual-buffer streaming controller.
///
/// Owns the two channels of one mechanism for the duration of a run. At most
/// one run is active at a time; `start` while a run is active is refused.
pub struct MpCtrl<C: ProfileChannel + Send + 'static> {
    params: Params,

    /// Both motor-controller channels, shared with the refill task
    channels: Arc<Mutex<ChannelPair<C>>>,

    phase: Phase,
    finished: bool,
    outcome: Option<RunOutcome>,

    /// Remaining control ticks before the run is declared stalled
    stall_budget: i32,

    /// Periodic staging-to-execution refill task, armed while a run is live
    notifier: Option<Notifier>,

    /// Working copies of the artifact sequences, negated when reversing.
    /// The artifact itself is never modified.
    left_points: Vec<TrajectorySample>,
    right_points: Vec<TrajectorySample>,

    reverse: bool,
    stream_rate_ms: u32,

    telemetry: Option<StreamTelemetry>,

    num_ticks: u64,
    num_underrun_ticks: u64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<C: ProfileChannel + Send + 'static> MpCtrl<C> {
    /// Create a controller over the given channel pair.
    pub fn new(params: Params, channels: Arc<Mutex<ChannelPair<C>>>) -> Self {
        Self {
            params,
            channels,
            phase: Phase::Idle,
            finished: false,
            outcome: None,
            stall_budget: 0,
            notifier: None,
            left_points: Vec::new(),
            right_points: Vec::new(),
            reverse: false,
            stream_rate_ms: 0,
            telemetry: None,
            num_ticks: 0,
            num_underrun_ticks: 0,
        }
    }

    /// Create a controller loading its parameters from the given file.
    pub fn init(
        params_path: &str,
        channels: Arc<Mutex<ChannelPair<C>>>,
    ) -> Result<Self, MpCtrlError> {
        let params = util::params::load(params_path)?;

        Ok(Self::new(params, channels))
    }

    /// Attach a telemetry sink recording both channels' status each tick.
    pub fn set_telemetry(&mut self, telemetry: StreamTelemetry) {
        self.telemetry = Some(telemetry);
    }

    /// Current phase of the state machine.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True when the active run is driving the path backwards.
    pub fn reverse(&self) -> bool {
        self.reverse
    }

    /// True once the run is over, at goal or not - see [`MpCtrl::outcome`].
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// How the last run ended, `None` while a run is in progress.
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.outcome
    }

    /// Control ticks consumed by the current run.
    pub fn num_ticks(&self) -> u64 {
        self.num_ticks
    }

    /// Ticks on which either channel reported an execution buffer underrun.
    pub fn num_underrun_ticks(&self) -> u64 {
        self.num_underrun_ticks
    }

    /// Begin executing the given artifact.
    ///
    /// The actual device work happens on the following `control` ticks; this
    /// only validates the request and takes the working copies. With
    /// `reverse` set the working copies negate position and feed-forward so
    /// the mechanism drives the path backwards.
    pub fn start(
        &mut self,
        artifact: &TrajectoryArtifact,
        reverse: bool,
    ) -> Result<(), MpCtrlError> {
        if self.phase != Phase::Idle || self.notifier.is_some() {
            return Err(MpCtrlError::RunAlreadyActive);
        }

        let sample_duration_ms = artifact.sample_duration_ms();
        if sample_duration_ms == 0 {
            return Err(MpCtrlError::ZeroSampleDuration);
        }

        // Stream at twice the sample rate to tolerate timing jitter
        self.stream_rate_ms = (sample_duration_ms / 2).max(1);

        self.left_points = working_copy(artifact.left(), reverse);
        self.right_points = working_copy(artifact.right(), reverse);
        self.reverse = reverse;
        self.finished = false;
        self.outcome = None;
        self.num_ticks = 0;
        self.num_underrun_ticks = 0;
        self.reset_stall_budget();
        self.phase = Phase::Priming;

        info!(
            "Run started: {} samples per side at {} ms, stream rate {} ms, reverse: {}",
            self.left_points.len(),
            sample_duration_ms,
            self.stream_rate_ms,
            reverse
        );

        Ok(())
    }

    /// Process one control tick.
    ///
    /// Called by the owner once per control cycle. A tick after the run has
    /// finished is a no-op. Device failures never escape: they abort the run
    /// and surface through [`MpCtrl::outcome`].
    pub fn control(&mut self) {
        if self.finished || self.phase == Phase::Idle {
            return;
        }

        if self.phase == Phase::Draining {
            self.finish();
            return;
        }

        self.num_ticks += 1;

        let channels = self.channels.clone();
        let mut guard = match channels.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let pair = &mut *guard;

        // One status snapshot per tick: every decision below uses this
        // consistent view of both channels
        let status = match pair.statuses() {
            Ok(s) => s,
            Err(e) => {
                error!("Channel status read failed: {}", e);
                self.abort(pair, RunOutcome::DeviceFault);
                return;
            }
        };

        if let Some(ref mut telemetry) = self.telemetry {
            telemetry.record(self.phase, &status);
        }

        let result = match self.phase {
            Phase::Priming => self.tick_priming(pair, &status),
            Phase::AwaitingBufferReady => self.tick_awaiting_buffer_ready(pair, &status),
            Phase::Running => self.tick_running(pair, &status),
            Phase::Idle | Phase::Draining => Ok(()),
        };

        if let Err(e) = result {
            error!("Device I/O failure in {:?}: {}", self.phase, e);
            self.abort(pair, RunOutcome::DeviceFault);
            return;
        }

        // Stall supervision: each tick spends budget, forward progress
        // restores it
        self.stall_budget -= 1;
        if self.stall_budget <= 0 && self.phase != Phase::Draining {
            warn!(
                "No forward progress for {} ticks, aborting the run in {:?}",
                self.params.stall_budget_ticks, self.phase
            );
            log_pair_status(&status);
            self.abort(pair, RunOutcome::Stalled);
        }
    }

    /// Stop the run and release everything. Idempotent.
    ///
    /// The refill task is stopped before the channels are touched so no
    /// transfer can race the teardown.
    pub fn stop(&mut self) {
        self.stop_notifier();

        let channels = self.channels.clone();
        let mut guard = match channels.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = guard.try_for_each(|chan| chan.set_output_mode(OutputMode::Disabled)) {
            error!("Could not disable channel outputs during stop: {}", e);
        }
        drop(guard);

        if !self.finished && self.phase != Phase::Idle {
            self.outcome.get_or_insert(RunOutcome::Stopped);
            info!("Run stopped by the caller in {:?}", self.phase);
        }

        self.left_points.clear();
        self.right_points.clear();
        self.phase = Phase::Idle;
        self.finished = true;
    }

    /// Priming: restore the channels to a clean state regardless of how the
    /// previous run exited, load both staging buffers, arm the refill task.
    fn tick_priming(
        &mut self,
        pair: &mut ChannelPair<C>,
        status: &PairStatus,
    ) -> Result<(), ChannelError> {
        info!("Priming the motion profile channels");

        let stream_rate_ms = self.stream_rate_ms;
        pair.try_for_each(|chan| chan.set_frame_period_ms(stream_rate_ms))?;

        if status.left.output_mode != OutputMode::Disabled
            || status.right.output_mode != OutputMode::Disabled
        {
            warn!("A channel was left enabled, forcing both to Disabled");
        }
        pair.try_for_each(|chan| chan.set_output_mode(OutputMode::Disabled))?;

        if status.left.has_underrun || status.right.has_underrun {
            warn!("Clearing prior underrun condition");
        }
        pair.try_for_each(|chan| chan.clear_underrun())?;

        if status.left.staging_count != 0
            || status.left.execution_count != 0
            || status.right.staging_count != 0
            || status.right.execution_count != 0
        {
            warn!("Clearing residual buffered trajectories");
        }
        pair.try_for_each(|chan| chan.clear_trajectories())?;

        self.fill_buffers(pair)?;
        self.arm_notifier();

        debug!(
            "{} motion points staged per channel, refill armed at {} ms",
            self.left_points.len(),
            self.stream_rate_ms
        );

        self.phase = Phase::AwaitingBufferReady;
        self.reset_stall_budget();

        Ok(())
    }

    /// Waiting for the execution buffers to fill far enough that the first
    /// control cycles cannot starve, then enabling closed-loop output.
    fn tick_awaiting_buffer_ready(
        &mut self,
        pair: &mut ChannelPair<C>,
        status: &PairStatus,
    ) -> Result<(), ChannelError> {
        if status.both_buffered_above(self.params.min_buffered_points) {
            info!("Execution buffers ready, enabling closed-loop output");
            pair.try_for_each(|chan| chan.set_output_mode(OutputMode::Enabled))?;
            self.phase = Phase::Running;
            self.reset_stall_budget();
        }

        Ok(())
    }

    /// Profile executing: supervise underruns and watch for both channels to
    /// reach their final point together.
    fn tick_running(
        &mut self,
        pair: &mut ChannelPair<C>,
        status: &PairStatus,
    ) -> Result<(), ChannelError> {
        if !status.any_underrun() {
            self.reset_stall_budget();
        } else {
            // Recoverable as long as the buffer refills before the stall
            // budget runs out
            self.num_underrun_ticks += 1;
            warn!(
                "Execution buffer underrun (left: {}, right: {})",
                status.left.is_underrun, status.right.is_underrun
            );
            log_pair_status(status);
        }

        if status.both_at_last_point() {
            info!("Both channels are holding the last trajectory point");
            self.stop_notifier();
            pair.try_for_each(|chan| chan.set_output_mode(OutputMode::Disabled))?;
            self.outcome = Some(RunOutcome::AtGoal);
            self.phase = Phase::Draining;
        }

        Ok(())
    }

    /// Draining: release the refill task and report the run finished.
    fn finish(&mut self) {
        self.stop_notifier();
        self.left_points.clear();
        self.right_points.clear();

        let outcome = *self.outcome.get_or_insert(RunOutcome::AtGoal);
        self.finished = true;
        self.phase = Phase::Idle;

        info!("Run finished: {:?}", outcome);
    }

    /// Abort the run: refill task stopped, outputs disabled, straight to
    /// `Draining` carrying the given outcome.
    fn abort(&mut self, pair: &mut ChannelPair<C>, outcome: RunOutcome) {
        self.stop_notifier();

        if let Err(e) = pair.try_for_each(|chan| chan.set_output_mode(OutputMode::Disabled)) {
            error!("Could not disable channel outputs during abort: {}", e);
        }

        self.outcome = Some(outcome);
        self.phase = Phase::Draining;
    }

    /// Push the sync prefix and both full point sequences into the staging
    /// buffers, interleaving left and right so the channels load in lockstep.
    fn fill_buffers(&self, pair: &mut ChannelPair<C>) -> Result<(), ChannelError> {
        let num_points = self.left_points.len();

        // Zero-motion sync points on the designated channel only, offsetting
        // its start to soak up the controllers' relative startup latency
        let sync_source = match self.params.sync_side {
            Side::Left => &self.left_points,
            Side::Right => &self.right_points,
        };
        let sync_point =
            TrajectoryPoint::sync_point(sync_source[0].heading_ticks, sync_source[0].duration_ms);

        let sync_chan = pair.get_mut(self.params.sync_side);
        for _ in 0..self.params.sync_point_count {
            sync_chan.push_point(&sync_point)?;
        }

        for i in 0..num_points {
            let is_last = i + 1 == num_points;
            let zero_pos = i == 0;

            let left_point = TrajectoryPoint::from_sample(&self.left_points[i], is_last, zero_pos);
            pair.left.push_point(&left_point)?;

            let right_point =
                TrajectoryPoint::from_sample(&self.right_points[i], is_last, zero_pos);
            pair.right.push_point(&right_point)?;
        }

        Ok(())
    }

    /// Arm the periodic refill task at half the sample duration.
    ///
    /// The refill closure uses `try_lock` and skips a pass when the control
    /// tick holds the channel lock: a skipped pass costs at most half a
    /// sample, and blocking there would deadlock a teardown that joins the
    /// notifier thread while holding the lock.
    fn arm_notifier(&mut self) {
        let channels = Arc::clone(&self.channels);
        let execution_buffer_cap = self.params.execution_buffer_cap;
        let period = Duration::from_millis(self.stream_rate_ms as u64);

        self.notifier = Some(Notifier::start_periodic(period, move || {
            let mut pair = match channels.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::WouldBlock) => return,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            };
            refill_pass(&mut pair, execution_buffer_cap);
        }));
    }

    /// Stop and release the refill task, if armed.
    fn stop_notifier(&mut self) {
        if let Some(mut notifier) = self.notifier.take() {
            notifier.stop();
            debug!("Refill task stopped");
        }
    }

    fn reset_stall_budget(&mut self) {
        self.stall_budget = self.params.stall_budget_ticks as i32;
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Take a working copy of one side's samples, negating position and
/// feed-forward when the path is to be driven backwards.
fn working_copy(samples: &[TrajectorySample], reverse: bool) -> Vec<TrajectorySample> {
    if !reverse {
        return samples.to_vec();
    }

    samples
        .iter()
        .map(|sample| TrajectorySample {
            position_ticks: -sample.position_ticks,
            feed_forward_v: -sample.feed_forward_v,
            heading_ticks: sample.heading_ticks,
            duration_ms: sample.duration_ms,
        })
        .collect()
}

/// Dump both channels' full status, used when a run is in trouble.
fn log_pair_status(status: &PairStatus) {
    warn!("LEFT:  {:?}", status.left);
    warn!("RIGHT: {:?}", status.right);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mp_ctrl::SimChannel;
    use profile_if::chan::ChannelStatus;
    use std::thread;

    fn params() -> Params {
        Params {
            sync_point_count: 2,
            sync_side: Side::Left,
            min_buffered_points: 5,
            execution_buffer_cap: 100,
            stall_budget_ticks: 50,
        }
    }

    fn artifact(num_samples: usize, duration_ms: u32) -> TrajectoryArtifact {
        let side = |sign: i32| {
            (0..num_samples)
                .map(|i| TrajectorySample {
                    position_ticks: sign * (i as i32) * 10,
                    feed_forward_v: 1.0 + i as f64 * 0.01,
                    heading_ticks: 0.0,
                    duration_ms,
                })
                .collect::<Vec<_>>()
        };
        TrajectoryArtifact::new(side(1), side(1)).unwrap()
    }

    fn sim_pair() -> Arc<Mutex<ChannelPair<SimChannel>>> {
        Arc::new(Mutex::new(ChannelPair {
            left: SimChannel::new(Side::Left),
            right: SimChannel::new(Side::Right),
        }))
    }

    fn advance_both(pair: &Arc<Mutex<ChannelPair<SimChannel>>>, ms: u32) {
        let mut guard = pair.lock().unwrap();
        guard.left.advance_ms(ms);
        guard.right.advance_ms(ms);
    }

    /// A fake channel whose buffers never grow: every operation succeeds but
    /// the status always reports empty buffers.
    struct StuckChannel {
        side: Side,
        mode: OutputMode,
    }

    impl StuckChannel {
        fn new(side: Side) -> Self {
            Self {
                side,
                mode: OutputMode::Disabled,
            }
        }

        fn zero_status(&self) -> ChannelStatus {
            ChannelStatus {
                staging_count: 0,
                staging_remaining: 512,
                execution_count: 0,
                is_underrun: false,
                has_underrun: false,
                active_point_valid: false,
                is_last: false,
                output_mode: self.mode,
            }
        }
    }

    impl ProfileChannel for StuckChannel {
        fn side(&self) -> Side {
            self.side
        }

        fn set_output_mode(&mut self, mode: OutputMode) -> Result<(), ChannelError> {
            self.mode = mode;
            Ok(())
        }

        fn push_point(&mut self, _point: &TrajectoryPoint) -> Result<(), ChannelError> {
            Ok(())
        }

        fn process_buffer(&mut self) -> Result<(), ChannelError> {
            Ok(())
        }

        fn clear_trajectories(&mut self) -> Result<(), ChannelError> {
            Ok(())
        }

        fn clear_underrun(&mut self) -> Result<(), ChannelError> {
            Ok(())
        }

        fn status(&mut self) -> Result<ChannelStatus, ChannelError> {
            Ok(self.zero_status())
        }

        fn set_frame_period_ms(&mut self, _period_ms: u32) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    /// A fake channel that fails its status read, modelling a dead bus.
    struct DeadBusChannel {
        side: Side,
    }

    impl ProfileChannel for DeadBusChannel {
        fn side(&self) -> Side {
            self.side
        }

        fn set_output_mode(&mut self, _mode: OutputMode) -> Result<(), ChannelError> {
            Ok(())
        }

        fn push_point(&mut self, _point: &TrajectoryPoint) -> Result<(), ChannelError> {
            Ok(())
        }

        fn process_buffer(&mut self) -> Result<(), ChannelError> {
            Ok(())
        }

        fn clear_trajectories(&mut self) -> Result<(), ChannelError> {
            Ok(())
        }

        fn clear_underrun(&mut self) -> Result<(), ChannelError> {
            Ok(())
        }

        fn status(&mut self) -> Result<ChannelStatus, ChannelError> {
            Err(ChannelError::BusError {
                side: self.side,
                reason: String::from("no response"),
            })
        }

        fn set_frame_period_ms(&mut self, _period_ms: u32) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    #[test]
    fn test_start_while_active_is_refused() {
        let pair = sim_pair();
        let mut ctrl = MpCtrl::new(params(), pair);
        let artifact = artifact(10, 10);

        ctrl.start(&artifact, false).unwrap();
        assert!(matches!(
            ctrl.start(&artifact, false),
            Err(MpCtrlError::RunAlreadyActive)
        ));
    }

    #[test]
    fn test_priming_loads_sync_prefix_and_flags() {
        let pair = sim_pair();
        let mut ctrl = MpCtrl::new(params(), pair.clone());
        let artifact = artifact(10, 10);

        ctrl.start(&artifact, false).unwrap();
        assert_eq!(ctrl.phase(), Phase::Priming);

        ctrl.control();
        assert_eq!(ctrl.phase(), Phase::AwaitingBufferReady);
        ctrl.stop();

        let guard = pair.lock().unwrap();
        let left = guard.left.buffered();
        let right = guard.right.buffered();

        // Control frames reconfigured to the stream rate, half the 10 ms
        // sample duration
        assert_eq!(guard.left.frame_period_ms(), 5);
        assert_eq!(guard.right.frame_period_ms(), 5);

        // Sync prefix on the left channel only
        assert_eq!(left.len(), 12);
        assert_eq!(right.len(), 10);
        for point in &left[..2] {
            assert_eq!(point.position_ticks, 0);
            assert_eq!(point.feed_forward_v, 0.0);
            assert!(!point.is_last);
            assert!(!point.zero_pos);
        }

        // First motion point zeroes the position reference, final point
        // carries the completion flag
        assert!(left[2].zero_pos);
        assert!(right[0].zero_pos);
        assert!(left[11].is_last);
        assert!(right[9].is_last);
        assert!(!left[10].is_last);

        drop(guard);
    }

    #[test]
    fn test_reverse_negates_streamed_points() {
        let pair = sim_pair();
        let mut ctrl = MpCtrl::new(params(), pair.clone());
        let artifact = artifact(10, 10);

        ctrl.start(&artifact, true).unwrap();
        ctrl.control();
        ctrl.stop();

        let guard = pair.lock().unwrap();
        let right = guard.right.buffered();

        for (i, point) in right.iter().enumerate() {
            assert_eq!(point.position_ticks, -(artifact.right()[i].position_ticks));
            assert!((point.feed_forward_v + artifact.right()[i].feed_forward_v).abs() < 1e-12);
        }

        drop(guard);
    }

    #[test]
    fn test_lockstep_completion() {
        let pair = sim_pair();
        let mut ctrl = MpCtrl::new(params(), pair.clone());
        // 30 samples plus 2 left sync points: the right channel reaches its
        // last point two samples before the left
        let artifact = artifact(30, 10);

        ctrl.start(&artifact, false).unwrap();

        let mut saw_right_waiting = false;
        for _ in 0..1000 {
            thread::sleep(Duration::from_millis(10));
            advance_both(&pair, 10);
            ctrl.control();

            if ctrl.is_finished() {
                break;
            }

            let mut guard = pair.lock().unwrap();
            let right_status = guard.right.status().unwrap();
            drop(guard);

            // The right side holding its last point must not finish the run
            // while the left side is still executing
            if right_status.active_point_valid && right_status.is_last {
                assert!(!ctrl.is_finished());
                saw_right_waiting = true;
            }
        }

        assert!(saw_right_waiting, "right channel never led the left");
        assert!(ctrl.is_finished());
        assert_eq!(ctrl.outcome(), Some(RunOutcome::AtGoal));
    }

    #[test]
    fn test_full_run_scenario() {
        let pair = sim_pair();
        let mut ctrl = MpCtrl::new(params(), pair.clone());
        let artifact = artifact(50, 10);

        assert_eq!(ctrl.phase(), Phase::Idle);
        ctrl.start(&artifact, false).unwrap();
        assert_eq!(ctrl.phase(), Phase::Priming);
        assert!(!ctrl.is_finished());

        let mut phases_seen = vec![ctrl.phase()];
        let mut sim_ms = 0u32;

        for _ in 0..1000 {
            thread::sleep(Duration::from_millis(10));
            advance_both(&pair, 10);
            sim_ms += 10;

            ctrl.control();
            if phases_seen.last() != Some(&ctrl.phase()) {
                phases_seen.push(ctrl.phase());
            }

            if ctrl.is_finished() {
                break;
            }
        }

        assert!(ctrl.is_finished());
        assert_eq!(ctrl.outcome(), Some(RunOutcome::AtGoal));

        // 50 samples of 10 ms plus the sync prefix cannot complete in less
        // than 500 ms of simulated time
        assert!(sim_ms >= 500, "finished after only {} ms", sim_ms);

        assert_eq!(
            phases_seen,
            vec![
                Phase::Priming,
                Phase::AwaitingBufferReady,
                Phase::Running,
                Phase::Draining,
                Phase::Idle
            ]
        );

        // Outputs disabled at the end
        let mut guard = pair.lock().unwrap();
        assert_eq!(guard.left.status().unwrap().output_mode, OutputMode::Disabled);
        assert_eq!(guard.right.status().unwrap().output_mode, OutputMode::Disabled);
        drop(guard);

        // Further ticks are no-ops
        let ticks = ctrl.num_ticks();
        ctrl.control();
        assert_eq!(ctrl.num_ticks(), ticks);
    }

    #[test]
    fn test_stall_abort_within_budget() {
        let pair = Arc::new(Mutex::new(ChannelPair {
            left: StuckChannel::new(Side::Left),
            right: StuckChannel::new(Side::Right),
        }));
        let mut stall_params = params();
        stall_params.stall_budget_ticks = 5;

        let mut ctrl = MpCtrl::new(stall_params, pair.clone());
        ctrl.start(&artifact(10, 10), false).unwrap();

        // The buffers never grow, so the budget drains tick by tick
        for tick in 1..=5 {
            assert_ne!(ctrl.phase(), Phase::Draining, "aborted early at tick {}", tick);
            ctrl.control();
        }
        assert_eq!(ctrl.phase(), Phase::Draining);

        ctrl.control();
        assert!(ctrl.is_finished());
        assert_eq!(ctrl.outcome(), Some(RunOutcome::Stalled));

        let mut guard = pair.lock().unwrap();
        assert_eq!(guard.left.status().unwrap().output_mode, OutputMode::Disabled);
        assert_eq!(guard.right.status().unwrap().output_mode, OutputMode::Disabled);
        drop(guard);
    }

    #[test]
    fn test_device_fault_aborts_run() {
        let pair = Arc::new(Mutex::new(ChannelPair {
            left: DeadBusChannel { side: Side::Left },
            right: DeadBusChannel { side: Side::Right },
        }));

        let mut ctrl = MpCtrl::new(params(), pair);
        ctrl.start(&artifact(10, 10), false).unwrap();

        ctrl.control();
        assert_eq!(ctrl.phase(), Phase::Draining);

        ctrl.control();
        assert!(ctrl.is_finished());
        assert_eq!(ctrl.outcome(), Some(RunOutcome::DeviceFault));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let pair = sim_pair();
        let mut ctrl = MpCtrl::new(params(), pair.clone());

        ctrl.start(&artifact(10, 10), false).unwrap();
        ctrl.control();

        ctrl.stop();
        ctrl.stop();

        assert!(ctrl.is_finished());
        assert_eq!(ctrl.outcome(), Some(RunOutcome::Stopped));

        let mut guard = pair.lock().unwrap();
        assert_eq!(guard.left.status().unwrap().output_mode, OutputMode::Disabled);
        assert_eq!(guard.right.status().unwrap().output_mode, OutputMode::Disabled);
        drop(guard);
    }
}
