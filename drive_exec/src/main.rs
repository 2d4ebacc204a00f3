//! Drive executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Load the compiled trajectory artifact for the requested maneuver
//!     - Create the two motor-controller channels and the streaming engine
//!     - Main loop at the control tick rate:
//!         - Advance the simulated mechanisms
//!         - Poll the path follower until the run is over
//!     - Save the run report and exit
//!
//! Without the real mechanisms attached the channels are the simulated
//! device models, which consume buffered points exactly like the hardware
//! execution buffers do.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use drive_lib::mp_ctrl::{ChannelPair, MpCtrl, SimChannel};
use drive_lib::path_follow::PathFollower;
use drive_lib::telemetry::{RunReport, StreamTelemetry};
use profile_if::chan::Side;
use profile_if::traj::TrajectoryArtifact;
use util::{
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target period of one control cycle.
const CYCLE_PERIOD_S: f64 = 0.02;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Stream a compiled trajectory artifact into the drive channels.
#[derive(Debug, StructOpt)]
#[structopt(name = "drive_exec")]
struct Opt {
    /// Trajectory artifact to execute
    #[structopt(parse(from_os_str))]
    artifact: PathBuf,

    /// Drive the path backwards
    #[structopt(long)]
    reverse: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("drive_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("Castor Drive Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD ARTIFACT ----

    let artifact = TrajectoryArtifact::load(&opt.artifact)
        .wrap_err_with(|| format!("Could not load trajectory artifact {:?}", opt.artifact))?;

    info!(
        "Artifact loaded: {} samples per side at {} ms{}",
        artifact.num_samples(),
        artifact.sample_duration_ms(),
        if opt.reverse { ", driving in reverse" } else { "" }
    );

    // ---- INITIALISE MODULES ----

    info!("No mechanisms attached, using simulated channels");

    let channels = Arc::new(Mutex::new(ChannelPair {
        left: SimChannel::new(Side::Left),
        right: SimChannel::new(Side::Right),
    }));

    let mut ctrl = MpCtrl::init("mp_ctrl.toml", channels.clone())
        .wrap_err("Failed to initialise MpCtrl")?;

    match StreamTelemetry::new(&session) {
        Ok(telemetry) => ctrl.set_telemetry(telemetry),
        Err(e) => warn!("Could not initialise streaming telemetry: {}", e),
    }

    info!("MpCtrl init complete\n");

    let mut follower = PathFollower::new(ctrl, artifact, opt.reverse);

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let cycle_ms = (CYCLE_PERIOD_S * 1000.0) as u32;

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Advance the simulated mechanisms by one control cycle
        {
            let mut guard = match channels.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.left.advance_ms(cycle_ms);
            guard.right.advance_ms(cycle_ms);
        }

        // Path follower processing
        if follower.poll().wrap_err("Path follower processing failed")? {
            break;
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        match Duration::from_secs_f64(CYCLE_PERIOD_S).checked_sub(cycle_dur) {
            Some(remaining) => thread::sleep(remaining),
            None => warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - CYCLE_PERIOD_S
            ),
        }
    }

    // ---- SHUTDOWN ----

    let outcome = follower.outcome();
    info!("Run complete: {:?}", outcome);

    RunReport {
        maneuver: opt
            .artifact
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default(),
        reverse: opt.reverse,
        outcome,
        num_ticks: follower.ctrl().num_ticks(),
        num_underrun_ticks: follower.ctrl().num_underrun_ticks(),
    }
    .save();

    info!("End of execution");

    session.exit();

    Ok(())
}
