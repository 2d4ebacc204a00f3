//! Trajectory compiler executable entry point.
//!
//! Compiles a path definition file into a trajectory artifact ready for the
//! drive executable to stream. Run ahead of time, once per maneuver:
//!
//!     traj_gen paths/forward.toml
//!
//! The output artifact is written next to the other compiled maneuvers under
//! the software root, keyed by the maneuver name from the definition file.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::info;
use std::path::PathBuf;
use structopt::StructOpt;

// Internal
use traj_gen_lib::{compile, DrivetrainParams, PathDef};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Compile a path definition into a trajectory artifact.
#[derive(Debug, StructOpt)]
#[structopt(name = "traj_gen")]
struct Opt {
    /// Path definition TOML file to compile
    #[structopt(parse(from_os_str))]
    path_def: PathBuf,

    /// Drivetrain parameter file, relative to the params directory
    #[structopt(long, default_value = "drivetrain.toml")]
    drivetrain_params: String,

    /// Output directory for the artifact, defaults to <sw_root>/paths
    #[structopt(long, parse(from_os_str))]
    out_dir: Option<PathBuf>,
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
        Session::new("traj_gen", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("Castor Trajectory Compiler\n");

    // ---- LOAD INPUTS ----

    let drivetrain: DrivetrainParams = util::params::load(&opt.drivetrain_params)
        .wrap_err("Could not load drivetrain params")?;

    let def = PathDef::load(&opt.path_def)
        .wrap_err_with(|| format!("Could not load path definition {:?}", opt.path_def))?;

    info!("Compiling maneuver \"{}\"", def.name);
    info!("    Waypoints: {}", def.waypoints.len());
    info!("    Reverse: {}", def.reverse);
    info!("    Heading override: {:?}", def.heading_override_deg);

    // ---- COMPILE ----

    let artifact = compile(&def, &drivetrain)
        .wrap_err_with(|| format!("Failed to compile maneuver \"{}\"", def.name))?;

    let total_ms: u64 = artifact
        .left()
        .iter()
        .map(|sample| sample.duration_ms as u64)
        .sum();

    info!(
        "Compiled {} samples per side, {:.2} s of motion",
        artifact.num_samples(),
        total_ms as f64 / 1000.0
    );

    // ---- PERSIST ----

    let mut out_path = match opt.out_dir {
        Some(dir) => dir,
        None => {
            let mut dir = host::get_castor_sw_root()
                .wrap_err("The software root environment variable (CASTOR_SW_ROOT) is not set")?;
            dir.push("paths");
            dir
        }
    };
    std::fs::create_dir_all(&out_path)
        .wrap_err_with(|| format!("Could not create output directory {:?}", out_path))?;
    out_path.push(format!("{}.traj", def.name));

    artifact
        .save(&out_path)
        .wrap_err_with(|| format!("Could not write artifact to {:?}", out_path))?;

    info!("Artifact written to {:?}", out_path);

    session.exit();

    Ok(())
}
