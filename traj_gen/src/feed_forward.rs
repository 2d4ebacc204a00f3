//! # Feed-forward model
//!
//! Maps a target velocity and acceleration for one side of the drive onto an
//! applied voltage using that side's characterisation constants:
//!
//! ```text
//! Vapp = kV * velocity + kA * acceleration + v_intercept
//! ```
//!
//! The voltage is added open-loop to the closed-loop output at execution
//! time, so the closed-loop controller only has to correct the residual
//! error rather than generate the whole demand.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;

// Internal
use crate::params::DrivetrainParams;
use profile_if::chan::Side;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Feed-forward voltage for the given side at the given motion state.
///
/// Pure and total: a velocity or acceleration beyond the drivetrain's
/// physical maxima only raises a warning, the computation proceeds since the
/// exceedance is a data quality signal about the generated trajectory and
/// not an error in this model.
pub fn voltage(
    side: Side,
    velocity_ftps: f64,
    acceleration_ftps2: f64,
    params: &DrivetrainParams,
) -> f64 {
    if velocity_ftps.abs() >= params.max_velocity_ftps {
        warn!(
            "{:?} side velocity demand {:.3} ft/s exceeds the drivetrain maximum of {:.3} ft/s",
            side, velocity_ftps, params.max_velocity_ftps
        );
    }

    if acceleration_ftps2.abs() >= params.max_acceleration_ftps2 {
        warn!(
            "{:?} side acceleration demand {:.3} ft/s^2 exceeds the drivetrain maximum of \
             {:.3} ft/s^2",
            side, acceleration_ftps2, params.max_acceleration_ftps2
        );
    }

    let side_params = params.side(side);

    side_params.kv * velocity_ftps
        + side_params.ka * acceleration_ftps2
        + side_params.v_intercept
}
