//! Drivetrain parameters for the trajectory compiler

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

/// Physical and characterisation parameters of the drivetrain.
///
/// The conversion constants must match what the consuming firmware expects:
/// the encoder resolution and heading tick scale are fixed by the motor
/// controller and IMU configuration, not tunable.
#[derive(Clone, Debug, Deserialize)]
pub struct DrivetrainParams {
    /// Calibrated wheelbase of the drive in feet
    pub wheelbase_ft: f64,

    /// Wheel diameter in feet
    pub wheel_diameter_ft: f64,

    /// Encoder counts per wheel revolution
    pub encoder_counts_per_rev: f64,

    /// IMU heading ticks per full rotation
    pub heading_ticks_per_rev: f64,

    /// Maximum physical velocity of the drive in ft/s
    pub max_velocity_ftps: f64,

    /// Maximum physical acceleration of the drive in ft/s^2
    pub max_acceleration_ftps2: f64,

    /// Left side characterisation
    pub left: SideCharacterisation,

    /// Right side characterisation
    pub right: SideCharacterisation,
}

/// Velocity/acceleration characterisation of one side of the drive.
///
/// Obtained from a quasi-static characterisation run, see
/// `Vapp = kV * velocity + kA * acceleration + v_intercept`.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct SideCharacterisation {
    /// Velocity gain in V / ft / s
    pub kv: f64,

    /// Acceleration gain in V / ft / s^2
    pub ka: f64,

    /// Static friction offset in V
    pub v_intercept: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DrivetrainParams {
    /// Characterisation constants for the given side.
    pub fn side(&self, side: Side) -> &SideCharacterisation {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    /// Encoder ticks corresponding to one foot of wheel travel.
    pub fn ticks_per_foot(&self) -> f64 {
        self.encoder_counts_per_rev / (self.wheel_diameter_ft * std::f64::consts::PI)
    }

    /// Heading ticks corresponding to one degree of rotation.
    pub fn heading_ticks_per_degree(&self) -> f64 {
        self.heading_ticks_per_rev / 360.0
    }
}
