//! Path definition files
//!
//! One TOML file per maneuver describes the waypoints and generation settings
//! for that path. The files live under `paths/` in the software root and are
//! compiled into trajectory artifacts by the `traj_gen` executable.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A maneuver definition loaded from a path definition file.
#[derive(Clone, Debug, Deserialize)]
pub struct PathDef {
    /// Maneuver name, keys the output artifact file
    pub name: String,

    /// The mechanism will traverse this path driving backwards
    #[serde(default)]
    pub reverse: bool,

    /// If set, every sample's heading output is this fixed value in degrees
    pub heading_override_deg: Option<f64>,

    /// Generation settings handed to the spline generator
    pub settings: GenSettings,

    /// Ordered waypoint list
    pub waypoints: Vec<Waypoint>,
}

/// One waypoint of the path.
///
/// Coordinates use the field frame: +X forward, +Y left, headings measured
/// anticlockwise from +X in radians.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct Waypoint {
    pub x_ft: f64,
    pub y_ft: f64,
    pub heading_rad: f64,
}

/// Settings handed to the trajectory generator.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct GenSettings {
    /// Spline fit order, only cubic (3) is supported
    pub fit_order: u32,

    /// Upper bound on the number of samples the generator may produce
    pub samples_ceiling: usize,

    /// Sample period in seconds
    pub period_s: f64,

    /// Velocity limit for the profile in ft/s
    pub max_velocity_ftps: f64,

    /// Acceleration limit for the profile in ft/s^2
    pub max_acceleration_ftps2: f64,

    /// Jerk limit for the profile in ft/s^3
    pub max_jerk_ftps3: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs while loading a path definition file.
#[derive(Debug, Error)]
pub enum PathDefError {
    #[error("Cannot load the path definition file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot read the path definition file: {0}")]
    DeserialiseError(toml::de::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PathDef {
    /// Load a path definition from the given TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PathDefError> {
        let def_str = std::fs::read_to_string(path).map_err(PathDefError::FileLoadError)?;

        toml::from_str(def_str.as_str()).map_err(PathDefError::DeserialiseError)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_def() {
        let def: PathDef = toml::from_str(
            r#"
            name = "forward"
            heading_override_deg = 0.0

            [settings]
            fit_order = 3
            samples_ceiling = 100000
            period_s = 0.02
            max_velocity_ftps = 7.0
            max_acceleration_ftps2 = 10.0
            max_jerk_ftps3 = 30.0

            [[waypoints]]
            x_ft = 0.0
            y_ft = 0.0
            heading_rad = 0.0

            [[waypoints]]
            x_ft = 4.0
            y_ft = 0.0
            heading_rad = 0.0
            "#,
        )
        .unwrap();

        assert_eq!(def.name, "forward");
        assert!(!def.reverse);
        assert_eq!(def.heading_override_deg, Some(0.0));
        assert_eq!(def.waypoints.len(), 2);
        assert_eq!(def.settings.fit_order, 3);
    }
}
