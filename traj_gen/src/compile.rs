//! # Trajectory compiler
//!
//! Ties the generation pipeline together: runs the spline generator over the
//! path definition, splits the centerline for the differential drive, and
//! converts every sample into the device units consumed by the motor
//! controllers (encoder ticks, feed-forward volts, IMU heading ticks,
//! millisecond durations).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use crate::feed_forward;
use crate::params::DrivetrainParams;
use crate::path_def::PathDef;
use crate::spline::{self, GenError};
use crate::tank_split::{self, WheelSegment};
use profile_if::chan::Side;
use profile_if::traj::{ArtifactError, TrajectoryArtifact, TrajectorySample};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Potential errors raised during trajectory compilation.
///
/// A compile error never leaves a partial artifact behind: the caller gets
/// either a fully valid artifact or an error.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Trajectory generation failed: {0}")]
    GenFailed(#[from] GenError),

    #[error("Sample {0} produced a position outside the encoder tick range")]
    PositionNotRepresentable(usize),

    #[error("Sample {0} has a zero duration")]
    ZeroDurationSample(usize),

    #[error("Compiled trajectories are inconsistent: {0}")]
    InvalidArtifact(#[from] ArtifactError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Compile a path definition into a trajectory artifact.
pub fn compile(
    def: &PathDef,
    drivetrain: &DrivetrainParams,
) -> Result<TrajectoryArtifact, CompileError> {
    let center = spline::generate(&def.waypoints, &def.settings)?;

    let (left, right) = tank_split::split(&center, drivetrain.wheelbase_ft);

    let left_samples = convert_side(&left, Side::Left, def, drivetrain)?;
    let right_samples = convert_side(&right, Side::Right, def, drivetrain)?;

    Ok(TrajectoryArtifact::new(left_samples, right_samples)?)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Convert one wheel trajectory into device-unit samples.
fn convert_side(
    segments: &[WheelSegment],
    side: Side,
    def: &PathDef,
    drivetrain: &DrivetrainParams,
) -> Result<Vec<TrajectorySample>, CompileError> {
    let ticks_per_foot = drivetrain.ticks_per_foot();
    let heading_ticks_per_degree = drivetrain.heading_ticks_per_degree();

    let mut samples = Vec::with_capacity(segments.len());

    for (i, seg) in segments.iter().enumerate() {
        let position_ticks = seg.position_ft * ticks_per_foot;
        if !position_ticks.is_finite()
            || position_ticks > i32::MAX as f64
            || position_ticks < i32::MIN as f64
        {
            return Err(CompileError::PositionNotRepresentable(i));
        }

        let heading_deg = match def.heading_override_deg {
            Some(override_deg) => override_deg,
            None => normalise_heading_deg(seg.heading_rad.to_degrees(), def.reverse),
        };

        let duration_ms = (seg.dt_s * 1000.0).round() as u32;
        if duration_ms == 0 {
            return Err(CompileError::ZeroDurationSample(i));
        }

        samples.push(TrajectorySample {
            position_ticks: position_ticks.round() as i32,
            feed_forward_v: feed_forward::voltage(
                side,
                seg.velocity_ftps,
                seg.acceleration_ftps2,
                drivetrain,
            ),
            heading_ticks: heading_deg * heading_ticks_per_degree,
            duration_ms,
        });
    }

    Ok(samples)
}

/// Normalise a generator heading in [0, 360) degrees into the signed range
/// used by the heading-holding controller.
///
/// Driving forwards, headings above 180 wrap to the negative half. Driving
/// backwards the sign convention flips so the heading controller keeps a
/// consistent error sign while the drive runs in reverse.
fn normalise_heading_deg(heading_deg: f64, reverse: bool) -> f64 {
    if !reverse {
        if heading_deg > 180.0 {
            heading_deg - 360.0
        } else {
            heading_deg
        }
    } else {
        if heading_deg >= 180.0 {
            -(heading_deg - 180.0)
        } else {
            -heading_deg - 180.0
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::test::practice_drivetrain;
    use crate::path_def::{GenSettings, Waypoint};

    fn straight_def(reverse: bool, heading_override_deg: Option<f64>) -> PathDef {
        PathDef {
            name: String::from("forward"),
            reverse,
            heading_override_deg,
            settings: GenSettings {
                fit_order: 3,
                samples_ceiling: 100_000,
                period_s: 0.02,
                max_velocity_ftps: 7.0,
                max_acceleration_ftps2: 10.0,
                max_jerk_ftps3: 30.0,
            },
            waypoints: vec![
                Waypoint {
                    x_ft: 0.0,
                    y_ft: 0.0,
                    heading_rad: 0.0,
                },
                Waypoint {
                    x_ft: 4.0,
                    y_ft: 0.0,
                    heading_rad: 0.0,
                },
            ],
        }
    }

    fn scenario_drivetrain() -> DrivetrainParams {
        let mut params = practice_drivetrain();
        params.wheelbase_ft = 1.96;
        params
    }

    #[test]
    fn test_straight_line_scenario() {
        let drivetrain = scenario_drivetrain();
        let artifact = compile(&straight_def(false, Some(0.0)), &drivetrain).unwrap();

        let left = artifact.left();
        let right = artifact.right();
        assert_eq!(left.len(), right.len());

        for i in 0..left.len() {
            // Heading override pins every sample's heading output to zero
            assert_eq!(left[i].heading_ticks, 0.0);
            assert_eq!(right[i].heading_ticks, 0.0);

            // Both sides share the sample cadence
            assert_eq!(left[i].duration_ms, 20);
            assert_eq!(right[i].duration_ms, 20);

            // Straight line: both wheels cover identical distances even
            // though their paths sit half a wheelbase either side of the
            // centerline
            assert_eq!(left[i].position_ticks, right[i].position_ticks);
        }

        // 4 ft of travel at 4096 counts per 0.5 ft diameter wheel rev
        let expected_ticks =
            (4.0 * drivetrain.ticks_per_foot()).round() as i32;
        assert_eq!(left.last().unwrap().position_ticks, expected_ticks);
    }

    #[test]
    fn test_reverse_affects_heading_only() {
        let drivetrain = scenario_drivetrain();
        let forward = compile(&straight_def(false, None), &drivetrain).unwrap();
        let reverse = compile(&straight_def(true, None), &drivetrain).unwrap();

        assert_eq!(forward.num_samples(), reverse.num_samples());

        for i in 0..forward.num_samples() {
            let fwd = &forward.left()[i];
            let rev = &reverse.left()[i];

            // Position and feed-forward are identical: the streaming engine
            // performs the negation for a backwards run, not the compiler
            assert_eq!(fwd.position_ticks, rev.position_ticks);
            assert!((fwd.feed_forward_v - rev.feed_forward_v).abs() < 1e-9);

            // Heading carries the flipped sign convention: 0 deg forward
            // maps to -180 deg driving backwards
            assert!((fwd.heading_ticks - 0.0).abs() < 1e-6);
            assert!((rev.heading_ticks - (-1800.0)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_heading_normalisation() {
        // Forward: wrap the upper half into the negative range
        assert_eq!(normalise_heading_deg(90.0, false), 90.0);
        assert_eq!(normalise_heading_deg(270.0, false), -90.0);
        assert_eq!(normalise_heading_deg(180.0, false), 180.0);

        // Reverse: flipped sign convention
        assert_eq!(normalise_heading_deg(270.0, true), -90.0);
        assert_eq!(normalise_heading_deg(0.0, true), -180.0);
        assert_eq!(normalise_heading_deg(180.0, true), 0.0);
    }

    #[test]
    fn test_length_invariant_on_curved_path() {
        let drivetrain = scenario_drivetrain();
        let mut def = straight_def(false, None);
        def.waypoints = vec![
            Waypoint {
                x_ft: 0.0,
                y_ft: 0.0,
                heading_rad: 0.0,
            },
            Waypoint {
                x_ft: 8.0,
                y_ft: 3.0,
                heading_rad: 0.4,
            },
            Waypoint {
                x_ft: 16.0,
                y_ft: 2.0,
                heading_rad: 0.0,
            },
        ];

        let artifact = compile(&def, &drivetrain).unwrap();

        // Both sides always share length and per-sample cadence, even when
        // the wheels travel different distances
        assert_eq!(artifact.left().len(), artifact.right().len());
        for i in 0..artifact.num_samples() {
            assert_eq!(
                artifact.left()[i].duration_ms,
                artifact.right()[i].duration_ms
            );
        }

        // Around the bend the two sides genuinely diverge
        assert!(artifact
            .left()
            .iter()
            .zip(artifact.right().iter())
            .any(|(l, r)| l.position_ticks != r.position_ticks));
    }

    #[test]
    fn test_gen_failure_surfaces() {
        let drivetrain = scenario_drivetrain();
        let mut def = straight_def(false, None);
        def.waypoints.truncate(1);

        assert!(matches!(
            compile(&def, &drivetrain),
            Err(CompileError::GenFailed(GenError::TooFewWaypoints(1)))
        ));
    }
}
