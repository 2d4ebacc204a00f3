//! # Differential drive split
//!
//! Transforms the generated centerline trajectory into the left and right
//! wheel trajectories of a fixed-wheelbase differential drive. Each wheel
//! path is the centerline offset by half the wheelbase along the normal of
//! the sample heading; wheel position is the cumulative arc length of that
//! path, and wheel velocity/acceleration follow by finite difference.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use crate::spline::CenterSegment;
use profile_if::chan::Side;
use util::maths::norm;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One sample of a single wheel's trajectory, still in field units.
#[derive(Clone, Copy, Debug)]
pub struct WheelSegment {
    /// Wheel position on the field in feet
    pub x_ft: f64,
    pub y_ft: f64,

    /// Heading of the drive at this sample in radians, [0, 2pi)
    pub heading_rad: f64,

    /// Distance travelled by this wheel in feet
    pub position_ft: f64,

    /// Wheel velocity in ft/s
    pub velocity_ftps: f64,

    /// Wheel acceleration in ft/s^2
    pub acceleration_ftps2: f64,

    /// Sample period in seconds
    pub dt_s: f64,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Split a centerline trajectory into the two wheel trajectories.
///
/// Both outputs have the same length and cadence as the input; the sample
/// headings are shared between the sides.
pub fn split(
    center: &[CenterSegment],
    wheelbase_ft: f64,
) -> (Vec<WheelSegment>, Vec<WheelSegment>) {
    (
        wheel_trajectory(center, wheelbase_ft, Side::Left),
        wheel_trajectory(center, wheelbase_ft, Side::Right),
    )
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Trajectory of one wheel, offset half the wheelbase from the centerline.
///
/// With +X forward, +Y left and headings anticlockwise from +X, the left
/// wheel sits along the +90 degree normal of the heading.
fn wheel_trajectory(
    center: &[CenterSegment],
    wheelbase_ft: f64,
    side: Side,
) -> Vec<WheelSegment> {
    let half_base = match side {
        Side::Left => 0.5 * wheelbase_ft,
        Side::Right => -0.5 * wheelbase_ft,
    };

    let mut wheel = Vec::with_capacity(center.len());

    let mut position_ft = 0.0;
    let mut prev_point: Option<[f64; 2]> = None;
    let mut prev_velocity = 0.0;

    for seg in center {
        let point = [
            seg.x_ft - half_base * seg.heading_rad.sin(),
            seg.y_ft + half_base * seg.heading_rad.cos(),
        ];

        if let Some(prev) = prev_point {
            position_ft += norm(&prev, &point).unwrap_or(0.0);
        }

        let velocity_ftps = match prev_point {
            Some(_) if seg.dt_s > 0.0 => {
                (position_ft - wheel.last().map(|w: &WheelSegment| w.position_ft).unwrap_or(0.0))
                    / seg.dt_s
            }
            _ => 0.0,
        };

        let acceleration_ftps2 = if prev_point.is_some() && seg.dt_s > 0.0 {
            (velocity_ftps - prev_velocity) / seg.dt_s
        } else {
            0.0
        };

        wheel.push(WheelSegment {
            x_ft: point[0],
            y_ft: point[1],
            heading_rad: seg.heading_rad,
            position_ft,
            velocity_ftps,
            acceleration_ftps2,
            dt_s: seg.dt_s,
        });

        prev_point = Some(point);
        prev_velocity = velocity_ftps;
    }

    wheel
}
