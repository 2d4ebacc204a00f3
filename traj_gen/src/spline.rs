//! # Trajectory generator
//!
//! Fits a cubic spline centerline through the maneuver waypoints and samples
//! it at the configured period under trapezoidal velocity/acceleration limits
//! with a jerk-bounded acceleration slew. This is the "generator" seam of the
//! compiler: everything downstream treats its output as an opaque discretised
//! centerline trajectory.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{DMatrix, DVector};

// Internal
use crate::path_def::{GenSettings, Waypoint};
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One sample of the generated centerline trajectory.
#[derive(Clone, Copy, Debug)]
pub struct CenterSegment {
    /// Position on the field in feet
    pub x_ft: f64,
    pub y_ft: f64,

    /// Heading in radians, in the range [0, 2pi)
    pub heading_rad: f64,

    /// Distance travelled along the centerline in feet
    pub position_ft: f64,

    /// Centerline velocity in ft/s
    pub velocity_ftps: f64,

    /// Centerline acceleration in ft/s^2
    pub acceleration_ftps2: f64,

    /// Sample period in seconds
    pub dt_s: f64,
}

/// A one dimensional natural cubic spline.
struct Spline {
    knots: Vec<f64>,
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    d: Vec<f64>,
}

/// A 2D spline parameterised by distance along the waypoint chord.
struct Spline2D {
    s_end: f64,
    sx: Spline,
    sy: Spline,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Potential errors raised during trajectory generation.
///
/// Any of these means the waypoint set or settings are infeasible: generation
/// fails outright rather than producing a degenerate trajectory.
#[derive(Debug, thiserror::Error)]
pub enum GenError {
    #[error("At least 2 waypoints are required, found {0}")]
    TooFewWaypoints(usize),

    #[error("Waypoint {0} contains a non-finite coordinate")]
    NonFiniteWaypoint(usize),

    #[error("Unsupported spline fit order {0}, only cubic (3) is supported")]
    UnsupportedFitOrder(u32),

    #[error("The waypoints describe a zero length path")]
    ZeroLengthPath,

    #[error("The spline fit is singular, are there duplicate waypoints?")]
    SingularFit,

    #[error("Generation exceeded the sample ceiling of {0}")]
    SampleCeilingExceeded(usize),

    #[error("Generation settings are invalid: {0}")]
    InvalidSettings(&'static str),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Generate the discretised centerline trajectory for the given waypoints.
pub fn generate(
    waypoints: &[Waypoint],
    settings: &GenSettings,
) -> Result<Vec<CenterSegment>, GenError> {
    validate(waypoints, settings)?;

    let spline = Spline2D::fit(waypoints)?;

    if spline.s_end <= 0.0 {
        return Err(GenError::ZeroLengthPath);
    }

    profile(&spline, settings)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn validate(waypoints: &[Waypoint], settings: &GenSettings) -> Result<(), GenError> {
    if waypoints.len() < 2 {
        return Err(GenError::TooFewWaypoints(waypoints.len()));
    }

    for (i, wp) in waypoints.iter().enumerate() {
        if !wp.x_ft.is_finite() || !wp.y_ft.is_finite() || !wp.heading_rad.is_finite() {
            return Err(GenError::NonFiniteWaypoint(i));
        }
    }

    if settings.fit_order != 3 {
        return Err(GenError::UnsupportedFitOrder(settings.fit_order));
    }

    if settings.period_s <= 0.0 {
        return Err(GenError::InvalidSettings("sample period must be positive"));
    }

    if settings.max_velocity_ftps <= 0.0
        || settings.max_acceleration_ftps2 <= 0.0
        || settings.max_jerk_ftps3 <= 0.0
    {
        return Err(GenError::InvalidSettings("motion limits must be positive"));
    }

    Ok(())
}

/// Run the velocity profile over the spline, emitting one segment per period.
///
/// The velocity at each step chases the lower of the velocity limit and the
/// braking envelope `sqrt(2 a_max remaining)`. The jerk limit bounds how
/// fast acceleration builds up; shedding acceleration is immediate so the
/// profile never overshoots the velocity limit or the stop point. A small
/// velocity floor keeps the integration progressing through the zero-speed
/// start.
fn profile(spline: &Spline2D, settings: &GenSettings) -> Result<Vec<CenterSegment>, GenError> {
    let dt = settings.period_s;
    let v_max = settings.max_velocity_ftps;
    let a_max = settings.max_acceleration_ftps2;
    let jerk = settings.max_jerk_ftps3;
    let s_end = spline.s_end;

    let v_floor = (a_max * dt).min(v_max);

    let mut segments: Vec<CenterSegment> = Vec::new();
    let mut s = 0.0f64;
    let mut v = 0.0f64;
    let mut a = 0.0f64;

    loop {
        if segments.len() >= settings.samples_ceiling {
            return Err(GenError::SampleCeilingExceeded(settings.samples_ceiling));
        }

        let s_clamped = s.min(s_end);
        let (x, y) = spline.position(s_clamped);
        let heading = wrap_2pi(spline.yaw(s_clamped));

        segments.push(CenterSegment {
            x_ft: x,
            y_ft: y,
            heading_rad: heading,
            position_ft: s_clamped,
            velocity_ftps: v,
            acceleration_ftps2: a,
            dt_s: dt,
        });

        if s >= s_end {
            break;
        }

        // Chase the velocity target under the acceleration and jerk limits
        let v_brake = (2.0 * a_max * (s_end - s)).sqrt();
        let v_target = v_max.min(v_brake);
        let a_demand = clamp(&((v_target - v) / dt), &-a_max, &a_max);
        a = if a_demand < a {
            a_demand
        } else {
            (a + jerk * dt).min(a_demand)
        };

        v = (v + a * dt).max(v_floor);
        s += v * dt;
    }

    Ok(segments)
}

/// Wrap an angle into the range [0, 2pi).
fn wrap_2pi(angle_rad: f64) -> f64 {
    let tau = std::f64::consts::TAU;
    let wrapped = angle_rad % tau;
    if wrapped < 0.0 {
        wrapped + tau
    } else {
        wrapped
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Spline {
    /// Fit a natural cubic spline through `(knots[i], values[i])`.
    fn fit(knots: &[f64], values: &[f64]) -> Result<Self, GenError> {
        let n = knots.len();

        let mut h = Vec::with_capacity(n - 1);
        for i in 0..n - 1 {
            h.push(knots[i + 1] - knots[i]);
        }

        if h.iter().any(|dh| *dh <= 0.0) {
            return Err(GenError::SingularFit);
        }

        // Tridiagonal system for the second-derivative coefficients, natural
        // boundary conditions at both ends
        let mut mat = DMatrix::<f64>::zeros(n, n);
        let mut rhs = DVector::<f64>::zeros(n);

        mat[(0, 0)] = 1.0;
        mat[(n - 1, n - 1)] = 1.0;

        for i in 1..n - 1 {
            mat[(i, i - 1)] = h[i - 1];
            mat[(i, i)] = 2.0 * (h[i - 1] + h[i]);
            mat[(i, i + 1)] = h[i];
            rhs[i] = 3.0 * (values[i + 1] - values[i]) / h[i]
                - 3.0 * (values[i] - values[i - 1]) / h[i - 1];
        }

        let c_vec = match mat.lu().solve(&rhs) {
            Some(c) => c,
            None => return Err(GenError::SingularFit),
        };

        let a: Vec<f64> = values.to_vec();
        let c: Vec<f64> = c_vec.iter().copied().collect();
        let mut b = Vec::with_capacity(n - 1);
        let mut d = Vec::with_capacity(n - 1);

        for i in 0..n - 1 {
            b.push((a[i + 1] - a[i]) / h[i] - h[i] * (c[i + 1] + 2.0 * c[i]) / 3.0);
            d.push((c[i + 1] - c[i]) / (3.0 * h[i]));
        }

        Ok(Self {
            knots: knots.to_vec(),
            a,
            b,
            c,
            d,
        })
    }

    /// Evaluate the spline at `t`.
    fn calc(&self, t: f64) -> f64 {
        let i = self.segment_index(t);
        let dx = t - self.knots[i];
        self.a[i] + self.b[i] * dx + self.c[i] * dx.powi(2) + self.d[i] * dx.powi(3)
    }

    /// Evaluate the first derivative of the spline at `t`.
    fn calc_d(&self, t: f64) -> f64 {
        let i = self.segment_index(t);
        let dx = t - self.knots[i];
        self.b[i] + 2.0 * self.c[i] * dx + 3.0 * self.d[i] * dx.powi(2)
    }

    /// Index of the spline segment containing `t`.
    fn segment_index(&self, t: f64) -> usize {
        let n_seg = self.knots.len() - 1;
        match self.knots[1..].iter().position(|k| t < *k) {
            Some(i) => i,
            None => n_seg - 1,
        }
    }
}

impl Spline2D {
    /// Fit the centerline spline through the waypoints, parameterised by
    /// cumulative distance between them.
    fn fit(waypoints: &[Waypoint]) -> Result<Self, GenError> {
        let mut s = Vec::with_capacity(waypoints.len());
        s.push(0.0);
        for pair in waypoints.windows(2) {
            let ds = util::maths::norm(
                &[pair[0].x_ft, pair[0].y_ft],
                &[pair[1].x_ft, pair[1].y_ft],
            )
            .unwrap_or(0.0);
            s.push(s.last().copied().unwrap_or(0.0) + ds);
        }

        let x: Vec<f64> = waypoints.iter().map(|wp| wp.x_ft).collect();
        let y: Vec<f64> = waypoints.iter().map(|wp| wp.y_ft).collect();

        Ok(Self {
            s_end: s.last().copied().unwrap_or(0.0),
            sx: Spline::fit(&s, &x)?,
            sy: Spline::fit(&s, &y)?,
        })
    }

    /// Field position at distance `s` along the centerline.
    fn position(&self, s: f64) -> (f64, f64) {
        (self.sx.calc(s), self.sy.calc(s))
    }

    /// Heading of the centerline tangent at distance `s`.
    fn yaw(&self, s: f64) -> f64 {
        self.sy.calc_d(s).atan2(self.sx.calc_d(s))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn settings() -> GenSettings {
        GenSettings {
            fit_order: 3,
            samples_ceiling: 100_000,
            period_s: 0.02,
            max_velocity_ftps: 7.0,
            max_acceleration_ftps2: 10.0,
            max_jerk_ftps3: 30.0,
        }
    }

    fn waypoint(x_ft: f64, y_ft: f64) -> Waypoint {
        Waypoint {
            x_ft,
            y_ft,
            heading_rad: 0.0,
        }
    }

    #[test]
    fn test_straight_line() {
        let segments =
            generate(&[waypoint(0.0, 0.0), waypoint(4.0, 0.0)], &settings()).unwrap();

        // Starts at rest at the origin and ends at the far waypoint
        assert_eq!(segments[0].position_ft, 0.0);
        assert_eq!(segments[0].velocity_ftps, 0.0);
        let last = segments.last().unwrap();
        assert!((last.position_ft - 4.0).abs() < 1e-9);

        for pair in segments.windows(2) {
            // Position is monotonic and the limits are respected
            assert!(pair[1].position_ft >= pair[0].position_ft);
            assert!(pair[1].velocity_ftps <= settings().max_velocity_ftps + 1e-9);

            // Straight line along +X holds heading 0
            assert!(pair[1].heading_rad.abs() < 1e-6);
            assert!(pair[1].y_ft.abs() < 1e-9);
        }
    }

    #[test]
    fn test_curved_path_heading() {
        let segments = generate(
            &[waypoint(0.0, 0.0), waypoint(4.0, 2.0), waypoint(8.0, 0.0)],
            &settings(),
        )
        .unwrap();

        // The path bends left then right, so some headings must be non-zero
        assert!(segments.iter().any(|seg| seg.heading_rad > 1e-3));
    }

    #[test]
    fn test_infeasible_inputs() {
        assert!(matches!(
            generate(&[waypoint(0.0, 0.0)], &settings()),
            Err(GenError::TooFewWaypoints(1))
        ));

        assert!(matches!(
            generate(&[waypoint(0.0, 0.0), waypoint(0.0, 0.0)], &settings()),
            Err(GenError::SingularFit)
        ));

        let mut quintic = settings();
        quintic.fit_order = 5;
        assert!(matches!(
            generate(&[waypoint(0.0, 0.0), waypoint(4.0, 0.0)], &quintic),
            Err(GenError::UnsupportedFitOrder(5))
        ));

        let mut tiny_ceiling = settings();
        tiny_ceiling.samples_ceiling = 3;
        assert!(matches!(
            generate(&[waypoint(0.0, 0.0), waypoint(4.0, 0.0)], &tiny_ceiling),
            Err(GenError::SampleCeilingExceeded(3))
        ));
    }

    #[test]
    fn test_non_finite_waypoint() {
        let wps = [waypoint(0.0, 0.0), waypoint(f64::NAN, 0.0)];
        assert!(matches!(
            generate(&wps, &settings()),
            Err(GenError::NonFiniteWaypoint(1))
        ));
    }
}
