//! Physics predictor: fit the final observed states, extrapolate to the stumps.
//!
//! # Motion model
//! Every arc is an analytic closed-form function of time:
//! - gravity only:  p(τ) = p₀ + v₀τ + ½a⃗τ²  with a⃗ = (0, 0, −g)
//! - linear drag:   v(τ) = v_t + (v₀ − v_t)e^(−kτ),
//!                  p(τ) = p₀ + v_tτ + (v₀ − v_t)(1 − e^(−kτ))/k,
//!                  terminal velocity v_t = a⃗/k
//!
//! Quadratic drag is linearized per arc at the launch speed
//! (k = ρ·C_d·A·|v₀| / 2m) so arcs stay closed form; the error over a
//! sub-second flight segment is well below the fit noise.
//!
//! # Bounce model
//! When an arc descends through z = ball radius before the stump plane, a
//! bounce event is synthesized: vertical velocity inverted and scaled by the
//! restitution coefficient, horizontal velocity scaled by the friction
//! factor, and a new arc begins at the contact point.

use crate::error::{PipelineError, Stage};
use crate::types::WorldState;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Drag coefficients below this are treated as pure ballistic flight to avoid
/// catastrophic cancellation in (1 − e^(−kτ))/k.
const K_EPS: f64 = 1e-9;

/// Minimum time into an arc for an event (bounce/plane) to register.
const T_EPS: f64 = 1e-6;

/// The final arc extends this far past the stump-plane crossing.
const PLANE_OVERRUN_S: f64 = 0.02;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Aerodynamic drag model selection. A configuration choice, never a
/// runtime-detected branch. Externally tagged: `"none"`,
/// `{"linear": {...}}` or `{"quadratic": {...}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragModel {
    /// Pure ballistic flight (gravity only).
    None,
    /// Linear drag with a fixed coefficient (1/s).
    Linear { coefficient: f64 },
    /// Quadratic drag from ball parameters, linearized per arc.
    Quadratic {
        drag_coefficient: f64,
        mass_kg: f64,
        cross_section_m2: f64,
        air_density: f64,
    },
}

impl DragModel {
    /// Reference quadratic parameters for a cricket ball.
    pub fn cricket_ball() -> Self {
        DragModel::Quadratic {
            drag_coefficient: 0.5,
            mass_kg: 0.156,
            cross_section_m2: 4.07e-3,
            air_density: 1.2,
        }
    }

    /// Effective linear coefficient for an arc launched at `speed`.
    fn linear_coefficient(&self, speed: f64) -> f64 {
        match self {
            DragModel::None => 0.0,
            DragModel::Linear { coefficient } => *coefficient,
            DragModel::Quadratic {
                drag_coefficient,
                mass_kg,
                cross_section_m2,
                air_density,
            } => air_density * drag_coefficient * cross_section_m2 * speed / (2.0 * mass_kg),
        }
    }
}

/// Configuration for the physics predictor.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PhysicsConfig {
    /// Gravitational acceleration (m/s²).
    pub gravity: f64,
    /// Drag model.
    pub drag: DragModel,
    /// Coefficient of restitution: vertical speed retained through a bounce.
    pub restitution: f64,
    /// Horizontal speed retained through a bounce.
    pub friction: f64,
    /// Number of trailing world states used for the launch fit.
    pub fit_window: usize,
    /// Minimum plausible forward speed toward the stumps (m/s).
    pub min_forward_speed: f64,
    /// Hard limit on how far past the last observation we extrapolate (s).
    pub max_extrapolation_s: f64,
    /// Safety cap on chained bounces before the stump plane.
    pub max_bounces: usize,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 9.81,
            drag: DragModel::None,
            restitution: 0.65,
            friction: 0.8,
            fit_window: 8, // ~0.27 s at 30 fps
            min_forward_speed: 0.5,
            max_extrapolation_s: 4.0,
            max_bounces: 4,
        }
    }
}

impl PhysicsConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let bad = |name: &str, value: f64| PipelineError::Configuration {
            reason: format!("physics.{name} out of range (got {value})"),
        };
        if !self.gravity.is_finite() || self.gravity <= 0.0 {
            return Err(bad("gravity", self.gravity));
        }
        if !(0.0..=1.0).contains(&self.restitution) || self.restitution == 0.0 {
            return Err(bad("restitution", self.restitution));
        }
        if !(0.0..=1.0).contains(&self.friction) || self.friction == 0.0 {
            return Err(bad("friction", self.friction));
        }
        if self.fit_window < 2 {
            return Err(PipelineError::Configuration {
                reason: format!("physics.fit_window must be at least 2 (got {})", self.fit_window),
            });
        }
        if !self.min_forward_speed.is_finite() || self.min_forward_speed <= 0.0 {
            return Err(bad("min_forward_speed", self.min_forward_speed));
        }
        if !self.max_extrapolation_s.is_finite() || self.max_extrapolation_s <= 0.0 {
            return Err(bad("max_extrapolation_s", self.max_extrapolation_s));
        }
        match self.drag {
            DragModel::None => {}
            DragModel::Linear { coefficient } => {
                if !coefficient.is_finite() || coefficient < 0.0 {
                    return Err(bad("drag.coefficient", coefficient));
                }
            }
            DragModel::Quadratic {
                drag_coefficient,
                mass_kg,
                cross_section_m2,
                air_density,
            } => {
                for (name, value) in [
                    ("drag.drag_coefficient", drag_coefficient),
                    ("drag.mass_kg", mass_kg),
                    ("drag.cross_section_m2", cross_section_m2),
                    ("drag.air_density", air_density),
                ] {
                    if !value.is_finite() || value <= 0.0 {
                        return Err(bad(name, value));
                    }
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Arcs
// ---------------------------------------------------------------------------

/// One closed-form flight segment, valid over [t_start, t_end].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicsArc {
    pub t_start: f64,
    pub t_end: f64,
    /// State at t_start.
    pub p0: Vector3<f64>,
    pub v0: Vector3<f64>,
    /// Gravitational acceleration (m/s², positive down).
    pub gravity: f64,
    /// Effective linear drag coefficient for this arc (0 = ballistic).
    pub drag_k: f64,
}

impl PhysicsArc {
    /// Position at absolute time `t` (τ = t − t_start may exceed the arc
    /// range; callers clamp through [`TrajectorySegment`]).
    pub fn position_at(&self, t: f64) -> Vector3<f64> {
        let tau = t - self.t_start;
        let accel = Vector3::new(0.0, 0.0, -self.gravity);
        if self.drag_k < K_EPS {
            self.p0 + self.v0 * tau + accel * (0.5 * tau * tau)
        } else {
            let k = self.drag_k;
            let vt = accel / k;
            let decay = 1.0 - (-k * tau).exp();
            self.p0 + vt * tau + (self.v0 - vt) * (decay / k)
        }
    }

    /// Velocity at absolute time `t`.
    pub fn velocity_at(&self, t: f64) -> Vector3<f64> {
        let tau = t - self.t_start;
        let accel = Vector3::new(0.0, 0.0, -self.gravity);
        if self.drag_k < K_EPS {
            self.v0 + accel * tau
        } else {
            let k = self.drag_k;
            let vt = accel / k;
            vt + (self.v0 - vt) * (-k * tau).exp()
        }
    }

    /// Arc-relative time at which the forward coordinate reaches `plane_x`,
    /// if it ever does.
    fn time_of_plane(&self, plane_x: f64) -> Option<f64> {
        let dx = plane_x - self.p0.x;
        if dx.abs() < 1e-12 {
            return Some(0.0);
        }
        if self.drag_k < K_EPS {
            let tau = dx / self.v0.x;
            (tau.is_finite() && tau > 0.0).then_some(tau)
        } else {
            // x(τ) = p0.x + v0.x (1 − e^(−kτ))/k  →  τ = −ln(1 − k·dx/v0.x)/k
            let u = self.drag_k * dx / self.v0.x;
            if u <= 0.0 || u >= 1.0 {
                return None; // wrong direction, or beyond the drag asymptote
            }
            Some(-(1.0 - u).ln() / self.drag_k)
        }
    }

    /// First arc-relative time in (T_EPS, horizon] at which the ball descends
    /// through `height`.
    fn time_of_descent_to(&self, height: f64, horizon: f64) -> Option<f64> {
        if horizon <= T_EPS {
            return None;
        }
        if self.drag_k < K_EPS {
            // −g/2·τ² + vz·τ + (z0 − h) = 0; the larger root is the descent.
            let g = self.gravity;
            let vz = self.v0.z;
            let dz = self.p0.z - height;
            let disc = vz * vz + 2.0 * g * dz;
            if disc < 0.0 {
                return None;
            }
            let tau = (vz + disc.sqrt()) / g;
            (tau > T_EPS && tau <= horizon).then_some(tau)
        } else {
            // Transcendental with drag: bracket by scanning, then bisect.
            // Fixed step count keeps the result deterministic.
            let steps = 1024;
            let dt = horizon / steps as f64;
            let z_rel =
                |tau: f64| self.position_at(self.t_start + tau).z - height;
            let mut prev_tau = T_EPS;
            let mut prev_z = z_rel(prev_tau);
            for i in 1..=steps {
                let tau = T_EPS + dt * i as f64;
                let z = z_rel(tau);
                if prev_z > 0.0 && z <= 0.0 {
                    let (mut lo, mut hi) = (prev_tau, tau);
                    for _ in 0..60 {
                        let mid = 0.5 * (lo + hi);
                        if z_rel(mid) > 0.0 {
                            lo = mid;
                        } else {
                            hi = mid;
                        }
                    }
                    return Some(0.5 * (lo + hi));
                }
                prev_tau = tau;
                prev_z = z;
            }
            None
        }
    }
}

/// A bounce: discontinuous velocity change where the ball meets the pitch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BounceEvent {
    pub time: f64,
    pub position: Vector3<f64>,
    pub incoming_velocity: Vector3<f64>,
    pub outgoing_velocity: Vector3<f64>,
}

/// Piecewise trajectory: time-ordered, non-overlapping arcs joined at bounce
/// events. Immutable once built; safe for multiple consumers to read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySegment {
    pub arcs: Vec<PhysicsArc>,
    pub bounces: Vec<BounceEvent>,
}

impl TrajectorySegment {
    pub fn start_time(&self) -> f64 {
        self.arcs.first().map_or(0.0, |a| a.t_start)
    }

    pub fn end_time(&self) -> f64 {
        self.arcs.last().map_or(0.0, |a| a.t_end)
    }

    fn arc_at(&self, t: f64) -> &PhysicsArc {
        self.arcs
            .iter()
            .find(|a| t <= a.t_end)
            .unwrap_or_else(|| self.arcs.last().expect("segment has at least one arc"))
    }

    /// Position at time `t`, clamped to the segment's valid range.
    /// Pure: identical inputs always yield identical outputs.
    pub fn position_at(&self, t: f64) -> Vector3<f64> {
        let t = t.clamp(self.start_time(), self.end_time());
        self.arc_at(t).position_at(t)
    }

    /// Velocity at time `t`, clamped to the segment's valid range.
    pub fn velocity_at(&self, t: f64) -> Vector3<f64> {
        let t = t.clamp(self.start_time(), self.end_time());
        self.arc_at(t).velocity_at(t)
    }

    /// Absolute time at which the trajectory crosses `plane_x`, if it does
    /// within the segment's range.
    pub fn time_at_plane(&self, plane_x: f64) -> Option<f64> {
        for arc in &self.arcs {
            if let Some(tau) = arc.time_of_plane(plane_x) {
                let t = arc.t_start + tau;
                if t <= arc.t_end + T_EPS {
                    return Some(t);
                }
            }
        }
        None
    }

    /// Evenly sampled path points for consumers that do not evaluate arcs.
    pub fn sample(&self, dt: f64) -> Vec<(f64, Vector3<f64>)> {
        let (start, end) = (self.start_time(), self.end_time());
        let mut out = Vec::new();
        let mut t = start;
        while t < end {
            out.push((t, self.position_at(t)));
            t += dt;
        }
        out.push((end, self.position_at(end)));
        out
    }
}

// ---------------------------------------------------------------------------
// Predictor
// ---------------------------------------------------------------------------

/// Fits the trailing world states and extrapolates to the stump plane.
#[derive(Debug)]
pub struct Predictor {
    pub config: PhysicsConfig,
}

impl Predictor {
    pub fn new(config: PhysicsConfig) -> Self {
        Self { config }
    }

    /// Produce a [`TrajectorySegment`] from the last observed states,
    /// reaching (slightly past) `plane_x`. `ball_radius` sets the bounce
    /// height of the ball center.
    pub fn predict(
        &self,
        states: &[WorldState],
        ball_radius: f64,
        plane_x: f64,
    ) -> Result<TrajectorySegment, PipelineError> {
        if states.len() < 2 {
            return Err(PipelineError::InsufficientData {
                stage: Stage::Predictor,
                reason: format!("need at least 2 world states, got {}", states.len()),
            });
        }

        let window = &states[states.len().saturating_sub(self.config.fit_window)..];
        let (p_launch, v_launch) = self.fit_launch_state(window)?;

        let forward_speed = -v_launch.x;
        if forward_speed < self.config.min_forward_speed {
            return Err(PipelineError::ImplausibleTrajectory {
                stage: Stage::Predictor,
                reason: format!(
                    "forward speed {forward_speed:.2} m/s below minimum {:.2} m/s",
                    self.config.min_forward_speed
                ),
            });
        }

        let t_launch = window.last().expect("window is non-empty").timestamp;
        self.build_arcs(t_launch, p_launch, v_launch, ball_radius, plane_x)
    }

    /// Per-axis least-squares line fit over the window, gravity-compensated
    /// on z, evaluated at the last timestamp. Robust against the single
    /// noisiest point, unlike taking the raw last sample.
    fn fit_launch_state(
        &self,
        window: &[WorldState],
    ) -> Result<(Vector3<f64>, Vector3<f64>), PipelineError> {
        let t_ref = window.last().expect("window is non-empty").timestamp;
        let g = self.config.gravity;

        let degenerate = || PipelineError::ImplausibleTrajectory {
            stage: Stage::Predictor,
            reason: "degenerate fit window (coincident timestamps)".into(),
        };

        let (px, vx) = line_fit(window.iter().map(|w| (w.timestamp - t_ref, w.position.x)))
            .ok_or_else(degenerate)?;
        let (py, vy) = line_fit(window.iter().map(|w| (w.timestamp - t_ref, w.position.y)))
            .ok_or_else(degenerate)?;
        // z(τ) = z₀ + vz·τ − ½g·τ²  →  z + ½g·τ² is linear in τ.
        let (pz, vz) = line_fit(window.iter().map(|w| {
            let tau = w.timestamp - t_ref;
            (tau, w.position.z + 0.5 * g * tau * tau)
        }))
        .ok_or_else(degenerate)?;

        let p = Vector3::new(px, py, pz.max(0.0));
        let v = Vector3::new(vx, vy, vz);
        if !(p.iter().all(|c| c.is_finite()) && v.iter().all(|c| c.is_finite())) {
            return Err(PipelineError::ImplausibleTrajectory {
                stage: Stage::Predictor,
                reason: "non-finite launch state from fit".into(),
            });
        }
        Ok((p, v))
    }

    fn build_arcs(
        &self,
        t_launch: f64,
        p_launch: Vector3<f64>,
        v_launch: Vector3<f64>,
        ball_radius: f64,
        plane_x: f64,
    ) -> Result<TrajectorySegment, PipelineError> {
        let deadline = t_launch + self.config.max_extrapolation_s;
        let mut arcs: Vec<PhysicsArc> = Vec::new();
        let mut bounces: Vec<BounceEvent> = Vec::new();
        let mut t = t_launch;
        let mut p = p_launch;
        let mut v = v_launch;

        loop {
            let mut arc = PhysicsArc {
                t_start: t,
                t_end: t,
                p0: p,
                v0: v,
                gravity: self.config.gravity,
                drag_k: self.config.drag.linear_coefficient(v.norm()),
            };
            let horizon = deadline - t;
            let tau_plane = arc.time_of_plane(plane_x).filter(|tau| *tau <= horizon);
            let tau_bounce = arc.time_of_descent_to(ball_radius, horizon);

            match (tau_plane, tau_bounce) {
                (Some(tp), tb) if tb.map_or(true, |tb| tp <= tb) => {
                    arc.t_end = t + tp + PLANE_OVERRUN_S;
                    arcs.push(arc);
                    return Ok(TrajectorySegment { arcs, bounces });
                }
                (_, Some(tb)) => {
                    if bounces.len() >= self.config.max_bounces {
                        return Err(PipelineError::ImplausibleTrajectory {
                            stage: Stage::Predictor,
                            reason: format!(
                                "more than {} bounces before the stump plane",
                                self.config.max_bounces
                            ),
                        });
                    }
                    let t_bounce = t + tb;
                    let mut p_bounce = arc.position_at(t_bounce);
                    p_bounce.z = ball_radius; // pin the contact height exactly
                    let v_in = arc.velocity_at(t_bounce);
                    let v_out = Vector3::new(
                        v_in.x * self.config.friction,
                        v_in.y * self.config.friction,
                        -v_in.z * self.config.restitution,
                    );
                    arc.t_end = t_bounce;
                    arcs.push(arc);
                    bounces.push(BounceEvent {
                        time: t_bounce,
                        position: p_bounce,
                        incoming_velocity: v_in,
                        outgoing_velocity: v_out,
                    });
                    t = t_bounce;
                    p = p_bounce;
                    v = v_out;
                }
                _ => {
                    return Err(PipelineError::ImplausibleTrajectory {
                        stage: Stage::Predictor,
                        reason: format!(
                            "trajectory does not reach the stump plane within {:.1} s",
                            self.config.max_extrapolation_s
                        ),
                    });
                }
            }
        }
    }
}

/// Ordinary least-squares straight-line fit: returns (intercept, slope) of
/// y = a + b·t. `None` when the abscissae are degenerate.
fn line_fit(samples: impl Iterator<Item = (f64, f64)>) -> Option<(f64, f64)> {
    let mut n = 0.0;
    let (mut st, mut sy, mut stt, mut sty) = (0.0, 0.0, 0.0, 0.0);
    for (t, y) in samples {
        n += 1.0;
        st += t;
        sy += y;
        stt += t * t;
        sty += t * y;
    }
    if n < 2.0 {
        return None;
    }
    let denom = n * stt - st * st;
    if denom.abs() < 1e-12 {
        return None;
    }
    let slope = (n * sty - st * sy) / denom;
    let intercept = (sy - slope * st) / n;
    Some((intercept, slope))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
