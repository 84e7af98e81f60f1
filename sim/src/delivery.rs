//! Ground-truth delivery models and state propagation.
//!
//! A delivery has a 6-DOF true state [px,py,pz,vx,vy,vz] and is stepped
//! forward under gravity with a restitution/friction bounce at the pitch.
//! The simulator samples this truth at the camera frame rate.

use serde::{Deserialize, Serialize};

/// Initial conditions of a simulated delivery.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeliverySpec {
    /// Release point (m): x along the pitch, y lateral, z height.
    pub release: [f64; 3],
    /// Release velocity (m/s); x component negative toward the stumps.
    pub velocity: [f64; 3],
}

/// One sampled ground-truth state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TruthSample {
    pub time: f64,
    /// [px, py, pz, vx, vy, vz]
    pub state: [f64; 6],
}

/// A simulated delivery with ground-truth state.
#[derive(Clone, Debug)]
pub struct Delivery {
    /// True state [px, py, pz, vx, vy, vz]
    pub state: [f64; 6],
    pub gravity: f64,
    pub restitution: f64,
    pub friction: f64,
    pub ball_radius: f64,
}

impl Delivery {
    pub fn release(spec: &DeliverySpec) -> Self {
        Self {
            state: [
                spec.release[0],
                spec.release[1],
                spec.release[2],
                spec.velocity[0],
                spec.velocity[1],
                spec.velocity[2],
            ],
            gravity: 9.81,
            restitution: 0.65,
            friction: 0.8,
            ball_radius: 0.036,
        }
    }

    /// Propagate the true state by `dt` seconds (ballistic + bounce).
    pub fn step(&mut self, dt: f64) {
        let s = &mut self.state;
        s[0] += s[3] * dt;
        s[1] += s[4] * dt;
        s[2] += s[5] * dt - 0.5 * self.gravity * dt * dt;
        s[5] -= self.gravity * dt;

        if s[2] < self.ball_radius && s[5] < 0.0 {
            s[2] = self.ball_radius;
            s[5] = -s[5] * self.restitution;
            s[3] *= self.friction;
            s[4] *= self.friction;
        }
    }

    /// Sample the flight at `1/frame_rate` until the ball passes
    /// `stop_at_x` (or `max_duration` elapses).
    pub fn simulate(
        mut self,
        frame_rate: f64,
        stop_at_x: f64,
        max_duration: f64,
    ) -> Vec<TruthSample> {
        let dt = 1.0 / frame_rate;
        let mut t = 0.0;
        let mut out = vec![TruthSample {
            time: t,
            state: self.state,
        }];
        while self.state[0] > stop_at_x && t < max_duration {
            self.step(dt);
            t += dt;
            out.push(TruthSample {
                time: t,
                state: self.state,
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn ballistic_step_matches_kinematics() {
        let mut d = Delivery::release(&DeliverySpec {
            release: [18.0, 0.0, 2.0],
            velocity: [-30.0, 0.0, 0.0],
        });
        d.step(0.1);
        assert_abs_diff_eq!(d.state[0], 15.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d.state[2], 2.0 - 0.5 * 9.81 * 0.01, epsilon = 1e-12);
        assert_abs_diff_eq!(d.state[5], -0.981, epsilon = 1e-12);
    }

    #[test]
    fn bounce_inverts_vertical_velocity() {
        let mut d = Delivery::release(&DeliverySpec {
            release: [10.0, 0.0, 0.05],
            velocity: [-20.0, 0.0, -3.0],
        });
        d.step(0.05);
        assert!(d.state[5] > 0.0, "vertical velocity must flip upward");
        assert_abs_diff_eq!(d.state[2], d.ball_radius, epsilon = 1e-12);
        assert_abs_diff_eq!(d.state[3], -20.0 * 0.8, epsilon = 1e-12);
    }

    #[test]
    fn simulate_stops_near_the_stumps() {
        let d = Delivery::release(&DeliverySpec {
            release: [19.0, 0.0, 1.9],
            velocity: [-28.0, 0.0, -1.0],
        });
        let truth = d.simulate(30.0, 2.0, 4.0);
        assert!(truth.len() > 10);
        assert!(truth.last().unwrap().state[0] <= 2.0);
    }
}
