//! Closed-form decay vertex of a three-photon event.
//!
//! Three photons emitted at one point and time reach the three hits at
//! `|P_i - X| = c (t_i - T)`. The decay point lies in the plane of the hits,
//! so the hits are rotated into the xy-plane first. Subtracting the first
//! equation from the other two leaves a linear system `A X = B T + D`, which
//! gives `X = E T + F`. Substituting back into the first equation gives a
//! quadratic in `T`.
//!
//! Of the real roots, the candidates inside the physical region are kept
//! and the one with the later decay time is taken. The physical region is
//! defined by three checks:
//! - the decay precedes the first hit by at most the configured lead;
//! - the decay is no further from the detector axis than the innermost hit;
//! - the decay is within half a strip length of the centre along z.
//!
//! Times are shifted to the earliest hit while solving to keep the quadratic
//! well conditioned.

use nalgebra::{Matrix2, Rotation3, Vector2, Vector3};
use petreco_core::config::ReconstructionConfig;
use petreco_core::event::{DecayPoint, DecayStatus};
use petreco_core::hit::Hit;
use petreco_core::SPEED_OF_LIGHT_CM_PER_PS;
use std::f64::consts::PI;

/// Relative size below which the hit-plane normal counts as degenerate.
const DEGENERATE_NORMAL: f64 = 1e-12;
/// Slack on the lead check for round-off (ps).
const LEAD_TOLERANCE_PS: f64 = 1e-3;
/// Slack on the geometric checks for round-off (cm).
const POSITION_TOLERANCE_CM: f64 = 1e-9;

/// Solves the three-hit decay vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct DecaySolver {
    scintillator_length_cm: f64,
    max_decay_lead_ps: f64,
}

impl Default for DecaySolver {
    fn default() -> Self {
        Self::new(&ReconstructionConfig::default())
    }
}

impl DecaySolver {
    /// Creates a solver with the physical limits of a configuration.
    #[must_use]
    pub fn new(config: &ReconstructionConfig) -> Self {
        Self {
            scintillator_length_cm: config.scintillator_length_cm,
            max_decay_lead_ps: config.max_decay_lead_ps,
        }
    }

    /// Solves for three hits.
    #[must_use]
    pub fn solve(&self, hits: [&Hit; 3]) -> DecayPoint {
        let positions = hits.map(Hit::position);
        let times = hits.map(|hit| hit.time_ps);
        self.solve_points(&positions, &times)
    }

    /// Solves for three positions (cm) and times (ps).
    #[must_use]
    pub fn solve_points(&self, positions: &[Vector3<f64>; 3], times: &[f64; 3]) -> DecayPoint {
        let inputs_finite = positions.iter().all(|p| p.iter().all(|v| v.is_finite()))
            && times.iter().all(|t| t.is_finite());
        if !inputs_finite {
            return DecayPoint::failed(DecayStatus::NumericallyInvalid);
        }

        let [p0, p1, p2] = positions;
        let e1 = p1 - p0;
        let e2 = p2 - p0;
        let normal = e1.cross(&e2);
        let scale = e1.norm() * e2.norm();
        if scale == 0.0 || normal.norm() <= DEGENERATE_NORMAL * scale {
            return DecayPoint::failed(DecayStatus::NumericallyInvalid);
        }

        let rotation = to_xy_plane(&normal);
        let q = (*positions).map(|p| rotation * p);
        let z_plane = (q[0].z + q[1].z + q[2].z) / 3.0;
        let q = q.map(|p| Vector2::new(p.x, p.y));

        let t_ref = times.iter().copied().fold(f64::INFINITY, f64::min);
        let tau = times.map(|t| t - t_ref);
        let c2 = SPEED_OF_LIGHT_CM_PER_PS * SPEED_OF_LIGHT_CM_PER_PS;

        let a = Matrix2::new(
            2.0 * (q[1].x - q[0].x),
            2.0 * (q[1].y - q[0].y),
            2.0 * (q[2].x - q[0].x),
            2.0 * (q[2].y - q[0].y),
        );
        let b = Vector2::new(2.0 * c2 * (tau[1] - tau[0]), 2.0 * c2 * (tau[2] - tau[0]));
        let d = Vector2::new(
            q[1].norm_squared() - q[0].norm_squared() - c2 * (tau[1] * tau[1] - tau[0] * tau[0]),
            q[2].norm_squared() - q[0].norm_squared() - c2 * (tau[2] * tau[2] - tau[0] * tau[0]),
        );
        let Some(a_inv) = a.try_inverse() else {
            return DecayPoint::failed(DecayStatus::NumericallyInvalid);
        };
        let e = a_inv * b;
        let f = a_inv * d;
        let g = f - q[0];

        let qa = e.norm_squared() - c2;
        let qb = 2.0 * e.dot(&g) + 2.0 * c2 * tau[0];
        let qc = g.norm_squared() - c2 * tau[0] * tau[0];

        let roots = match solve_quadratic(qa, qb, qc, e.norm_squared() + c2) {
            Roots::Real(roots) => roots,
            Roots::NoReal => return DecayPoint::failed(DecayStatus::NoRealSolution),
            Roots::Degenerate => return DecayPoint::failed(DecayStatus::NumericallyInvalid),
        };

        let back = rotation.inverse();
        let candidates: Vec<DecayPoint> = roots
            .into_iter()
            .map(|t| {
                let x = e * t + f;
                let position = back * Vector3::new(x.x, x.y, z_plane);
                let time_ps = t + t_ref;
                DecayPoint {
                    position,
                    time_ps,
                    status: self.check(&position, time_ps, positions, times),
                }
            })
            .collect();

        let latest = |status: DecayStatus| {
            candidates
                .iter()
                .filter(|c| c.status == status)
                .max_by(|x, y| x.time_ps.total_cmp(&y.time_ps))
                .copied()
        };
        latest(DecayStatus::Ok)
            .or_else(|| latest(DecayStatus::OutOfPhysicalRange))
            .unwrap_or_else(|| DecayPoint::failed(DecayStatus::NumericallyInvalid))
    }

    /// Classifies a candidate vertex against the physical region.
    #[must_use]
    pub fn check(
        &self,
        position: &Vector3<f64>,
        time_ps: f64,
        positions: &[Vector3<f64>; 3],
        times: &[f64; 3],
    ) -> DecayStatus {
        if !time_ps.is_finite() || position.iter().any(|v| !v.is_finite()) {
            return DecayStatus::NumericallyInvalid;
        }

        let first_hit = times.iter().copied().fold(f64::INFINITY, f64::min);
        let lead = first_hit - time_ps;
        if lead < -LEAD_TOLERANCE_PS || lead > self.max_decay_lead_ps {
            return DecayStatus::OutOfPhysicalRange;
        }

        let innermost = positions
            .iter()
            .map(|p| p.xy().norm())
            .fold(f64::INFINITY, f64::min);
        if position.xy().norm() > innermost + POSITION_TOLERANCE_CM {
            return DecayStatus::OutOfPhysicalRange;
        }

        if position.z.abs() > self.scintillator_length_cm / 2.0 + POSITION_TOLERANCE_CM {
            return DecayStatus::OutOfPhysicalRange;
        }
        DecayStatus::Ok
    }
}

/// Rotation taking `normal` onto the z axis.
fn to_xy_plane(normal: &Vector3<f64>) -> Rotation3<f64> {
    Rotation3::rotation_between(normal, &Vector3::z())
        .unwrap_or_else(|| Rotation3::from_axis_angle(&Vector3::x_axis(), PI))
}

enum Roots {
    Real(Vec<f64>),
    NoReal,
    Degenerate,
}

/// Real roots of `a t^2 + b t + c`, falling back to the linear equation
/// when `a` is negligible relative to `scale`.
fn solve_quadratic(a: f64, b: f64, c: f64, scale: f64) -> Roots {
    if !(a.is_finite() && b.is_finite() && c.is_finite()) {
        return Roots::Degenerate;
    }
    if a.abs() <= 1e-12 * scale {
        if b == 0.0 {
            return Roots::Degenerate;
        }
        return Roots::Real(vec![-c / b]);
    }

    let mut discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        // Tangent solutions can come out slightly negative.
        if discriminant < -1e-12 * b * b {
            return Roots::NoReal;
        }
        discriminant = 0.0;
    }
    let q = -0.5 * (b + b.signum() * discriminant.sqrt());
    if q == 0.0 {
        return Roots::Real(vec![0.0]);
    }
    Roots::Real(vec![q / a, c / q])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const C: f64 = SPEED_OF_LIGHT_CM_PER_PS;

    fn emit(origin: Vector3<f64>, t0: f64, targets: [Vector3<f64>; 3]) -> [f64; 3] {
        targets.map(|p| t0 + (p - origin).norm() / C)
    }

    #[test]
    fn test_ring_round_trip() {
        let r = 70.710_678;
        let positions = [
            Vector3::new(r, r, 0.0),
            Vector3::new(-r, r, 0.0),
            Vector3::new(r, -r, 0.0),
        ];
        let truth = Vector3::new(25.0, 25.0, 0.0);
        let times = emit(truth, 0.0, positions);

        let point = DecaySolver::default().solve_points(&positions, &times);
        assert_eq!(point.status, DecayStatus::Ok);
        assert_relative_eq!(point.position, truth, epsilon = 1e-6);
        assert_relative_eq!(point.time_ps, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_tilted_plane_round_trip() {
        let normal = Vector3::new(0.3, 0.2, 1.0).normalize();
        let u = normal.cross(&Vector3::x()).normalize();
        let v = normal.cross(&u);
        let truth = Vector3::new(1.0, -2.0, 3.0);
        let positions = [(10.0_f64, 40.0), (130.0, 45.0), (250.0, 50.0)].map(|(phi, s)| {
            let phi = phi.to_radians();
            truth + (u * phi.cos() + v * phi.sin()) * s
        });
        let times = emit(truth, 100.0, positions);

        let point = DecaySolver::default().solve_points(&positions, &times);
        assert_eq!(point.status, DecayStatus::Ok);
        assert_relative_eq!(point.position, truth, epsilon = 1e-6);
        assert_relative_eq!(point.time_ps, 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_collinear_hits_are_invalid() {
        let positions = [
            Vector3::new(-40.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(40.0, 0.0, 0.0),
        ];
        let point = DecaySolver::default().solve_points(&positions, &[0.0, 10.0, 20.0]);
        assert_eq!(point.status, DecayStatus::NumericallyInvalid);
        assert!(point.position.x.is_nan());
    }

    #[test]
    fn test_nan_input_is_invalid() {
        let positions = [
            Vector3::new(40.0, 0.0, 0.0),
            Vector3::new(0.0, 40.0, 0.0),
            Vector3::new(-40.0, 0.0, 0.0),
        ];
        let point = DecaySolver::default().solve_points(&positions, &[0.0, f64::NAN, 20.0]);
        assert_eq!(point.status, DecayStatus::NumericallyInvalid);
    }

    #[test]
    fn test_inconsistent_times_have_no_real_solution() {
        // Simultaneous hits would need a point equidistant from all three,
        // but a large spread in time at short distances cannot be met.
        let positions = [
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(-1.0, 0.0, 0.0),
        ];
        let status = DecaySolver::default()
            .solve_points(&positions, &[0.0, 1_000.0, 2_000.0])
            .status;
        assert_ne!(status, DecayStatus::Ok);
    }

    #[test]
    fn test_vertex_outside_strip_length_is_rejected() {
        let solver = DecaySolver::new(&ReconstructionConfig::default().with_chamber(10.0, 4.0));
        let positions = [
            Vector3::new(40.0, 0.0, 3.0),
            Vector3::new(-20.0, 34.641, 3.0),
            Vector3::new(-20.0, -34.641, 3.0),
        ];
        let truth = Vector3::new(0.0, 0.0, 3.0);
        let times = emit(truth, 0.0, positions);
        let point = solver.solve_points(&positions, &times);
        assert_eq!(point.status, DecayStatus::OutOfPhysicalRange);
    }

    #[test]
    fn test_check_limits() {
        let solver = DecaySolver::default();
        let positions = [
            Vector3::new(40.0, 0.0, 0.0),
            Vector3::new(0.0, 40.0, 0.0),
            Vector3::new(-40.0, 0.0, 0.0),
        ];
        let times = [1_000.0, 1_100.0, 1_200.0];
        let origin = Vector3::zeros();
        assert_eq!(solver.check(&origin, 0.0, &positions, &times), DecayStatus::Ok);
        assert_eq!(
            solver.check(&origin, 1_500.0, &positions, &times),
            DecayStatus::OutOfPhysicalRange
        );
        assert_eq!(
            solver.check(&Vector3::new(45.0, 0.0, 0.0), 0.0, &positions, &times),
            DecayStatus::OutOfPhysicalRange
        );
        assert_eq!(
            solver.check(&origin, f64::NAN, &positions, &times),
            DecayStatus::NumericallyInvalid
        );
    }

    #[test]
    fn test_quadratic_roots() {
        match solve_quadratic(1.0, -3.0, 2.0, 1.0) {
            Roots::Real(mut roots) => {
                roots.sort_by(f64::total_cmp);
                assert_relative_eq!(roots[0], 1.0);
                assert_relative_eq!(roots[1], 2.0);
            }
            _ => panic!("expected real roots"),
        }
        assert!(matches!(solve_quadratic(1.0, 0.0, 1.0, 1.0), Roots::NoReal));
        assert!(matches!(solve_quadratic(0.0, 2.0, -4.0, 1.0), Roots::Real(r) if r == vec![2.0]));
    }
}
