//! Kinematic refinement of three-hit decay vertices.
//!
//! The closed-form vertex uses the hit times and positions as exact. The
//! refiner instead fits `(x, y, z, T)` by least squares, weighting each hit
//! by its position and time resolution, and adds a soft constraint pulling
//! the vertex towards the wall of the annihilation chamber. The fit is a
//! damped Gauss-Newton (Levenberg-Marquardt) iteration seeded with the
//! closed-form result.

use crate::decay::DecaySolver;
use nalgebra::{Matrix4, Vector3, Vector4};
use petreco_core::config::{ReconstructionConfig, RefineConfig};
use petreco_core::event::{DecayPoint, DecayStatus};
use petreco_core::SPEED_OF_LIGHT_CM_PER_PS;

/// Chi-square below which the fit is exact up to round-off.
const CHI2_FLOOR: f64 = 1e-18;
/// Damping beyond which no downhill step exists.
const MAX_DAMPING: f64 = 1e12;

/// Optional second pass over a closed-form decay vertex.
pub trait DecayRefiner: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Refines `seed` for the given hits.
    ///
    /// Returns `None` if the refinement did not converge to a physical
    /// vertex; the caller then keeps the seed.
    fn refine(
        &self,
        positions: &[Vector3<f64>; 3],
        times: &[f64; 3],
        seed: &DecayPoint,
    ) -> Option<DecayPoint>;
}

/// Least-squares fit with a soft chamber-radius constraint.
#[derive(Debug, Clone)]
pub struct ChamberRadiusRefiner {
    config: RefineConfig,
    chamber_radius_cm: f64,
    solver: DecaySolver,
}

impl ChamberRadiusRefiner {
    /// Creates a refiner from the reconstruction settings.
    #[must_use]
    pub fn new(config: &ReconstructionConfig) -> Self {
        Self {
            config: config.refine.clone(),
            chamber_radius_cm: config.chamber_radius_cm,
            solver: DecaySolver::new(config),
        }
    }

    fn hit_sigma(&self) -> f64 {
        let time_term = SPEED_OF_LIGHT_CM_PER_PS * self.config.time_sigma_ps;
        (self.config.position_sigma_cm.powi(2) + time_term.powi(2))
            .sqrt()
            .max(f64::MIN_POSITIVE)
    }

    fn radius_sigma(&self) -> f64 {
        self.config.radius_sigma_cm.max(f64::MIN_POSITIVE)
    }

    /// Residuals for parameters `(x, y, z, T)`, `T` relative to `t_ref`.
    fn residuals(
        &self,
        params: &Vector4<f64>,
        positions: &[Vector3<f64>; 3],
        tau: &[f64; 3],
    ) -> Vector4<f64> {
        let vertex = params.xyz();
        let sigma = self.hit_sigma();
        let mut r = Vector4::zeros();
        for i in 0..3 {
            let distance = (positions[i] - vertex).norm();
            r[i] = (distance - SPEED_OF_LIGHT_CM_PER_PS * (tau[i] - params.w)) / sigma;
        }
        r[3] = (vertex.xy().norm() - self.chamber_radius_cm) / self.radius_sigma();
        r
    }

    fn jacobian(&self, params: &Vector4<f64>, positions: &[Vector3<f64>; 3]) -> Matrix4<f64> {
        let vertex = params.xyz();
        let sigma = self.hit_sigma();
        let mut j = Matrix4::zeros();
        for i in 0..3 {
            let offset = vertex - positions[i];
            let distance = offset.norm();
            if distance > 0.0 {
                let grad = offset / (distance * sigma);
                j[(i, 0)] = grad.x;
                j[(i, 1)] = grad.y;
                j[(i, 2)] = grad.z;
            }
            j[(i, 3)] = SPEED_OF_LIGHT_CM_PER_PS / sigma;
        }
        let rho = vertex.xy().norm();
        if rho > 0.0 {
            let s = self.radius_sigma();
            j[(3, 0)] = vertex.x / (rho * s);
            j[(3, 1)] = vertex.y / (rho * s);
        }
        j
    }
}

impl DecayRefiner for ChamberRadiusRefiner {
    fn name(&self) -> &'static str {
        "chamber_radius"
    }

    fn refine(
        &self,
        positions: &[Vector3<f64>; 3],
        times: &[f64; 3],
        seed: &DecayPoint,
    ) -> Option<DecayPoint> {
        if !seed.is_ok() {
            return None;
        }
        let t_ref = times.iter().copied().fold(f64::INFINITY, f64::min);
        let tau = times.map(|t| t - t_ref);

        let mut params = Vector4::new(
            seed.position.x,
            seed.position.y,
            seed.position.z,
            seed.time_ps - t_ref,
        );
        let mut residuals = self.residuals(&params, positions, &tau);
        let mut chi2 = residuals.norm_squared();
        let mut lambda = 1e-3;
        let mut converged = chi2 <= CHI2_FLOOR;

        for _ in 0..self.config.max_iterations {
            if converged {
                break;
            }
            let j = self.jacobian(&params, positions);
            let jt = j.transpose();
            let jtj = jt * j;
            let gradient = jt * residuals;

            let mut damped = jtj;
            for k in 0..4 {
                damped[(k, k)] += lambda * jtj[(k, k)].max(1e-12);
            }
            let Some(step) = damped.lu().solve(&(-gradient)) else {
                lambda *= 10.0;
                converged = lambda > MAX_DAMPING;
                continue;
            };

            let trial = params + step;
            let trial_residuals = self.residuals(&trial, positions, &tau);
            let trial_chi2 = trial_residuals.norm_squared();
            if trial_chi2.is_finite() && trial_chi2 <= chi2 {
                let improvement = (chi2 - trial_chi2) / chi2.max(f64::MIN_POSITIVE);
                params = trial;
                residuals = trial_residuals;
                chi2 = trial_chi2;
                lambda = (lambda / 10.0).max(1e-12);
                converged = chi2 <= CHI2_FLOOR || improvement < self.config.tolerance;
            } else {
                lambda *= 10.0;
                converged = lambda > MAX_DAMPING;
            }
        }

        if !converged {
            log::debug!("vertex refinement did not converge (chi2 {chi2})");
            return None;
        }

        let position = params.xyz();
        let time_ps = params.w + t_ref;
        let status = self.solver.check(&position, time_ps, positions, times);
        (status == DecayStatus::Ok).then_some(DecayPoint {
            position,
            time_ps,
            status,
        })
    }
}
