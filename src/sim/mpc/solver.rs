//! Solver collaborator and the default projected-gradient implementation.

use std::time::Instant;

use num_dual::Dual64;
use tracing::debug;

use super::{MpcProblem, Trajectory};
use crate::error::SolveFailure;

/// Solves an [`MpcProblem`] within its iteration/time budget.
///
/// Implementations never touch entity state; the supervisor decides what to
/// do with a failure.
pub trait OptimalControlSolver: Send + Sync {
    fn solve(&self, problem: &MpcProblem) -> Result<Trajectory, SolveFailure>;
}

/// Box-constrained projected gradient descent with Armijo backtracking.
///
/// Gradients are exact, computed column by column with forward-mode dual
/// numbers through the same rollout used to evaluate the objective. The
/// iterate starts fully closed.
#[derive(Debug, Clone, Copy)]
pub struct ProjectedGradientSolver {
    /// Stop once no coordinate moves more than this under a unit projected step.
    pub tolerance: f64,
    /// Sufficient-decrease constant of the line search.
    pub armijo: f64,
    pub max_backtracks: usize,
}

impl Default for ProjectedGradientSolver {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            armijo: 1e-4,
            max_backtracks: 60,
        }
    }
}

fn project(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

fn gradient(problem: &MpcProblem, x: &[f64]) -> Vec<f64> {
    let mut seeded: Vec<Dual64> = x.iter().map(|&v| Dual64::from(v)).collect();
    (0..x.len())
        .map(|j| {
            seeded[j] = Dual64::new(x[j], 1.0);
            let d = problem.objective(&seeded).eps;
            seeded[j] = Dual64::from(x[j]);
            d
        })
        .collect()
}

impl ProjectedGradientSolver {
    fn check_budget(&self, problem: &MpcProblem, started: Instant) -> Result<(), SolveFailure> {
        if let Some(limit) = problem.time_limit {
            let elapsed = started.elapsed();
            if elapsed > limit {
                return Err(SolveFailure::TimeLimit { elapsed });
            }
        }
        Ok(())
    }
}

impl OptimalControlSolver for ProjectedGradientSolver {
    fn solve(&self, problem: &MpcProblem) -> Result<Trajectory, SolveFailure> {
        problem.check()?;
        let started = Instant::now();

        let mut x = vec![0.0; problem.num_decisions()];
        let mut f = problem.objective(&x);
        if !f.is_finite() {
            return Err(SolveFailure::NonFinite);
        }

        for iteration in 0..problem.max_iterations {
            self.check_budget(problem, started)?;

            let g = gradient(problem, &x);
            if g.iter().any(|v| !v.is_finite()) {
                return Err(SolveFailure::NonFinite);
            }
            let stationarity = x
                .iter()
                .zip(&g)
                .map(|(xi, gi)| (project(xi - gi) - xi).abs())
                .fold(0.0, f64::max);
            if stationarity <= self.tolerance {
                debug!(iteration, objective = f, "projected gradient converged");
                return Ok(problem.trajectory(&x, iteration));
            }

            let g_max = g.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
            let mut alpha = 1.0 / g_max;
            let mut accepted = None;
            for _ in 0..self.max_backtracks {
                let trial: Vec<f64> = x
                    .iter()
                    .zip(&g)
                    .map(|(xi, gi)| project(xi - alpha * gi))
                    .collect();
                let decrease: f64 = trial
                    .iter()
                    .zip(&x)
                    .zip(&g)
                    .map(|((ti, xi), gi)| gi * (ti - xi))
                    .sum();
                let f_trial = problem.objective(&trial);
                if f_trial.is_finite() && f_trial <= f + self.armijo * decrease {
                    accepted = Some((trial, f_trial));
                    break;
                }
                alpha *= 0.5;
            }

            // No sufficient decrease along the projected arc: stationary to
            // working precision.
            let Some((trial, f_trial)) = accepted else {
                debug!(iteration, objective = f, "line search exhausted");
                return Ok(problem.trajectory(&x, iteration));
            };
            let moved = trial
                .iter()
                .zip(&x)
                .fold(0.0_f64, |m, (a, b)| m.max((a - b).abs()));
            x = trial;
            let improvement = f - f_trial;
            f = f_trial;
            if moved <= self.tolerance || improvement <= 1e-15 * (1.0 + f.abs()) {
                debug!(iteration, objective = f, "projected gradient stalled");
                return Ok(problem.trajectory(&x, iteration + 1));
            }
        }

        Err(SolveFailure::IterationLimit {
            iterations: problem.max_iterations,
        })
    }
}
