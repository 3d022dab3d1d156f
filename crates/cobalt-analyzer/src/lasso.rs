//! Two-phase LASSO solver: a penalty path to select a sparse support, then
//! noise-averaged debiasing over that support with standard errors.

use ndarray::Array1;
use rand::RngCore;
use rand_distr::{Distribution, Normal};

use crate::error::AnalyzerError;
use crate::gradient::GradientEvaluator;
use crate::minimizer::{LossMinimizer, MinimizerConfig};

const RHO: f64 = 1e-3;
const L2_TO_L1_RATIO: f64 = 1e-3;
const NUM_LASSO_STEPS: usize = 100;
const MAX_EPOCHS: u32 = 20_000;
const MIN_CONVERGENCE_THRESHOLD: f64 = 1e-12;
const ZERO_THRESHOLD: f64 = 1e-6;
const NUM_RUNS: usize = 20;

/// Result of the phase-1 penalty path.
pub struct LassoPathResult {
    pub weights: Array1<f64>,
    pub support: Vec<usize>,
    pub last_l1: f64,
    pub reached_final_subproblem: bool,
    pub final_converged: bool,
}

/// Result of phase-2 exact-value/standard-error estimation.
pub struct DebiasedResult {
    pub mean: Array1<f64>,
    pub std_error: Array1<f64>,
}

pub struct LassoRunner<'a> {
    evaluator: &'a GradientEvaluator,
}

impl<'a> LassoRunner<'a> {
    #[must_use]
    pub fn new(evaluator: &'a GradientEvaluator) -> Self {
        Self { evaluator }
    }

    fn base_config(&self, convergence_threshold: f64) -> MinimizerConfig {
        MinimizerConfig {
            max_epochs: MAX_EPOCHS,
            loss_epochs: 25,
            convergence_epochs: 25,
            num_convergence_epochs: 4,
            simple_convergence_threshold: convergence_threshold,
            kkt_convergence_threshold: convergence_threshold,
            zero_threshold: ZERO_THRESHOLD,
        }
    }

    /// Runs the phase-1 LASSO path, stopping early once the candidate set
    /// reaches `max_nonzero_coeffs`, the solution's 1-norm reaches
    /// `max_solution_1_norm`, or the schedule is exhausted; then runs one
    /// final subproblem at the stricter threshold.
    pub fn run_first_rappor_step(&self, max_nonzero_coeffs: usize, max_solution_1_norm: f64) -> Result<LassoPathResult, AnalyzerError> {
        let n = self.evaluator.cols();
        if n == 0 {
            return Err(AnalyzerError::InvalidArguments("candidate matrix has no columns".into()));
        }

        let zero = Array1::zeros(n);
        let mut g0 = Array1::zeros(n);
        self.evaluator.gradient(&zero, &mut g0);
        // g0 above is (1/m) A^T(A*0 - b) = -(1/m) A^T b.
        let l1_max = g0.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()));
        let l1_min = RHO * l1_max;
        let l2 = L2_TO_L1_RATIO * l1_min;

        let g0_norm = g0.dot(&g0).sqrt();
        let mean_g0_norm = g0_norm / n as f64;
        let in_path_threshold = (1e-4 * mean_g0_norm).max(MIN_CONVERGENCE_THRESHOLD);
        let final_threshold = (1e-5 * mean_g0_norm).max(MIN_CONVERGENCE_THRESHOLD);

        if l1_max < f64::EPSILON {
            return Ok(LassoPathResult {
                weights: Array1::zeros(n),
                support: Vec::new(),
                last_l1: 0.0,
                reached_final_subproblem: true,
                final_converged: true,
            });
        }

        let l1_delta = (l1_max - l1_min) / NUM_LASSO_STEPS as f64;
        let mut weights = Array1::zeros(n);
        let mut last_l1 = l1_max;
        let mut reached_final_subproblem = false;

        let mut minimizer = LossMinimizer::new(self.evaluator, l1_max, l2, weights.clone(), self.base_config(in_path_threshold));

        for step in 0..=NUM_LASSO_STEPS {
            let l1 = (l1_max - l1_delta * step as f64).max(l1_min);
            minimizer.set_penalties(l1, l2);
            minimizer.run();
            weights = minimizer.weights().clone();
            last_l1 = l1;

            let one_norm: f64 = weights.iter().map(|v| v.abs()).sum();
            let support_count = weights.iter().filter(|&&v| v.abs() > ZERO_THRESHOLD).count();

            if support_count >= max_nonzero_coeffs || one_norm >= max_solution_1_norm || step == NUM_LASSO_STEPS {
                reached_final_subproblem = true;
                break;
            }
        }

        // Final subproblem at the stricter threshold, warm-started from the
        // last path iterate.
        let mut final_minimizer = LossMinimizer::new(self.evaluator, last_l1, l2, weights, self.base_config(final_threshold));
        final_minimizer.run();
        let final_weights = final_minimizer.weights().clone();
        let support: Vec<usize> = final_weights
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v.abs() > ZERO_THRESHOLD)
            .map(|(j, _)| j)
            .collect();

        Ok(LassoPathResult {
            weights: final_weights,
            support,
            last_l1,
            reached_final_subproblem,
            final_converged: final_minimizer.converged(),
        })
    }

    /// Phase 2: `NUM_RUNS` noise-perturbed re-solves from `initial_weights`,
    /// averaged into a mean and coordinate-wise standard deviation.
    pub fn get_exact_values_and_std_errs(
        &self,
        b: &Array1<f64>,
        sigma: &Array1<f64>,
        initial_weights: Array1<f64>,
        l1_last_phase1: f64,
        small_fraction: f64,
        l2_ratio: f64,
        rng: &mut dyn RngCore,
    ) -> DebiasedResult {
        let n = initial_weights.len();
        let l1 = small_fraction * l1_last_phase1;
        let l2 = l2_ratio * l1;
        let threshold = MIN_CONVERGENCE_THRESHOLD.max(1e-10);

        let mut runs: Vec<Array1<f64>> = Vec::with_capacity(NUM_RUNS);

        for _ in 0..NUM_RUNS {
            let perturbed_b = perturb(b, sigma, rng);
            let perturbed_evaluator = self.evaluator.with_b(perturbed_b);
            let mut minimizer = LossMinimizer::new(&perturbed_evaluator, l1, l2, initial_weights.clone(), self.base_config(threshold));
            minimizer.run();
            if minimizer.converged() {
                runs.push(minimizer.weights().clone());
            }
        }

        if runs.is_empty() {
            return DebiasedResult {
                mean: initial_weights,
                std_error: Array1::zeros(n),
            };
        }

        let mean = runs.iter().fold(Array1::zeros(n), |acc, w| acc + w) / runs.len() as f64;

        if runs.len() < 5 {
            return DebiasedResult {
                mean,
                std_error: Array1::zeros(n),
            };
        }

        let variance = runs.iter().fold(Array1::zeros(n), |acc, w| acc + (w - &mean).mapv(|v| v * v)) / (runs.len() - 1) as f64;
        let std_error = variance.mapv(f64::sqrt);

        DebiasedResult { mean, std_error }
    }
}

fn perturb(b: &Array1<f64>, sigma: &Array1<f64>, rng: &mut dyn RngCore) -> Array1<f64> {
    let mut out = Array1::zeros(b.len());
    for (i, (&bi, &si)) in b.iter().zip(sigma.iter()).enumerate() {
        let noise = if si > 0.0 {
            let normal = Normal::new(0.0, si).expect("non-negative std dev");
            normal.sample(&mut RngAdapter(rng))
        } else {
            0.0
        };
        out[i] = bi + noise;
    }
    out
}

/// Adapts a `&mut dyn RngCore` trait object to `rand::Rng`, which
/// `rand_distr::Distribution::sample` requires by value bound.
struct RngAdapter<'a>(&'a mut dyn RngCore);

impl rand::RngCore for RngAdapter<'_> {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }
    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest);
    }
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.0.try_fill_bytes(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprs::TriMat;

    fn identity_evaluator(n: usize, b: Vec<f64>) -> GradientEvaluator {
        let mut tri = TriMat::new((n, n));
        for i in 0..n {
            tri.add_triplet(i, i, 1.0);
        }
        GradientEvaluator::new(tri.to_csr(), Array1::from(b))
    }

    #[test]
    fn zero_input_yields_zero_weights_and_empty_support() {
        let eval = identity_evaluator(3, vec![0.0, 0.0, 0.0]);
        let runner = LassoRunner::new(&eval);
        let result = runner.run_first_rappor_step(3, 0.9).unwrap();
        assert!(result.weights.iter().all(|&v| v.abs() < 1e-9));
        assert!(result.support.is_empty());
    }

    #[test]
    fn recovers_sparse_solution_on_identity() {
        let eval = identity_evaluator(5, vec![2.0, 0.0, 0.0, -3.0, 0.0]);
        let runner = LassoRunner::new(&eval);
        let result = runner.run_first_rappor_step(5, 10.0).unwrap();
        assert!(result.support.contains(&0));
        assert!(result.support.contains(&3));
        assert!(result.final_converged);
    }
}
