//! Proximal-gradient minimizer for `L(w) + (l2/2)||w||^2 + l1||w||_1`,
//! driven by Parallel Boosting with Momentum.

use ndarray::Array1;

use crate::gradient::GradientEvaluator;

fn prox_l1(w: &Array1<f64>, thresholds: &Array1<f64>) -> Array1<f64> {
    ndarray::Zip::from(w).and(thresholds).map_collect(|&wi, &ti| wi.signum() * (wi.abs() - ti).max(0.0))
}

#[derive(Debug, Clone, Copy)]
pub struct MinimizerConfig {
    pub max_epochs: u32,
    pub loss_epochs: u32,
    pub convergence_epochs: u32,
    pub num_convergence_epochs: usize,
    pub simple_convergence_threshold: f64,
    pub kkt_convergence_threshold: f64,
    pub zero_threshold: f64,
}

pub struct LossMinimizer<'a> {
    evaluator: &'a GradientEvaluator,
    l1: f64,
    l2: f64,
    config: MinimizerConfig,
    weights: Array1<f64>,
    learning_rates: Array1<f64>,
    curvature: Array1<f64>,
    sparsity: f64,
    losses: Vec<f64>,
    converged: bool,
    reached_solution: bool,
    epochs_run: u32,
}

impl<'a> LossMinimizer<'a> {
    #[must_use]
    pub fn new(evaluator: &'a GradientEvaluator, l1: f64, l2: f64, initial_weights: Array1<f64>, config: MinimizerConfig) -> Self {
        let curvature = evaluator.per_coordinate_curvature();
        let sparsity = evaluator.sparsity();
        let learning_rates = Self::compute_learning_rates(&curvature, sparsity, l2);
        Self {
            evaluator,
            l1,
            l2,
            config,
            weights: initial_weights,
            learning_rates,
            curvature,
            sparsity,
            losses: Vec::new(),
            converged: false,
            reached_solution: false,
            epochs_run: 0,
        }
    }

    fn compute_learning_rates(curvature: &Array1<f64>, sparsity: f64, l2: f64) -> Array1<f64> {
        curvature.mapv(|c| 1.0 / (sparsity * (c + l2)))
    }

    /// Changes the L1/L2 penalties for a subsequent warm-started run.
    /// Learning rates are recomputed since they depend on `l2`.
    pub fn set_penalties(&mut self, l1: f64, l2: f64) {
        self.l1 = l1;
        self.l2 = l2;
        self.learning_rates = Self::compute_learning_rates(&self.curvature, self.sparsity, l2);
    }

    #[must_use]
    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    #[must_use]
    pub fn converged(&self) -> bool {
        self.converged
    }

    #[must_use]
    pub fn reached_solution(&self) -> bool {
        self.reached_solution
    }

    #[must_use]
    pub fn epochs_run(&self) -> u32 {
        self.epochs_run
    }

    fn objective(&self, w: &Array1<f64>) -> f64 {
        self.evaluator.loss(w) + (self.l2 / 2.0) * w.dot(w) + self.l1 * w.iter().map(|v| v.abs()).sum::<f64>()
    }

    fn gradient_at(&self, w: &Array1<f64>) -> Array1<f64> {
        let mut g = Array1::zeros(w.len());
        self.evaluator.gradient(w, &mut g);
        g += &(self.l2 * w);
        g
    }

    fn kkt_residual(&self) -> f64 {
        let g = self.gradient_at(&self.weights);
        let mut sum_sq = 0.0;
        for (j, &wj) in self.weights.iter().enumerate() {
            let e = if wj > self.config.zero_threshold {
                g[j] + self.l1
            } else if wj < -self.config.zero_threshold {
                g[j] - self.l1
            } else {
                (g[j].abs() - self.l1).max(0.0)
            };
            sum_sq += e * e;
        }
        sum_sq.sqrt() / self.weights.len().max(1) as f64
    }

    fn stalled(&self) -> bool {
        let n = self.config.num_convergence_epochs;
        if self.losses.len() < n + 1 {
            return false;
        }
        let recent = &self.losses[self.losses.len() - n - 1..];
        let first = recent[0];
        let last = *recent.last().unwrap();
        if first.abs() < f64::EPSILON {
            return (first - last).abs() < self.config.simple_convergence_threshold;
        }
        ((first - last) / first).abs() < self.config.simple_convergence_threshold
    }

    /// Runs up to `max_epochs` epochs of Parallel Boosting with Momentum.
    pub fn run(&mut self) {
        let n = self.weights.len();
        let mut phi = self.weights.clone();
        let mut alpha = 0.5_f64;
        let mut beta = 1.0 - alpha;

        for epoch in 0..self.config.max_epochs {
            self.epochs_run = epoch + 1;

            let y = &self.weights * (1.0 - alpha) + &phi * alpha;
            let g_y = self.gradient_at(&y);

            let step = &self.learning_rates * &g_y;
            let w_unprox = &self.weights - &step;
            let thresholds = &self.learning_rates * self.l1;
            let new_weights = prox_l1(&w_unprox, &thresholds);

            let delta = &y - &new_weights;
            phi = &phi - &(delta * ((1.0 - alpha) / alpha));
            self.weights = new_weights;

            let next_alpha = -beta / 2.0 + (beta + beta * beta / 4.0).sqrt();
            alpha = next_alpha;
            beta *= 1.0 - alpha;

            if self.config.loss_epochs > 0 && (epoch + 1) % self.config.loss_epochs == 0 {
                self.losses.push(self.objective(&self.weights));
            }

            if self.config.convergence_epochs > 0 && (epoch + 1) % self.config.convergence_epochs == 0 {
                let kkt = self.kkt_residual();
                if kkt <= self.config.kkt_convergence_threshold {
                    self.reached_solution = true;
                    self.converged = true;
                    break;
                }
                if self.stalled() {
                    self.converged = true;
                    break;
                }
            }
        }

        debug_assert_eq!(self.weights.len(), n);
    }
}
