//! Least-squares loss and gradient over a sparse `m x n` design matrix,
//! shared by the LASSO path and the final debiasing runs.

use ndarray::Array1;
use sprs::CsMat;

/// `L(x) = (1 / 2m) ||Ax - b||^2` plus the derived quantities the
/// minimizer needs: gradients, per-coordinate curvature, and sparsity.
#[derive(Clone)]
pub struct GradientEvaluator {
    a: CsMat<f64>,
    a_t: CsMat<f64>,
    b: Array1<f64>,
}

fn mat_vec(m: &CsMat<f64>, x: &Array1<f64>) -> Array1<f64> {
    let mut out = Array1::zeros(m.rows());
    for (row, row_vec) in m.outer_iterator().enumerate() {
        let mut sum = 0.0;
        for (col, &val) in row_vec.iter() {
            sum += val * x[col];
        }
        out[row] = sum;
    }
    out
}

impl GradientEvaluator {
    #[must_use]
    pub fn new(a: CsMat<f64>, b: Array1<f64>) -> Self {
        assert_eq!(a.rows(), b.len(), "A and b must have matching row count");
        let a_t = a.transpose_view().to_csr();
        Self { a, a_t, b }
    }

    /// Reuses this evaluator's materialized `A`/`A^T` with a replacement
    /// label vector, avoiding a re-transpose for repeated noise-perturbed
    /// re-solves over the same design matrix.
    #[must_use]
    pub fn with_b(&self, b: Array1<f64>) -> Self {
        assert_eq!(self.a.rows(), b.len(), "A and b must have matching row count");
        Self {
            a: self.a.clone(),
            a_t: self.a_t.clone(),
            b,
        }
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.a.rows()
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.a.cols()
    }

    #[must_use]
    pub fn b(&self) -> &Array1<f64> {
        &self.b
    }

    #[must_use]
    pub fn residual(&self, x: &Array1<f64>) -> Array1<f64> {
        mat_vec(&self.a, x) - &self.b
    }

    #[must_use]
    pub fn loss(&self, x: &Array1<f64>) -> f64 {
        let r = self.residual(x);
        r.dot(&r) / (2.0 * self.a.rows() as f64)
    }

    /// Equivalent to [`Self::loss`], but accumulates `Ax` via `sprs`'s
    /// library mat-vec product rather than the hand-rolled row walk in
    /// [`mat_vec`], preferred on very wide candidate matrices.
    #[must_use]
    pub fn sparse_loss(&self, x: &Array1<f64>) -> f64 {
        let mut ax = vec![0.0; self.a.rows()];
        sprs::prod::mul_acc_mat_vec_csr(self.a.view(), x.as_slice().expect("contiguous weights"), &mut ax);
        let m = self.a.rows() as f64;
        let sum_sq: f64 = ax
            .iter()
            .zip(self.b.iter())
            .map(|(axi, bi)| {
                let r = axi - bi;
                r * r
            })
            .sum();
        sum_sq / (2.0 * m)
    }

    /// `g += (1/m) A^T (Ax - b)`.
    pub fn gradient(&self, x: &Array1<f64>, g: &mut Array1<f64>) {
        let r = self.residual(x);
        let m = self.a.rows() as f64;
        let a_t_r = mat_vec(&self.a_t, &r);
        *g += &(a_t_r / m);
    }

    /// `diag(A^T A) / m`, used to derive per-coordinate learning rates.
    #[must_use]
    pub fn per_coordinate_curvature(&self) -> Array1<f64> {
        let mut curvature = Array1::zeros(self.a.cols());
        let m = self.a.rows() as f64;
        for row_vec in self.a.outer_iterator() {
            for (col, &val) in row_vec.iter() {
                curvature[col] += val * val;
            }
        }
        curvature / m
    }

    /// `max_i ||row_i||_0`.
    #[must_use]
    pub fn sparsity(&self) -> f64 {
        self.a
            .outer_iterator()
            .map(|row| row.nnz() as f64)
            .fold(0.0, f64::max)
            .max(1.0)
    }
}
