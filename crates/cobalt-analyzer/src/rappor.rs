//! Decodes String RAPPOR observations against a candidate list: builds the
//! Bloom-filter design matrix, runs the two-phase LASSO solver, and
//! reports a count estimate and standard error per candidate.

use std::collections::HashMap;

use cobalt_crypto::{digest_candidate, hash_to_bit_index};
use ndarray::Array1;
use rand::RngCore;
use sprs::TriMat;

use crate::error::AnalyzerError;
use crate::gradient::GradientEvaluator;
use crate::lasso::LassoRunner;

/// One observed Bloom filter, tagged with the cohort it was drawn under.
#[derive(Debug, Clone)]
pub struct CohortObservation {
    pub cohort: u32,
    /// Little-endian-packed bits, same layout as the encoder's output.
    pub bits: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct CandidateResult {
    pub count_estimate: f64,
    pub std_error: f64,
}

/// Builds the `(num_cohorts * num_bits) x num_candidates` sparse design
/// matrix: row `i*num_bits + (num_bits-1-j)` is set for candidate `r` when
/// one of its `num_hashes` Bloom indices under cohort `i` lands on bit `j`.
pub fn build_candidate_matrix(candidates: &[Vec<u8>], num_cohorts: u32, num_bits: u32, num_hashes: u32) -> sprs::CsMat<f64> {
    let rows = (num_cohorts * num_bits) as usize;
    let cols = candidates.len();
    let mut tri = TriMat::new((rows, cols));

    for (col, candidate) in candidates.iter().enumerate() {
        for cohort in 0..num_cohorts {
            let digest = digest_candidate(candidate, cohort, num_hashes);
            let mut seen = std::collections::HashSet::new();
            for h in 0..num_hashes {
                let bit = hash_to_bit_index(&digest, h, num_bits);
                if seen.insert(bit) {
                    let row = (cohort * num_bits + (num_bits - 1 - bit)) as usize;
                    tri.add_triplet(row, col, 1.0);
                }
            }
        }
    }

    tri.to_csr()
}

/// Estimates, per `(cohort, bit)` row, the true count of ones from the
/// observed randomized-response count, using the standard unbiased
/// estimator `(observed - n*p) / (q - p)` with a conservative standard
/// error assuming worst-case variance `p(1-p)`.
pub fn estimate_bit_counts(observations: &[CohortObservation], num_cohorts: u32, num_bits: u32, p: f64, q: f64) -> (Array1<f64>, Array1<f64>, Vec<u64>) {
    let rows = (num_cohorts * num_bits) as usize;
    let mut ones = vec![0u64; rows];
    let mut totals = vec![0u64; num_cohorts as usize];

    for obs in observations {
        let cohort = obs.cohort;
        totals[cohort as usize] += 1;
        for bit in 0..num_bits {
            let byte_index = obs.bits.len() - 1 - (bit as usize / 8);
            let set = obs.bits.get(byte_index).is_some_and(|b| b & (1 << (bit % 8)) != 0);
            if set {
                let row = (cohort * num_bits + (num_bits - 1 - bit)) as usize;
                ones[row] += 1;
            }
        }
    }

    let denom = (q - p).max(f64::EPSILON);
    let mut ratios = Array1::zeros(rows);
    let mut std_errors = Array1::zeros(rows);

    for cohort in 0..num_cohorts {
        let n = totals[cohort as usize];
        if n == 0 {
            continue;
        }
        let n_f = n as f64;
        for bit in 0..num_bits {
            let row = (cohort * num_bits + bit) as usize;
            let est_count = (ones[row] as f64 - n_f * p) / denom;
            let std_error = (n_f * p * (1.0 - p)).sqrt() / denom;
            ratios[row] = est_count / n_f;
            std_errors[row] = std_error / n_f;
        }
    }

    (ratios, std_errors, totals)
}

pub struct RapporAnalyzer {
    candidates: Vec<Vec<u8>>,
    num_cohorts: u32,
    num_bits: u32,
    num_hashes: u32,
}

impl RapporAnalyzer {
    #[must_use]
    pub fn new(candidates: Vec<Vec<u8>>, num_cohorts: u32, num_bits: u32, num_hashes: u32) -> Self {
        Self {
            candidates,
            num_cohorts,
            num_bits,
            num_hashes,
        }
    }

    /// Runs the full decode pipeline and returns a per-candidate count
    /// estimate (zero for candidates outside the selected support).
    pub fn analyze(&self, observations: &[CohortObservation], p: f64, q: f64, rng: &mut dyn RngCore) -> Result<HashMap<Vec<u8>, CandidateResult>, AnalyzerError> {
        if self.candidates.is_empty() {
            return Err(AnalyzerError::InvalidArguments("no candidates supplied".into()));
        }

        let a = build_candidate_matrix(&self.candidates, self.num_cohorts, self.num_bits, self.num_hashes);
        let (ratios, std_errors, _totals) = estimate_bit_counts(observations, self.num_cohorts, self.num_bits, p, q);
        let n_obs = observations.len() as f64;

        let evaluator = GradientEvaluator::new(a, ratios.clone());
        let runner = LassoRunner::new(&evaluator);

        let max_nonzero_coeffs = self
            .candidates
            .len()
            .min((0.7 * f64::from(self.num_cohorts) * f64::from(self.num_bits)).floor() as usize)
            .min(500);
        let max_solution_1_norm = 0.9;

        let path = runner.run_first_rappor_step(max_nonzero_coeffs, max_solution_1_norm)?;

        if !path.reached_final_subproblem || !path.final_converged {
            return Err(AnalyzerError::DeadlineExceeded);
        }

        if path.support.is_empty() {
            return Ok(self.candidates.iter().cloned().map(|c| (c, CandidateResult { count_estimate: 0.0, std_error: 0.0 })).collect());
        }

        // A_S selects columns only; its row count (one per cohort/bit) is
        // unchanged, so the same `ratios`/`std_errors` vectors apply.
        let support_candidates: Vec<Vec<u8>> = path.support.iter().map(|&j| self.candidates[j].clone()).collect();
        let a_s = build_candidate_matrix(&support_candidates, self.num_cohorts, self.num_bits, self.num_hashes);
        let evaluator_s = GradientEvaluator::new(a_s, ratios.clone());
        let initial_weights_s = Array1::from(path.support.iter().map(|&j| path.weights[j]).collect::<Vec<_>>());

        let runner_s = LassoRunner::new(&evaluator_s);
        let debiased = runner_s.get_exact_values_and_std_errs(&ratios, &std_errors, initial_weights_s, 1e-3 * path.last_l1, 1.0, L2_RATIO, rng);

        let mut out: HashMap<Vec<u8>, CandidateResult> = self
            .candidates
            .iter()
            .cloned()
            .map(|c| (c, CandidateResult { count_estimate: 0.0, std_error: 0.0 }))
            .collect();

        for (idx, &j) in path.support.iter().enumerate() {
            let candidate = self.candidates[j].clone();
            out.insert(
                candidate,
                CandidateResult {
                    count_estimate: debiased.mean[idx] * n_obs,
                    std_error: debiased.std_error[idx] * n_obs,
                },
            );
        }

        Ok(out)
    }
}

const L2_RATIO: f64 = 1e-3;
