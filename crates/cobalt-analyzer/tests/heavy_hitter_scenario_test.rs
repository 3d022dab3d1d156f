//! End-to-end heavy-hitter recovery over 100
//! candidates, 2 cohorts, 2 hashes, 8 Bloom bits, 100 noiseless
//! observations all for one candidate. The analyzer should recover that
//! candidate's count within 5% and assign (approximately) zero everywhere
//! else.

use cobalt_analyzer::{CandidateResult, CohortObservation, RapporAnalyzer};
use cobalt_crypto::{digest_candidate, hash_to_bit_index};
use rand::rngs::mock::StepRng;

const NUM_COHORTS: u32 = 2;
const NUM_BITS: u32 = 8;
const NUM_HASHES: u32 = 2;

/// Sets the Bloom bits a candidate hashes to under one cohort, using the
/// same bit-layout convention (indices from the right) as
/// `cobalt-encoder::string_rappor::bloom_filter_bits`, so the observations
/// built here are exactly what a noiseless client would have produced.
fn bloom_bits(candidate: &[u8], cohort: u32) -> Vec<u8> {
    let digest = digest_candidate(candidate, cohort, NUM_HASHES);
    let num_bytes = (NUM_BITS as usize).div_ceil(8);
    let mut bits = vec![0u8; num_bytes];
    for h in 0..NUM_HASHES {
        let index = hash_to_bit_index(&digest, h, NUM_BITS);
        let byte = num_bytes - 1 - (index as usize / 8);
        bits[byte] |= 1 << (index % 8);
    }
    bits
}

#[test]
fn recovers_the_single_heavy_hitter_among_one_hundred_candidates() {
    let candidates: Vec<Vec<u8>> = (0..100).map(|i| format!("candidate-{i}").into_bytes()).collect();
    let heavy_hitter_index = 5;
    let heavy_hitter = candidates[heavy_hitter_index].clone();

    let observations: Vec<CohortObservation> = (0..100)
        .map(|i| {
            let cohort = i % NUM_COHORTS;
            CohortObservation {
                cohort,
                bits: bloom_bits(&heavy_hitter, cohort),
            }
        })
        .collect();

    let analyzer = RapporAnalyzer::new(candidates.clone(), NUM_COHORTS, NUM_BITS, NUM_HASHES);
    let mut rng = StepRng::new(7, 11);
    // Noise level None: p = 0 (prob 0->1), q = 1 (prob 1->1).
    let results = analyzer.analyze(&observations, 0.0, 1.0, &mut rng).expect("analysis converges");

    let hit: &CandidateResult = &results[&heavy_hitter];
    assert!(
        (hit.count_estimate - 100.0).abs() <= 5.0,
        "expected ~100 +/- 5%, got {}",
        hit.count_estimate
    );

    for (idx, candidate) in candidates.iter().enumerate() {
        if idx == heavy_hitter_index {
            continue;
        }
        let estimate = results[candidate].count_estimate;
        assert!(estimate.abs() < 1e-3, "candidate {idx} should be ~0, got {estimate}");
    }
}
