//! String RAPPOR: Bloom filter + cohort + RAPPOR over an unbounded string
//! set. Decoded server-side by the heavy-hitter
//! analyzer in `cobalt-analyzer`.

use cobalt_common::NoiseLevel;
use cobalt_crypto::{digest_candidate, hash_to_bit_index};
use rand::RngCore;

/// Fixed for every report.
pub const NUM_HASHES: u32 = 2;

/// Parameters selected for a given report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringRapporParams {
    pub num_cohorts: u32,
    pub num_bloom_bits: u32,
    pub num_hashes: u32,
}

/// Picks `num_cohorts` from `expected_population_size` thresholds
/// `< {100, 1000, 10000, inf}` -> `{5, 10, 50, 100}`, defaulting the
/// population size to 50 when unset.
#[must_use]
pub fn choose_num_cohorts(expected_population_size: Option<u64>) -> u32 {
    let population = expected_population_size.unwrap_or(50);
    if population < 100 {
        5
    } else if population < 1_000 {
        10
    } else if population < 10_000 {
        50
    } else {
        100
    }
}

/// Picks `num_bloom_bits` from `expected_string_set_size` thresholds
/// `< {100, 1000, 10000, inf}` -> `{8, 16, 64, 128}`, defaulting the set
/// size to 32 when unset.
#[must_use]
pub fn choose_num_bloom_bits(expected_string_set_size: Option<u64>) -> u32 {
    let set_size = expected_string_set_size.unwrap_or(32);
    if set_size < 100 {
        8
    } else if set_size < 1_000 {
        16
    } else if set_size < 10_000 {
        64
    } else {
        128
    }
}

#[must_use]
pub fn choose_params(
    expected_population_size: Option<u64>,
    expected_string_set_size: Option<u64>,
) -> StringRapporParams {
    StringRapporParams {
        num_cohorts: choose_num_cohorts(expected_population_size),
        num_bloom_bits: choose_num_bloom_bits(expected_string_set_size),
        num_hashes: NUM_HASHES,
    }
}

/// Sets the Bloom filter bits a string hashes to under one cohort.
///
/// Indices are derived from a single SHA-256 digest of
/// `(candidate, cohort, num_hashes)` and index bits *from the right* (bit 0
/// is the least-significant bit of the last byte), matching the analyzer's
/// candidate-matrix construction so client-side encoding
/// and server-side decoding agree on bit layout.
#[must_use]
pub fn bloom_filter_bits(value: &str, cohort: u32, params: StringRapporParams) -> Vec<u8> {
    let digest = digest_candidate(value.as_bytes(), cohort, params.num_hashes);
    let num_bytes = (params.num_bloom_bits as usize).div_ceil(8);
    let mut bits = vec![0u8; num_bytes];

    for h in 0..params.num_hashes {
        let index = hash_to_bit_index(&digest, h, params.num_bloom_bits);
        // Indices count from the right: bit 0 is the LSB of the last byte.
        let byte = num_bytes - 1 - (index as usize / 8);
        bits[byte] |= 1 << (index % 8);
    }

    bits
}

/// Assigns the client to a cohort for this report. Cohort assignment is a
/// per-report, per-client random draw (a random
/// partition of clients").
#[must_use]
pub fn assign_cohort(num_cohorts: u32, rng: &mut dyn RngCore) -> u32 {
    rng.next_u32() % num_cohorts
}

/// Applies Basic-RAPPOR-style randomized response to each bit of the Bloom
/// filter, using the same `(p, q)` table as Basic RAPPOR.
#[must_use]
pub fn randomize_bits(bits: &[u8], num_bloom_bits: u32, noise_level: NoiseLevel, rng: &mut dyn RngCore) -> Vec<u8> {
    let (p, q) = noise_level.p_q();
    let num_bytes = bits.len();
    let mut out = vec![0u8; num_bytes];

    for bit in 0..num_bloom_bits {
        let byte = num_bytes - 1 - (bit as usize / 8);
        let true_bit = (bits[byte] & (1 << (bit % 8))) != 0;
        let flip_prob = if true_bit { q } else { p };
        let draw = rng.next_u32() as f64 / f64::from(u32::MAX);
        if draw < flip_prob {
            out[byte] |= 1 << (bit % 8);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cohort_thresholds() {
        assert_eq!(choose_num_cohorts(Some(50)), 5);
        assert_eq!(choose_num_cohorts(Some(100)), 10);
        assert_eq!(choose_num_cohorts(Some(1_000)), 50);
        assert_eq!(choose_num_cohorts(Some(10_000)), 100);
        assert_eq!(choose_num_cohorts(None), 5);
    }

    #[test]
    fn bloom_bit_thresholds() {
        assert_eq!(choose_num_bloom_bits(Some(50)), 8);
        assert_eq!(choose_num_bloom_bits(Some(100)), 16);
        assert_eq!(choose_num_bloom_bits(Some(1_000)), 64);
        assert_eq!(choose_num_bloom_bits(Some(10_000)), 128);
        assert_eq!(choose_num_bloom_bits(None), 8);
    }

    #[test]
    fn bloom_filter_sets_at_most_num_hashes_bits() {
        let params = StringRapporParams {
            num_cohorts: 5,
            num_bloom_bits: 8,
            num_hashes: 2,
        };
        let bits = bloom_filter_bits("hello", 0, params);
        let set: u32 = bits.iter().map(|b| b.count_ones()).sum();
        assert!(set >= 1 && set <= 2);
    }

    #[test]
    fn bloom_filter_deterministic_for_same_inputs() {
        let params = StringRapporParams {
            num_cohorts: 5,
            num_bloom_bits: 16,
            num_hashes: 2,
        };
        let a = bloom_filter_bits("candidate", 3, params);
        let b = bloom_filter_bits("candidate", 3, params);
        assert_eq!(a, b);
    }
}
