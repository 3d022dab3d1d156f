//! Basic RAPPOR: coordinatewise randomized response over a known category
//! set.

use cobalt_common::NoiseLevel;
use rand::RngCore;

use crate::error::EncoderError;

/// Number of categories implied by a metric's `max_event_code`
/// (`num_categories = max_event_code + 1`).
#[must_use]
pub const fn num_categories_for(max_event_code: u32) -> u32 {
    max_event_code + 1
}

/// Minimum and maximum category counts the implementation supports; chosen
/// so the bitmap always fits within a single envelope record comfortably.
pub const MIN_CATEGORIES: u32 = 2;
pub const MAX_CATEGORIES: u32 = 1 << 20;

/// Encodes `value_index` as a bitmap of `num_categories` bits (one bit per
/// category, little-endian byte packing) with Basic RAPPOR randomized
/// response applied: the true bit is set with probability `q`, every other
/// bit is set with probability `p`.
///
/// # Errors
/// - [`EncoderError::InvalidArguments`] if `value_index >= num_categories`.
/// - [`EncoderError::InvalidConfig`] if `num_categories` is out of bounds
///   or `noise_level` is `None` (the encoder requires an explicit level on
///   the report).
pub fn encode_basic_rappor(
    value_index: u32,
    num_categories: u32,
    noise_level: Option<NoiseLevel>,
    rng: &mut dyn RngCore,
) -> Result<Vec<u8>, EncoderError> {
    if value_index >= num_categories {
        return Err(EncoderError::InvalidArguments(format!(
            "value_index {value_index} out of range for {num_categories} categories"
        )));
    }
    if !(MIN_CATEGORIES..=MAX_CATEGORIES).contains(&num_categories) {
        return Err(EncoderError::InvalidConfig(format!(
            "num_categories {num_categories} out of implementation bounds"
        )));
    }
    let Some(noise_level) = noise_level else {
        return Err(EncoderError::InvalidConfig(
            "report has no local_privacy_noise_level".into(),
        ));
    };

    let (p, q) = noise_level.p_q();
    let num_bytes = (num_categories as usize).div_ceil(8);
    let mut data = vec![0u8; num_bytes];

    for bit in 0..num_categories {
        let true_bit = bit == value_index;
        let flip_prob = if true_bit { q } else { p };
        let draw = rng.next_u32() as f64 / f64::from(u32::MAX);
        if draw < flip_prob {
            data[(bit / 8) as usize] |= 1 << (bit % 8);
        }
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn rejects_out_of_range_value() {
        let mut rng = StepRng::new(0, 1);
        let err = encode_basic_rappor(101, 101, Some(NoiseLevel::Small), &mut rng).unwrap_err();
        assert!(matches!(err, EncoderError::InvalidArguments(_)));
    }

    #[test]
    fn rejects_missing_noise_level() {
        let mut rng = StepRng::new(0, 1);
        let err = encode_basic_rappor(1, 101, None, &mut rng).unwrap_err();
        assert!(matches!(err, EncoderError::InvalidConfig(_)));
    }

    #[test]
    fn noiseless_sets_exactly_one_bit() {
        // A draw of exactly 0.0 on every bit: satisfies `draw < q` (q = 1.0
        // for the true bit) but never `draw < p` (p = 0.0 for noise level
        // `None`), so only the true bit is set.
        let mut rng = StepRng::new(0, 0);
        let data = encode_basic_rappor(42, 101, Some(NoiseLevel::None), &mut rng).unwrap();
        assert_eq!(data.len(), 13); // ceil(101 / 8)
        let set_bits: u32 = data.iter().map(|b| b.count_ones()).sum();
        assert_eq!(set_bits, 1);
        assert_eq!(data[42 / 8] & (1 << (42 % 8)), 1 << (42 % 8));
    }
}
