//! File taxonomy: the single active file and the finalized-file name
//! pattern `\d{13}-\d{7}\.data`.

use rand::RngCore;
use std::time::{SystemTime, UNIX_EPOCH};

pub const IN_PROGRESS_NAME: &str = "in_progress.data";

/// Generates a finalized file name from the current wall-clock time and a
/// random suffix, so lexicographic order sorts chronologically.
pub fn generate_finalized_name(rng: &mut dyn RngCore) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let random = rng.next_u32() % 10_000_000;
    format!("{millis:013}-{random:07}.data")
}

/// Whether `name` matches the finalized-file pattern. Files that don't are
/// ignored by both recovery and `take_next_envelope_holder`.
#[must_use]
pub fn is_finalized_name(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".data") else {
        return false;
    };
    let Some((ts, rand)) = stem.split_once('-') else {
        return false;
    };
    ts.len() == 13 && rand.len() == 7 && ts.bytes().all(|b| b.is_ascii_digit()) && rand.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn generated_names_match_pattern() {
        let mut rng = StepRng::new(42, 1);
        let name = generate_finalized_name(&mut rng);
        assert!(is_finalized_name(&name), "{name} should match the pattern");
    }

    #[test]
    fn rejects_other_names() {
        assert!(!is_finalized_name("in_progress.data"));
        assert!(!is_finalized_name("notes.txt"));
        assert!(!is_finalized_name("12345-1234567.data")); // timestamp too short
        assert!(!is_finalized_name("1234567890123-123456.data")); // random too short
    }
}
