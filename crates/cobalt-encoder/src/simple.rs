//! The non-RAPPOR, non-Forculus encodings: integer events, histograms, and
//! custom dimension dumps. All three always succeed.

use std::collections::BTreeMap;

use cobalt_common::{CustomObservation, CustomValue, HistogramBucket};
use cobalt_crypto::component_name_hash;

/// Always succeeds; `component_name_hash` is the 32-byte hash of
/// `component` when non-empty, else the empty string.
#[must_use]
pub fn encode_integer_event(component: &str, value: i64) -> (Vec<u8>, i64) {
    (component_name_hash(component), value)
}

/// Moves `buckets` into the observation; the caller signals whether this is
/// the last use of the event by passing ownership.
#[must_use]
pub fn encode_histogram(component: &str, buckets: Vec<HistogramBucket>) -> (Vec<u8>, Vec<HistogramBucket>) {
    (component_name_hash(component), buckets)
}

/// Copies or moves dimension values unchanged into a `CustomObservation`.
#[must_use]
pub fn encode_custom(values: BTreeMap<String, CustomValue>) -> CustomObservation {
    CustomObservation { values }
}
