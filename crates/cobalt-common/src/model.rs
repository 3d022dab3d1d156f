//! The metric / report / event / observation data model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::ReportId;

/// The eight metric type tags a [`MetricDefinition`] may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    EventOccurred,
    EventCount,
    ElapsedTime,
    FrameRate,
    MemoryUsage,
    IntHistogram,
    StringUsed,
    Custom,
}

/// Histogram bucket layout, attached to a metric when its type is
/// `IntHistogram`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BucketSpec {
    Linear {
        floor: i64,
        num_buckets: u32,
        step_size: i64,
    },
    Exponential {
        floor: i64,
        num_buckets: u32,
        initial_step: i64,
        step_multiplier: f64,
    },
}

/// Definition of a single metric: its type tag, the fields that type needs,
/// and the reports defined against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub name: String,
    pub metric_type: MetricType,
    /// Bound on event index, consulted for `EventOccurred`.
    pub max_event_code: Option<u32>,
    /// Consulted for `IntHistogram`.
    pub bucket_spec: Option<BucketSpec>,
    pub reports: BTreeMap<ReportId, ReportDefinition>,
}

impl MetricDefinition {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        metric_type: MetricType,
        max_event_code: Option<u32>,
        bucket_spec: Option<BucketSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            metric_type,
            max_event_code,
            bucket_spec,
            reports: BTreeMap::new(),
        }
    }

    pub fn add_report(&mut self, id: ReportId, report: ReportDefinition) {
        self.reports.insert(id, report);
    }

    #[must_use]
    pub fn report(&self, id: ReportId) -> Option<&ReportDefinition> {
        self.reports.get(&id)
    }

    #[must_use]
    pub fn report_by_name(&self, name: &str) -> Option<(ReportId, &ReportDefinition)> {
        self.reports
            .iter()
            .find(|(_, r)| r.name == name)
            .map(|(id, r)| (*id, r))
    }
}

/// The eight report type tags a [`ReportDefinition`] may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    SimpleOccurrenceCount,
    EventComponentOccurrenceCount,
    NumericAggregation,
    NumericPerfRawDump,
    IntRangeHistogram,
    HighFrequencyStringCounts,
    StringCountsWithThreshold,
    CustomRawDump,
}

/// Local-privacy noise level, selecting a `(p, q)` pair for Basic RAPPOR and
/// String RAPPOR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NoiseLevel {
    #[default]
    None,
    Small,
    Medium,
    Large,
}

impl NoiseLevel {
    /// Returns `(p, q)`: probability of a 0 flipping to 1, and probability of
    /// a 1 staying 1.
    #[must_use]
    pub const fn p_q(self) -> (f64, f64) {
        match self {
            Self::None => (0.00, 1.00),
            Self::Small => (0.01, 0.99),
            Self::Medium => (0.10, 0.90),
            Self::Large => (0.25, 0.75),
        }
    }
}

/// `SystemProfile` fields a report may ask to have attached to its metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemProfileField {
    Os,
    Arch,
    BoardName,
    ProductName,
}

/// Definition of a single report against a metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDefinition {
    pub name: String,
    pub report_type: ReportType,
    pub local_privacy_noise_level: Option<NoiseLevel>,
    pub expected_population_size: Option<u64>,
    pub expected_string_set_size: Option<u64>,
    pub threshold: Option<u32>,
    pub system_profile_field: Vec<SystemProfileField>,
}

impl ReportDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>, report_type: ReportType) -> Self {
        Self {
            name: name.into(),
            report_type,
            local_privacy_noise_level: None,
            expected_population_size: None,
            expected_string_set_size: None,
            threshold: None,
            system_profile_field: Vec::new(),
        }
    }
}

/// A single histogram bucket: the bucket index and the observed count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub index: u32,
    pub count: i64,
}

/// A value supplied for one dimension of a `Custom` event/observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CustomValue {
    Int(i64),
    Double(f64),
    String(String),
    IndexValue(u32),
}

/// The event payload, tagged the same way as [`MetricType`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    EventOccurred {
        event_code: u32,
    },
    EventCount {
        event_code: u32,
        component: String,
        period_duration_micros: i64,
        count: i64,
    },
    ElapsedTime {
        event_code: u32,
        component: String,
        elapsed_micros: i64,
    },
    FrameRate {
        event_code: u32,
        component: String,
        frames_per_1000_seconds: i64,
    },
    MemoryUsage {
        event_code: u32,
        component: String,
        bytes: i64,
    },
    IntHistogram {
        event_code: u32,
        component: String,
        buckets: Vec<HistogramBucket>,
    },
    StringUsed {
        str_value: String,
    },
    Custom {
        values: BTreeMap<String, CustomValue>,
    },
}

/// A single client-recorded event, ready to be fed to the encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Count of days since the metric's time zone policy epoch.
    pub day_index: u32,
    pub payload: EventPayload,
}

/// Basic RAPPOR observation: one bit per category, randomized response applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicRapporObservation {
    pub data: Vec<u8>,
}

/// Forculus threshold-encryption observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForculusObservation {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    /// x-coordinate of this client's share of the symmetric key, chosen
    /// fresh per observation.
    pub point_x: u64,
    /// y-coordinate: the polynomial (shared by every client encoding the
    /// same string) evaluated at `point_x`.
    pub point_y: u64,
}

/// Custom raw-dump observation, mirroring [`CustomValue`] dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomObservation {
    pub values: BTreeMap<String, CustomValue>,
}

/// The observation payload produced by the encoder, tagged the same way the
/// originating event was.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObservationPayload {
    BasicRapporObservation(BasicRapporObservation),
    RapporObservation {
        cohort: u32,
        data: Vec<u8>,
    },
    ForculusObservation(ForculusObservation),
    IntegerEventObservation {
        event_code: u32,
        component_name_hash: Vec<u8>,
        value: i64,
    },
    HistogramObservation {
        event_code: u32,
        component_name_hash: Vec<u8>,
        buckets: Vec<HistogramBucket>,
    },
    CustomObservation(CustomObservation),
}

/// One encoded observation: a payload plus an 8-byte random id generated
/// fresh per observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub random_id: [u8; 8],
    pub payload: ObservationPayload,
}

/// The four `(os, arch, board_name, product_name)` system profile fields,
/// each optional because the filtered view may omit any of
/// them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemProfile {
    pub os: Option<String>,
    pub arch: Option<String>,
    pub board_name: Option<String>,
    pub product_name: Option<String>,
}

impl SystemProfile {
    /// Filters down to the fields the report asked for. When the report
    /// lists no fields, only `board_name` and `product_name` are kept.
    #[must_use]
    pub fn filtered(&self, fields: &[SystemProfileField]) -> Self {
        let wanted: Vec<SystemProfileField> = if fields.is_empty() {
            vec![SystemProfileField::BoardName, SystemProfileField::ProductName]
        } else {
            fields.to_vec()
        };

        Self {
            os: wanted
                .contains(&SystemProfileField::Os)
                .then(|| self.os.clone())
                .flatten(),
            arch: wanted
                .contains(&SystemProfileField::Arch)
                .then(|| self.arch.clone())
                .flatten(),
            board_name: wanted
                .contains(&SystemProfileField::BoardName)
                .then(|| self.board_name.clone())
                .flatten(),
            product_name: wanted
                .contains(&SystemProfileField::ProductName)
                .then(|| self.product_name.clone())
                .flatten(),
        }
    }
}

/// `(customer_id, project_id, metric_id, report_id, day_index, filtered
/// SystemProfile)`, travels alongside the encrypted observation into the
/// store. Two instances compare equal iff their serialized bytes would be
/// identical, which is what the store's batching invariant relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationMetadata {
    pub customer_id: u32,
    pub project_id: u32,
    pub metric_id: u32,
    pub report_id: u32,
    pub day_index: u32,
    pub system_profile: SystemProfile,
}

impl ObservationMetadata {
    /// Canonical serialized form used for store batching and for the
    /// dirty-metadata check in `FileObservationStore`.
    ///
    /// # Errors
    /// Returns an error only if the metadata somehow contains data that
    /// cannot be represented as JSON, which cannot happen for this type.
    pub fn canonical_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// An encrypted observation as it is stored on disk: an opaque ciphertext
/// blob produced by an `EncryptedMessageMaker`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedMessage {
    pub ciphertext: Vec<u8>,
}

/// A batch of observations sharing byte-identical metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvelopeBatch {
    pub metadata: ObservationMetadata,
    pub observations: Vec<EncryptedMessage>,
}

impl Default for ObservationMetadata {
    fn default() -> Self {
        Self {
            customer_id: 0,
            project_id: 0,
            metric_id: 0,
            report_id: 0,
            day_index: 0,
            system_profile: SystemProfile::default(),
        }
    }
}

/// A sequence of `(metadata, observations)` batches ready to ship.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Envelope {
    pub batches: Vec<EnvelopeBatch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_profile_default_fields() {
        let profile = SystemProfile {
            os: Some("fuchsia".into()),
            arch: Some("arm64".into()),
            board_name: Some("board".into()),
            product_name: Some("product".into()),
        };
        let filtered = profile.filtered(&[]);
        assert_eq!(filtered.os, None);
        assert_eq!(filtered.arch, None);
        assert_eq!(filtered.board_name, Some("board".into()));
        assert_eq!(filtered.product_name, Some("product".into()));
    }

    #[test]
    fn system_profile_explicit_fields() {
        let profile = SystemProfile {
            os: Some("fuchsia".into()),
            arch: Some("arm64".into()),
            board_name: Some("board".into()),
            product_name: Some("product".into()),
        };
        let filtered = profile.filtered(&[SystemProfileField::Os]);
        assert_eq!(filtered.os, Some("fuchsia".into()));
        assert_eq!(filtered.board_name, None);
    }

    #[test]
    fn metadata_canonical_bytes_stable() {
        let a = ObservationMetadata {
            customer_id: 1,
            project_id: 2,
            metric_id: 3,
            report_id: 4,
            day_index: 5,
            system_profile: SystemProfile::default(),
        };
        let b = a.clone();
        assert_eq!(a.canonical_bytes().unwrap(), b.canonical_bytes().unwrap());
    }
}
