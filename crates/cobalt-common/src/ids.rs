//! Stable numeric identifiers.
//!
//! Identifiers are required to be stable once published, so
//! they are plain newtyped integers rather than anything derived from
//! names or insertion order.

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Returns the raw numeric id.
            #[must_use]
            pub const fn value(self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $name {
            fn from(v: u32) -> Self {
                Self(v)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(CustomerId, "Identifies a customer.");
id_type!(ProjectId, "Identifies a project within a customer.");
id_type!(MetricId, "Identifies a metric within a project.");
id_type!(ReportId, "Identifies a report within a metric.");

/// Addresses a metric by its full `(customer_id, project_id, metric_id)` tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricRef {
    pub customer_id: CustomerId,
    pub project_id: ProjectId,
    pub metric_id: MetricId,
}

/// Addresses a report by its full four-component tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportRef {
    pub customer_id: CustomerId,
    pub project_id: ProjectId,
    pub metric_id: MetricId,
    pub report_id: ReportId,
}

impl ReportRef {
    #[must_use]
    pub const fn metric_ref(&self) -> MetricRef {
        MetricRef {
            customer_id: self.customer_id,
            project_id: self.project_id,
            metric_id: self.metric_id,
        }
    }
}
