//! Cobalt Common
//!
//! Shared identifiers, the metric/report/event/observation data model, and
//! the in-memory project configuration registry used by the encoder, the
//! observation store, and the analyzer.

pub mod capabilities;
pub mod config;
pub mod ids;
pub mod model;

pub use capabilities::SystemProfileProvider;
pub use config::{CobaltConfig, CobaltConfigFile};
pub use ids::{CustomerId, MetricId, MetricRef, ProjectId, ReportId};
pub use model::*;
