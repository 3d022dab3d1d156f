//! The `ProjectConfig` registry: in-memory lookup of customer/project/metric
//! /report definitions by id or by name. Parsed once at startup and held
//! behind an `Arc` by every consumer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{CustomerId, MetricId, ProjectId, ReportId};
use crate::model::{MetricDefinition, ReportDefinition};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown customer: {0}")]
    UnknownCustomer(String),
    #[error("unknown project: {0}")]
    UnknownProject(String),
    #[error("unknown metric: {0}")]
    UnknownMetric(String),
    #[error("unknown report: {0}")]
    UnknownReport(String),
    #[error("invalid config file: {0}")]
    InvalidFile(#[from] serde_json::Error),
}

/// On-disk / wire representation of the registry, deserialized once at
/// startup. Mirrors the shape of [`CobaltConfig`] but as plain `Vec`s so it
/// round-trips through JSON without the derived name indices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CobaltConfigFile {
    pub customers: Vec<CustomerFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerFile {
    pub id: u32,
    pub name: String,
    pub projects: Vec<ProjectFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFile {
    pub id: u32,
    pub name: String,
    pub metrics: Vec<MetricFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricFile {
    pub id: u32,
    #[serde(flatten)]
    pub definition: MetricDefinition,
}

struct ProjectConfig {
    name: String,
    metrics: BTreeMap<MetricId, MetricDefinition>,
    metric_name_index: BTreeMap<String, MetricId>,
}

struct CustomerConfig {
    name: String,
    projects: BTreeMap<ProjectId, ProjectConfig>,
    project_name_index: BTreeMap<String, ProjectId>,
}

/// The full registry: every customer/project/metric/report definition the
/// process knows about, indexed for cheap lookup by id or by name.
#[derive(Default)]
pub struct CobaltConfig {
    customers: BTreeMap<CustomerId, CustomerConfig>,
    customer_name_index: BTreeMap<String, CustomerId>,
}

impl CobaltConfig {
    /// Builds the registry from its wire form.
    #[must_use]
    pub fn from_file(file: CobaltConfigFile) -> Self {
        let mut customers = BTreeMap::new();
        let mut customer_name_index = BTreeMap::new();

        for c in file.customers {
            let customer_id = CustomerId(c.id);
            customer_name_index.insert(c.name.clone(), customer_id);

            let mut projects = BTreeMap::new();
            let mut project_name_index = BTreeMap::new();
            for p in c.projects {
                let project_id = ProjectId(p.id);
                project_name_index.insert(p.name.clone(), project_id);

                let mut metrics = BTreeMap::new();
                let mut metric_name_index = BTreeMap::new();
                for m in p.metrics {
                    let metric_id = MetricId(m.id);
                    metric_name_index.insert(m.definition.name.clone(), metric_id);
                    metrics.insert(metric_id, m.definition);
                }

                projects.insert(
                    project_id,
                    ProjectConfig {
                        name: p.name,
                        metrics,
                        metric_name_index,
                    },
                );
            }

            customers.insert(
                customer_id,
                CustomerConfig {
                    name: c.name,
                    projects,
                    project_name_index,
                },
            );
        }

        Self {
            customers,
            customer_name_index,
        }
    }

    /// Parses and builds the registry from a JSON document.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidFile`] if the document does not parse.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let file: CobaltConfigFile = serde_json::from_str(json)?;
        Ok(Self::from_file(file))
    }

    #[must_use]
    pub fn metric(
        &self,
        customer_id: CustomerId,
        project_id: ProjectId,
        metric_id: MetricId,
    ) -> Option<&MetricDefinition> {
        self.customers
            .get(&customer_id)?
            .projects
            .get(&project_id)?
            .metrics
            .get(&metric_id)
    }

    #[must_use]
    pub fn report(
        &self,
        customer_id: CustomerId,
        project_id: ProjectId,
        metric_id: MetricId,
        report_id: ReportId,
    ) -> Option<(&MetricDefinition, &ReportDefinition)> {
        let metric = self.metric(customer_id, project_id, metric_id)?;
        let report = metric.report(report_id)?;
        Some((metric, report))
    }

    /// Resolves a metric by customer/project/metric name, returning its ids
    /// and definition.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] variant whose name fails to
    /// resolve.
    pub fn metric_by_name(
        &self,
        customer_name: &str,
        project_name: &str,
        metric_name: &str,
    ) -> Result<(CustomerId, ProjectId, MetricId, &MetricDefinition), ConfigError> {
        let customer_id = *self
            .customer_name_index
            .get(customer_name)
            .ok_or_else(|| ConfigError::UnknownCustomer(customer_name.to_string()))?;
        let customer = &self.customers[&customer_id];

        let project_id = *customer
            .project_name_index
            .get(project_name)
            .ok_or_else(|| ConfigError::UnknownProject(project_name.to_string()))?;
        let project = &customer.projects[&project_id];

        let metric_id = *project
            .metric_name_index
            .get(metric_name)
            .ok_or_else(|| ConfigError::UnknownMetric(metric_name.to_string()))?;
        let metric = &project.metrics[&metric_id];

        Ok((customer_id, project_id, metric_id, metric))
    }

    /// Resolves a report by the full chain of names.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] variant whose name fails to
    /// resolve, including an unknown report name.
    pub fn report_by_name(
        &self,
        customer_name: &str,
        project_name: &str,
        metric_name: &str,
        report_name: &str,
    ) -> Result<
        (
            CustomerId,
            ProjectId,
            MetricId,
            ReportId,
            &MetricDefinition,
            &ReportDefinition,
        ),
        ConfigError,
    > {
        let (customer_id, project_id, metric_id, metric) =
            self.metric_by_name(customer_name, project_name, metric_name)?;
        let (report_id, report) = metric
            .report_by_name(report_name)
            .ok_or_else(|| ConfigError::UnknownReport(report_name.to_string()))?;
        Ok((customer_id, project_id, metric_id, report_id, metric, report))
    }
}
