//! The encoder: a pure function of `(MetricRef, ReportDefinition,
//! day_index, event_payload, client_secret, SystemProfile)` plus an
//! internal RNG.
//!
//! Dispatch is a table keyed by `(MetricType, ReportType)` rather than
//! per-subclass polymorphism.
//! Invalid combinations are `InvalidConfig`.

use rand::RngCore;

use cobalt_common::{
    EventPayload, MetricDefinition, MetricRef, MetricType, Observation, ObservationMetadata,
    ObservationPayload, ReportDefinition, ReportId, ReportType, SystemProfile,
};

use crate::basic_rappor::{encode_basic_rappor, num_categories_for};
use crate::error::EncoderError;
use crate::forculus::encode_forculus;
use crate::simple::{encode_custom, encode_histogram, encode_integer_event};
use crate::string_rappor::{assign_cohort, bloom_filter_bits, choose_params, randomize_bits};

/// Everything the encoder needs to produce one observation, bundled so the
/// call site reads as a single pure-function invocation.
pub struct EncodeContext<'a> {
    pub metric_ref: MetricRef,
    pub report_id: ReportId,
    pub metric: &'a MetricDefinition,
    pub report: &'a ReportDefinition,
    pub event: &'a cobalt_common::Event,
    /// Per-device secret. Accepted for parity with the encoder's
    /// signature; noiseless-determinism holds without consulting it,
    /// since at noise level `None` every randomized-response draw is
    /// deterministic regardless of its value.
    pub client_secret: &'a [u8],
    pub system_profile: &'a SystemProfile,
}

/// Converts a single [`Event`](cobalt_common::Event) into an
/// [`Observation`] plus its [`ObservationMetadata`] under one report.
pub struct Encoder {
    rng: Box<dyn RngCore + Send>,
}

impl Encoder {
    #[must_use]
    pub fn new(rng: Box<dyn RngCore + Send>) -> Self {
        Self { rng }
    }

    /// # Errors
    /// Returns [`EncoderError::InvalidArguments`] or
    /// [`EncoderError::InvalidConfig`] per the encoder variant invoked, and
    /// [`EncoderError::InvalidConfig`] for any `(MetricType, ReportType)`
    /// combination not in the dispatch table.
    pub fn encode(
        &mut self,
        ctx: &EncodeContext<'_>,
    ) -> Result<(Observation, ObservationMetadata), EncoderError> {
        let _ = ctx.client_secret;

        let payload = match (ctx.metric.metric_type, ctx.report.report_type) {
            (MetricType::EventOccurred, ReportType::SimpleOccurrenceCount) => {
                self.encode_event_occurred(ctx)?
            }
            (
                MetricType::EventCount,
                ReportType::EventComponentOccurrenceCount,
            ) => self.encode_event_count(ctx)?,
            (
                MetricType::ElapsedTime | MetricType::FrameRate | MetricType::MemoryUsage,
                ReportType::NumericAggregation | ReportType::NumericPerfRawDump,
            ) => self.encode_numeric(ctx)?,
            (MetricType::IntHistogram, ReportType::IntRangeHistogram) => {
                self.encode_histogram(ctx)?
            }
            (MetricType::StringUsed, ReportType::HighFrequencyStringCounts) => {
                self.encode_string_rappor(ctx)?
            }
            (MetricType::StringUsed, ReportType::StringCountsWithThreshold) => {
                self.encode_forculus(ctx)?
            }
            (MetricType::Custom, ReportType::CustomRawDump) => self.encode_custom(ctx)?,
            (metric_type, report_type) => {
                return Err(EncoderError::InvalidConfig(format!(
                    "unsupported combination: {metric_type:?} metric with {report_type:?} report"
                )))
            }
        };

        let mut random_id = [0u8; 8];
        self.rng.fill_bytes(&mut random_id);

        let observation = Observation { random_id, payload };
        let metadata = ObservationMetadata {
            customer_id: ctx.metric_ref.customer_id.value(),
            project_id: ctx.metric_ref.project_id.value(),
            metric_id: ctx.metric_ref.metric_id.value(),
            report_id: ctx.report_id.value(),
            day_index: ctx.event.day_index,
            system_profile: ctx.system_profile.filtered(&ctx.report.system_profile_field),
        };

        Ok((observation, metadata))
    }

    fn encode_event_occurred(
        &mut self,
        ctx: &EncodeContext<'_>,
    ) -> Result<ObservationPayload, EncoderError> {
        let EventPayload::EventOccurred { event_code } = &ctx.event.payload else {
            return Err(EncoderError::InvalidArguments(
                "event payload does not match metric type EventOccurred".into(),
            ));
        };
        let max_event_code = ctx.metric.max_event_code.ok_or_else(|| {
            EncoderError::InvalidConfig("metric has no max_event_code".into())
        })?;
        let num_categories = num_categories_for(max_event_code);
        let data = encode_basic_rappor(
            *event_code,
            num_categories,
            ctx.report.local_privacy_noise_level,
            &mut self.rng,
        )?;
        Ok(ObservationPayload::BasicRapporObservation(
            cobalt_common::BasicRapporObservation { data },
        ))
    }

    fn encode_event_count(
        &mut self,
        ctx: &EncodeContext<'_>,
    ) -> Result<ObservationPayload, EncoderError> {
        let EventPayload::EventCount {
            event_code,
            component,
            count,
            ..
        } = &ctx.event.payload
        else {
            return Err(EncoderError::InvalidArguments(
                "event payload does not match metric type EventCount".into(),
            ));
        };
        let (component_name_hash, value) = encode_integer_event(component, *count);
        Ok(ObservationPayload::IntegerEventObservation {
            event_code: *event_code,
            component_name_hash,
            value,
        })
    }

    fn encode_numeric(&mut self, ctx: &EncodeContext<'_>) -> Result<ObservationPayload, EncoderError> {
        let (event_code, component, value) = match &ctx.event.payload {
            EventPayload::ElapsedTime {
                event_code,
                component,
                elapsed_micros,
            } => (*event_code, component, *elapsed_micros),
            EventPayload::FrameRate {
                event_code,
                component,
                frames_per_1000_seconds,
            } => (*event_code, component, *frames_per_1000_seconds),
            EventPayload::MemoryUsage {
                event_code,
                component,
                bytes,
            } => (*event_code, component, *bytes),
            _ => {
                return Err(EncoderError::InvalidArguments(
                    "event payload does not match a numeric metric type".into(),
                ))
            }
        };
        let (component_name_hash, value) = encode_integer_event(component, value);
        Ok(ObservationPayload::IntegerEventObservation {
            event_code,
            component_name_hash,
            value,
        })
    }

    fn encode_histogram(
        &mut self,
        ctx: &EncodeContext<'_>,
    ) -> Result<ObservationPayload, EncoderError> {
        let EventPayload::IntHistogram {
            event_code,
            component,
            buckets,
        } = &ctx.event.payload
        else {
            return Err(EncoderError::InvalidArguments(
                "event payload does not match metric type IntHistogram".into(),
            ));
        };
        let num_buckets = match &ctx.metric.bucket_spec {
            Some(cobalt_common::BucketSpec::Linear { num_buckets, .. })
            | Some(cobalt_common::BucketSpec::Exponential { num_buckets, .. }) => *num_buckets,
            None => {
                return Err(EncoderError::InvalidConfig(
                    "metric has no histogram bucket spec".into(),
                ))
            }
        };
        for bucket in buckets {
            if bucket.index >= num_buckets {
                return Err(EncoderError::InvalidArguments(format!(
                    "bucket index {} out of range for {num_buckets} buckets",
                    bucket.index
                )));
            }
        }
        let (component_name_hash, buckets) = encode_histogram(component, buckets.clone());
        Ok(ObservationPayload::HistogramObservation {
            event_code: *event_code,
            component_name_hash,
            buckets,
        })
    }

    fn encode_string_rappor(
        &mut self,
        ctx: &EncodeContext<'_>,
    ) -> Result<ObservationPayload, EncoderError> {
        let EventPayload::StringUsed { str_value } = &ctx.event.payload else {
            return Err(EncoderError::InvalidArguments(
                "event payload does not match metric type StringUsed".into(),
            ));
        };
        let noise_level = ctx.report.local_privacy_noise_level.ok_or_else(|| {
            EncoderError::InvalidConfig("report has no local_privacy_noise_level".into())
        })?;
        let params = choose_params(
            ctx.report.expected_population_size,
            ctx.report.expected_string_set_size,
        );
        let cohort = assign_cohort(params.num_cohorts, &mut self.rng);
        let bits = bloom_filter_bits(str_value, cohort, params);
        let data = randomize_bits(&bits, params.num_bloom_bits, noise_level, &mut self.rng);
        Ok(ObservationPayload::RapporObservation { cohort, data })
    }

    fn encode_forculus(&mut self, ctx: &EncodeContext<'_>) -> Result<ObservationPayload, EncoderError> {
        let EventPayload::StringUsed { str_value } = &ctx.event.payload else {
            return Err(EncoderError::InvalidArguments(
                "event payload does not match metric type StringUsed".into(),
            ));
        };
        let threshold = ctx
            .report
            .threshold
            .ok_or_else(|| EncoderError::InvalidConfig("report has no threshold".into()))?;
        let observation = encode_forculus(str_value, threshold, &mut self.rng)?;
        Ok(ObservationPayload::ForculusObservation(observation))
    }

    fn encode_custom(&mut self, ctx: &EncodeContext<'_>) -> Result<ObservationPayload, EncoderError> {
        let EventPayload::Custom { values } = &ctx.event.payload else {
            return Err(EncoderError::InvalidArguments(
                "event payload does not match metric type Custom".into(),
            ));
        };
        Ok(ObservationPayload::CustomObservation(encode_custom(
            values.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobalt_common::{CustomerId, Event, MetricId, ProjectId, ReportDefinition};
    use rand::rngs::mock::StepRng;

    fn rng() -> Box<dyn RngCore + Send> {
        Box::new(StepRng::new(0, 1))
    }

    #[test]
    fn basic_rappor_end_to_end() {
        let mut metric = MetricDefinition::new(
            "ErrorOccurred",
            MetricType::EventOccurred,
            Some(100),
            None,
        );
        let mut report = ReportDefinition::new("ErrorCountsByType", ReportType::SimpleOccurrenceCount);
        report.local_privacy_noise_level = Some(cobalt_common::NoiseLevel::Small);
        metric.add_report(ReportId(123), report);

        let mut encoder = Encoder::new(rng());
        let event = Event {
            day_index: 19000,
            payload: EventPayload::EventOccurred { event_code: 42 },
        };
        let ctx = EncodeContext {
            metric_ref: MetricRef {
                customer_id: CustomerId(1),
                project_id: ProjectId(1),
                metric_id: MetricId(1),
            },
            report_id: ReportId(123),
            metric: &metric,
            report: metric.report(ReportId(123)).unwrap(),
            event: &event,
            client_secret: b"secret",
            system_profile: &SystemProfile::default(),
        };

        let (observation, metadata) = encoder.encode(&ctx).unwrap();
        match observation.payload {
            ObservationPayload::BasicRapporObservation(ref o) => assert_eq!(o.data.len(), 13),
            _ => panic!("expected BasicRapporObservation"),
        }
        assert_eq!(metadata.metric_id, 1);
        assert_eq!(metadata.report_id, 123);
        assert_eq!(metadata.day_index, 19000);
    }

    #[test]
    fn invalid_combination_is_invalid_config() {
        let metric = MetricDefinition::new("ErrorOccurred", MetricType::EventOccurred, Some(100), None);
        let report = ReportDefinition::new("Bogus", ReportType::IntRangeHistogram);
        let mut encoder = Encoder::new(rng());
        let event = Event {
            day_index: 0,
            payload: EventPayload::EventOccurred { event_code: 1 },
        };
        let ctx = EncodeContext {
            metric_ref: MetricRef {
                customer_id: CustomerId(1),
                project_id: ProjectId(1),
                metric_id: MetricId(1),
            },
            report_id: ReportId(1),
            metric: &metric,
            report: &report,
            event: &event,
            client_secret: b"",
            system_profile: &SystemProfile::default(),
        };
        let err = encoder.encode(&ctx).unwrap_err();
        assert!(matches!(err, EncoderError::InvalidConfig(_)));
    }
}
