use crate::composite::CompositeResult;
use crate::error::DashboardResult;
use crate::imagery::{ImageryService, Reducer};
use crate::pollutant::PollutantSpec;
use crate::types::Coordinate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

pub const NO_DATA_TEXT: &str = "No data at this location.";
pub const UNAVAILABLE_TEXT: &str = "No imagery available for this month.";
pub const ERROR_TEXT: &str = "Error retrieving value.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SampleResult {
    Value { value: f64, unit: &'static str },
    /// The band is masked at this location.
    NoData { unit: &'static str },
    /// The composite was empty, nothing was asked of the service.
    Unavailable,
}

impl SampleResult {
    pub fn value(&self) -> Option<f64> {
        match self {
            SampleResult::Value { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn display_text(&self, spec: &PollutantSpec, at: Coordinate) -> String {
        match self {
            SampleResult::Value { value, unit } => format!(
                "{} @ ({:.4}, {:.4}): {:.6} {}",
                spec.label, at.lat, at.lon, value, unit
            ),
            SampleResult::NoData { .. } => NO_DATA_TEXT.to_string(),
            SampleResult::Unavailable => UNAVAILABLE_TEXT.to_string(),
        }
    }
}

pub struct PointSampler {
    service: Arc<dyn ImageryService>,
    scale: f64,
}

impl PointSampler {
    pub fn new(service: Arc<dyn ImageryService>, scale: f64) -> Self {
        Self { service, scale }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub async fn sample_point(
        &self,
        composite: &CompositeResult,
        spec: &PollutantSpec,
        lat: f64,
        lon: f64,
    ) -> DashboardResult<SampleResult> {
        let at = Coordinate::new(lat, lon)?;
        self.sample(composite, spec, at).await
    }

    pub async fn sample(
        &self,
        composite: &CompositeResult,
        spec: &PollutantSpec,
        at: Coordinate,
    ) -> DashboardResult<SampleResult> {
        let image = match composite {
            CompositeResult::Ready(image) => image,
            CompositeResult::Empty => return Ok(SampleResult::Unavailable),
        };

        let values = self.service
            .reduce_at_point(image, at.to_point(), Reducer::First, self.scale)
            .await
            .map_err(|e| {
                warn!(lat = at.lat, lon = at.lon, error = %e, "Point sample failed");
                e
            })?;

        let value = values.get(spec.band).copied().flatten();
        debug!(lat = at.lat, lon = at.lon, band = spec.band, ?value, "Sampled point");
        Ok(match value {
            Some(value) => SampleResult::Value { value, unit: spec.unit },
            None => SampleResult::NoData { unit: spec.unit },
        })
    }
}
