//! Everything a request needs, built once at startup and shared.
//!
//! Each method here ends in a renderable state: success, empty or an error
//! message. Nothing below the HTTP layer is allowed to surface as a fault.

use crate::aoi::{self, AreaOfInterest};
use crate::composite::{CompositeBuilder, CompositeRequest, CompositeResult};
use crate::config::{AppConfig, UiConfig};
use crate::error::{DashboardError, DashboardResult};
use crate::imagery::{EarthEngineClient, ImageryService};
use crate::legend::{compute_legend, LegendEntry};
use crate::pollutant::{self, Pollutant};
use crate::sampler::{PointSampler, SampleResult, ERROR_TEXT};
use crate::types::Coordinate;
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Shown for any layer failure; the service detail goes to the log only.
pub const LAYER_ERROR_TEXT: &str = "Error retrieving map layer.";

pub struct AppContext {
    pub service: Arc<dyn ImageryService>,
    pub aoi: Arc<AreaOfInterest>,
    pub composites: CompositeBuilder,
    pub sampler: PointSampler,
    pub ui: UiConfig,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LayerState {
    Ready { name: String, tile_url: String },
    Empty { name: String, message: String },
    Invalid { message: String },
    Error { message: String },
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InspectState {
    Value { text: String, value: f64, unit: String },
    NoData { text: String },
    Unavailable { text: String },
    Invalid { text: String },
    Error { text: String },
}

#[derive(Debug, Serialize)]
pub struct LegendView {
    pub pollutant: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    pub entries: Vec<LegendRow>,
}

#[derive(Debug, Serialize)]
pub struct LegendRow {
    pub color: &'static str,
    pub value: f64,
    pub label: String,
}

impl From<LegendEntry> for LegendRow {
    fn from(entry: LegendEntry) -> Self {
        let label = entry.label();
        Self { color: entry.color, value: entry.value, label }
    }
}

impl AppContext {
    pub fn new(service: Arc<dyn ImageryService>, aoi: AreaOfInterest, config: &AppConfig) -> Self {
        let aoi = Arc::new(aoi);
        Self {
            composites: CompositeBuilder::new(
                service.clone(),
                aoi.clone(),
                Duration::from_secs(config.cache.ttl_secs),
            ),
            sampler: PointSampler::new(service.clone(), config.sampling.scale_m),
            service,
            aoi,
            ui: config.ui.clone(),
        }
    }

    /// Validates the static tables, loads the AOI and connects to Earth Engine.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        pollutant::validate_table()?;
        let aoi = aoi::load_aoi(&config.input.aoi, &config.input.aoi_name)?;
        let client = EarthEngineClient::from_config(&config.service, config.sampling.max_pixels)?;
        info!(
            project = %config.service.project,
            scale_m = config.sampling.scale_m,
            cache_ttl_secs = config.cache.ttl_secs,
            "Imagery client ready"
        );
        Ok(Self::new(Arc::new(client), aoi, config))
    }

    pub async fn layer(&self, pollutant_id: &str, year: i32, month: u32) -> LayerState {
        let request = match parse_request(pollutant_id, year, month) {
            Ok(request) => request,
            Err(e) => return LayerState::Invalid { message: e.to_string() },
        };
        let name = request.layer_name();

        let composite = match self.composites.build(request).await {
            Ok(CompositeResult::Ready(image)) => image,
            Ok(CompositeResult::Empty) => {
                return LayerState::Empty {
                    name,
                    message: format!("No {} imagery for {}-{:02}.", request.pollutant, year, month),
                }
            }
            Err(_) => return LayerState::Error { message: LAYER_ERROR_TEXT.to_string() },
        };

        match self.service.render_tile_layer(&composite, &request.pollutant.spec().display).await {
            Ok(tile_url) => LayerState::Ready { name, tile_url },
            Err(e) => {
                warn!(layer = %name, error = %e, "Tile layer request failed");
                LayerState::Error { message: LAYER_ERROR_TEXT.to_string() }
            }
        }
    }

    /// Point inspection for typed or clicked coordinates.
    pub async fn inspect(&self, pollutant_id: &str, year: i32, month: u32, lat: &str, lon: &str) -> InspectState {
        let (request, at) = match parse_request(pollutant_id, year, month)
            .and_then(|request| Ok((request, Coordinate::parse(lat, lon)?)))
        {
            Ok(parsed) => parsed,
            Err(e) => return InspectState::Invalid { text: e.to_string() },
        };
        let spec = request.pollutant.spec();

        let sampled = match self.composites.build(request).await {
            Ok(composite) => self.sampler.sample(&composite, spec, at).await,
            Err(e) => Err(e),
        };

        match sampled {
            Ok(result @ SampleResult::Value { value, unit }) => InspectState::Value {
                text: result.display_text(spec, at),
                value,
                unit: unit.to_string(),
            },
            Ok(result @ SampleResult::NoData { .. }) => InspectState::NoData { text: result.display_text(spec, at) },
            Ok(result @ SampleResult::Unavailable) => InspectState::Unavailable { text: result.display_text(spec, at) },
            Err(DashboardError::Validation(msg)) => InspectState::Invalid { text: msg },
            Err(_) => InspectState::Error { text: ERROR_TEXT.to_string() },
        }
    }
}

pub fn legend_view(pollutant_id: &str) -> DashboardResult<LegendView> {
    let pollutant: Pollutant = pollutant_id.parse()?;
    let spec = pollutant.spec();
    Ok(LegendView {
        pollutant: spec.id,
        label: spec.label,
        unit: spec.unit,
        entries: compute_legend(&spec.display).into_iter().map(LegendRow::from).collect(),
    })
}

fn parse_request(pollutant_id: &str, year: i32, month: u32) -> DashboardResult<CompositeRequest> {
    let pollutant: Pollutant = pollutant_id.parse()?;
    CompositeRequest::new(pollutant, year, month)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::aoi::aoi_from_geojson_str;
    use crate::imagery::mock::MockImageryService;
    use std::sync::atomic::Ordering;

    const AOI: &str = r#"{"type": "Polygon", "coordinates": [[[90.1, 23.7], [90.4, 23.7], [90.4, 24.0], [90.1, 23.7]]]}"#;

    pub(crate) fn test_context(mock: Arc<MockImageryService>) -> AppContext {
        let config = AppConfig::from_toml(
            r#"
            [input]
            aoi = "unused.geojson"
            [service]
            project = "test"
            [server]
            port = 0
            "#,
        )
        .unwrap();
        let aoi = aoi_from_geojson_str("Savar", AOI).unwrap();
        AppContext::new(mock, aoi, &config)
    }

    #[tokio::test]
    async fn layer_is_ready_with_tile_url() {
        let mock = Arc::new(MockImageryService::with_images(2));
        let ctx = test_context(mock);
        let state = ctx.layer("no2", 2021, 3).await;
        assert_eq!(
            state,
            LayerState::Ready {
                name: "NO₂ 2021-03".to_string(),
                tile_url: "https://tiles.test/tropospheric_NO2_column_number_density/{z}/{x}/{y}".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn layer_is_empty_without_images() {
        let ctx = test_context(Arc::new(MockImageryService::with_images(0)));
        assert!(matches!(ctx.layer("co", 2018, 1).await, LayerState::Empty { .. }));
    }

    #[tokio::test]
    async fn layer_reports_service_errors() {
        let mock = Arc::new(MockImageryService::with_images(2));
        mock.fail.store(true, Ordering::SeqCst);
        let ctx = test_context(mock);
        // the mock's response body must not reach the browser
        assert_eq!(
            ctx.layer("co", 2018, 1).await,
            LayerState::Error { message: LAYER_ERROR_TEXT.to_string() }
        );
    }

    #[tokio::test]
    async fn inspect_formats_value() {
        let mock = Arc::new(MockImageryService::with_images(2));
        mock.set_value("CO_column_number_density", Some(0.0345));
        let ctx = test_context(mock);

        let state = ctx.inspect("co", 2021, 1, "23.8351", "90.2564").await;
        assert_eq!(
            state,
            InspectState::Value {
                text: "CO @ (23.8351, 90.2564): 0.034500 mol/m²".to_string(),
                value: 0.0345,
                unit: "mol/m²".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn inspect_rejects_bad_input_without_service_calls() {
        let mock = Arc::new(MockImageryService::with_images(2));
        let ctx = test_context(mock.clone());

        assert!(matches!(ctx.inspect("co", 2021, 1, "abc", "90").await, InspectState::Invalid { .. }));
        assert!(matches!(ctx.inspect("co", 2021, 1, "91", "90").await, InspectState::Invalid { .. }));
        assert!(matches!(ctx.inspect("co", 2021, 13, "23", "90").await, InspectState::Invalid { .. }));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn inspect_distinguishes_empty_and_error() {
        let ctx = test_context(Arc::new(MockImageryService::with_images(0)));
        assert!(matches!(ctx.inspect("o3", 2021, 1, "23.8", "90.2").await, InspectState::Unavailable { .. }));

        let failing = Arc::new(MockImageryService::with_images(1));
        failing.fail.store(true, Ordering::SeqCst);
        let ctx = test_context(failing);
        assert_eq!(
            ctx.inspect("o3", 2021, 1, "23.8", "90.2").await,
            InspectState::Error { text: ERROR_TEXT.to_string() }
        );
    }

    #[test]
    fn legend_view_labels_entries() {
        let view = legend_view("no2").unwrap();
        assert_eq!(view.unit, "mol/m²");
        assert_eq!(view.entries.len(), 5);
        assert_eq!(view.entries[4].label, "0.000300");
        assert!(legend_view("xyz").is_err());
    }
}
