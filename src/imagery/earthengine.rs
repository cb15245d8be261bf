//! Earth Engine REST client.
//!
//! Lazy operations (filter, mean, clip) only grow a serialized expression
//! graph. Remote calls happen in `collection_size`, `reduce_at_point` and
//! `render_tile_layer`, which post the graph to `value:compute` or `maps`.

use super::{BandValues, CollectionHandle, ImageHandle, ImageryService, Reducer, ServiceResult};
use crate::config::ServiceConfig;
use crate::error::{DashboardError, DashboardResult, ServiceError};
use crate::pollutant::DisplayRange;
use async_trait::async_trait;
use chrono::NaiveDate;
use geo::{MultiPolygon, Point};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

pub struct EarthEngineClient {
    client: Client,
    base_url: String,
    project: String,
    token: RwLock<String>,
    /// Re-read when the service rejects the current token.
    token_env: Option<String>,
    max_pixels: f64,
}

#[derive(Deserialize)]
struct ComputeResponse {
    result: Value,
}

#[derive(Deserialize)]
struct MapResponse {
    name: String,
}

impl EarthEngineClient {
    /// Builds a client from config, reading the bearer token from the
    /// environment variable the config names. The variable is read again
    /// whenever a request comes back unauthorized, so an operator can rotate
    /// short-lived tokens without restarting.
    pub fn from_config(config: &ServiceConfig, max_pixels: f64) -> DashboardResult<Self> {
        let token = std::env::var(&config.access_token_env).map_err(|_| {
            DashboardError::Configuration(format!(
                "environment variable {} with an Earth Engine access token is not set",
                config.access_token_env
            ))
        })?;
        Self::new(
            &config.base_url,
            &config.project,
            token,
            Duration::from_secs(config.timeout_secs),
            max_pixels,
        )
        .map(|client| client.with_token_env(&config.access_token_env))
    }

    pub fn new(
        base_url: &str,
        project: &str,
        token: String,
        timeout: Duration,
        max_pixels: f64,
    ) -> DashboardResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DashboardError::Configuration(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            project: project.to_string(),
            token: RwLock::new(token),
            token_env: None,
            max_pixels,
        })
    }

    pub fn with_token_env(mut self, name: &str) -> Self {
        self.token_env = Some(name.to_string());
        self
    }

    async fn post(&self, path: &str, body: &Value) -> ServiceResult<reqwest::Response> {
        let token = self.token.read().await.clone();
        match self.send(path, body, &token).await {
            Err(ServiceError::Auth(reason)) => match self.refreshed_token(&token).await {
                Some(fresh) => {
                    info!("Retrying Earth Engine request with refreshed access token");
                    self.send(path, body, &fresh).await
                }
                None => Err(ServiceError::Auth(reason)),
            },
            other => other,
        }
    }

    async fn refreshed_token(&self, stale: &str) -> Option<String> {
        let name = self.token_env.as_ref()?;
        let fresh = std::env::var(name).ok()?;
        if fresh.is_empty() || fresh == stale {
            return None;
        }
        *self.token.write().await = fresh.clone();
        Some(fresh)
    }

    async fn send(&self, path: &str, body: &Value, token: &str) -> ServiceResult<reqwest::Response> {
        let url = format!("{}/projects/{}/{}", self.base_url, self.project, path);
        debug!(url = %url, "Posting Earth Engine request");

        let response = self.client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ServiceError::Auth(body),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ServiceError::Timeout,
            _ => ServiceError::Status { code: status.as_u16(), body },
        })
    }

    async fn compute(&self, root: Value) -> ServiceResult<Value> {
        let body = json!({ "expression": expression(root) });
        let response: ComputeResponse = self.post("value:compute", &body).await?.json().await?;
        Ok(response.result)
    }
}

#[async_trait]
impl ImageryService for EarthEngineClient {
    async fn find_images(
        &self,
        dataset: &str,
        band: &str,
        start: NaiveDate,
        end: NaiveDate,
        aoi: &MultiPolygon<f64>,
    ) -> ServiceResult<CollectionHandle> {
        Ok(CollectionHandle {
            expr: filtered_collection(dataset, start, end, aoi),
            band: band.to_string(),
        })
    }

    #[instrument(skip_all)]
    async fn collection_size(&self, collection: &CollectionHandle) -> ServiceResult<u64> {
        let result = self.compute(invoke("Collection.size", json!({ "collection": collection.expr }))).await?;
        result.as_u64()
            .ok_or_else(|| ServiceError::Decode(format!("collection size is not an integer: {}", result)))
    }

    async fn temporal_mean(&self, collection: &CollectionHandle) -> ServiceResult<ImageHandle> {
        let mean = invoke("reduce.mean", json!({ "collection": collection.expr }));
        let selected = invoke("Image.select", json!({
            "input": mean,
            "bandSelectors": constant(json!([collection.band])),
        }));
        Ok(ImageHandle { expr: selected, band: collection.band.clone() })
    }

    async fn clip(&self, image: &ImageHandle, aoi: &MultiPolygon<f64>) -> ServiceResult<ImageHandle> {
        let clipped = invoke("Image.clip", json!({
            "input": image.expr,
            "geometry": multipolygon_geometry(aoi),
        }));
        Ok(ImageHandle { expr: clipped, band: image.band.clone() })
    }

    #[instrument(skip(self, image), fields(band = %image.band))]
    async fn reduce_at_point(
        &self,
        image: &ImageHandle,
        point: Point<f64>,
        reducer: Reducer,
        scale: f64,
    ) -> ServiceResult<BandValues> {
        let root = reduce_region(image, point, reducer, scale, self.max_pixels);
        let result = self.compute(root).await?;
        parse_band_values(result)
    }

    #[instrument(skip_all, fields(band = %image.band))]
    async fn render_tile_layer(&self, image: &ImageHandle, display: &DisplayRange) -> ServiceResult<String> {
        let body = json!({
            "expression": expression(image.expr.clone()),
            "fileFormat": "AUTO_JPEG_PNG",
            "bandIds": [image.band],
            "visualizationOptions": {
                "ranges": [{ "min": display.min, "max": display.max }],
                "paletteColors": display.palette,
            },
        });
        let map: MapResponse = self.post("maps", &body).await?.json().await?;
        Ok(tile_url(&self.base_url, &map.name))
    }
}

fn constant(value: Value) -> Value {
    json!({ "constantValue": value })
}

fn invoke(function: &str, arguments: Value) -> Value {
    json!({
        "functionInvocationValue": {
            "functionName": function,
            "arguments": arguments,
        }
    })
}

fn expression(root: Value) -> Value {
    json!({ "result": "0", "values": { "0": root } })
}

pub(crate) fn point_geometry(point: Point<f64>) -> Value {
    invoke("GeometryConstructors.Point", json!({
        "coordinates": constant(json!([point.x(), point.y()])),
    }))
}

pub(crate) fn multipolygon_geometry(geometry: &MultiPolygon<f64>) -> Value {
    let coordinates = match geojson::Value::from(geometry) {
        geojson::Value::MultiPolygon(coords) => json!(coords),
        other => json!(other),
    };
    invoke("GeometryConstructors.MultiPolygon", json!({
        "coordinates": constant(coordinates),
        "evenOdd": constant(json!(true)),
    }))
}

/// `[start, end)` on acquisition time plus footprint intersection.
pub(crate) fn filtered_collection(
    dataset: &str,
    start: NaiveDate,
    end: NaiveDate,
    aoi: &MultiPolygon<f64>,
) -> Value {
    let loaded = invoke("ImageCollection.load", json!({ "id": constant(json!(dataset)) }));
    let date_filter = invoke("Filter.dateRangeContains", json!({
        "leftValue": invoke("DateRange", json!({
            "start": constant(json!(start.format("%Y-%m-%d").to_string())),
            "end": constant(json!(end.format("%Y-%m-%d").to_string())),
        })),
        "rightField": constant(json!("system:time_start")),
    }));
    let by_date = invoke("Collection.filter", json!({ "collection": loaded, "filter": date_filter }));
    let bounds_filter = invoke("Filter.intersects", json!({
        "leftField": constant(json!(".all")),
        "rightValue": multipolygon_geometry(aoi),
    }));
    invoke("Collection.filter", json!({ "collection": by_date, "filter": bounds_filter }))
}

pub(crate) fn reduce_region(
    image: &ImageHandle,
    point: Point<f64>,
    reducer: Reducer,
    scale: f64,
    max_pixels: f64,
) -> Value {
    let reducer = match reducer {
        Reducer::First => invoke("Reducer.first", json!({})),
    };
    invoke("Image.reduceRegion", json!({
        "image": image.expr,
        "reducer": reducer,
        "geometry": point_geometry(point),
        "scale": constant(json!(scale)),
        "maxPixels": constant(json!(max_pixels)),
    }))
}

pub(crate) fn parse_band_values(result: Value) -> ServiceResult<BandValues> {
    match result {
        Value::Object(map) => Ok(map.into_iter().map(|(band, value)| (band, value.as_f64())).collect()),
        other => Err(ServiceError::Decode(format!("expected a band dictionary, got {}", other))),
    }
}

pub(crate) fn tile_url(base_url: &str, map_name: &str) -> String {
    format!("{}/{}/tiles/{{z}}/{{x}}/{{y}}", base_url.trim_end_matches('/'), map_name)
}
