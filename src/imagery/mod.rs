//! Seam between the dashboard and the hosted imagery service.
//!
//! The service owns the pixels. On our side an image or a collection is only
//! a token that gets passed back into later calls.

pub mod earthengine;

#[cfg(test)]
pub mod mock;

use crate::error::ServiceError;
use crate::pollutant::DisplayRange;
use async_trait::async_trait;
use chrono::NaiveDate;
use geo::{MultiPolygon, Point};
use serde_json::Value;
use std::collections::HashMap;

pub use earthengine::EarthEngineClient;

/// Opaque reference to a filtered image collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionHandle {
    pub(crate) expr: Value,
    pub(crate) band: String,
}

/// Opaque reference to a single (usually computed) image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageHandle {
    pub(crate) expr: Value,
    pub(crate) band: String,
}

impl ImageHandle {
    pub fn band(&self) -> &str {
        &self.band
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    /// Value of the first pixel matching the geometry.
    First,
}

/// Band name to value. `None` means the band is masked at that location.
pub type BandValues = HashMap<String, Option<f64>>;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[async_trait]
pub trait ImageryService: Send + Sync {
    /// Images of `dataset` acquired in `[start, end)` whose footprint
    /// intersects `aoi`, restricted to `band`.
    async fn find_images(
        &self,
        dataset: &str,
        band: &str,
        start: NaiveDate,
        end: NaiveDate,
        aoi: &MultiPolygon<f64>,
    ) -> ServiceResult<CollectionHandle>;

    async fn collection_size(&self, collection: &CollectionHandle) -> ServiceResult<u64>;

    async fn temporal_mean(&self, collection: &CollectionHandle) -> ServiceResult<ImageHandle>;

    async fn clip(&self, image: &ImageHandle, aoi: &MultiPolygon<f64>) -> ServiceResult<ImageHandle>;

    async fn reduce_at_point(
        &self,
        image: &ImageHandle,
        point: Point<f64>,
        reducer: Reducer,
        scale: f64,
    ) -> ServiceResult<BandValues>;

    /// Returns a `{z}/{x}/{y}` tile URL template for the rendered image.
    async fn render_tile_layer(&self, image: &ImageHandle, display: &DisplayRange) -> ServiceResult<String>;
}
