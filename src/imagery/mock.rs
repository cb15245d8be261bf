//! In-memory imagery service for tests. Counts every call.

use super::{BandValues, CollectionHandle, ImageHandle, ImageryService, Reducer, ServiceResult};
use crate::error::ServiceError;
use crate::pollutant::DisplayRange;
use async_trait::async_trait;
use chrono::NaiveDate;
use geo::{MultiPolygon, Point};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct MockImageryService {
    pub image_count: AtomicU64,
    pub fail: AtomicBool,
    pub values: Mutex<BandValues>,
    pub calls: AtomicUsize,
    pub size_calls: AtomicUsize,
    pub reduce_calls: AtomicUsize,
    /// Last `(x, y)` passed to `reduce_at_point`, and its scale.
    pub last_point: Mutex<Option<(f64, f64, f64)>>,
    /// Last `[start, end)` passed to `find_images`.
    pub last_range: Mutex<Option<(NaiveDate, NaiveDate)>>,
    /// `find_images` sleeps this long when asked for the given month start.
    pub slow_month: Mutex<Option<(NaiveDate, Duration)>>,
}

impl MockImageryService {
    pub fn with_images(count: u64) -> Self {
        let mock = Self::default();
        mock.image_count.store(count, Ordering::SeqCst);
        mock
    }

    pub fn set_value(&self, band: &str, value: Option<f64>) {
        self.values.lock().unwrap().insert(band.to_string(), value);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) -> ServiceResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::Status { code: 503, body: "unavailable".to_string() });
        }
        Ok(())
    }
}

#[async_trait]
impl ImageryService for MockImageryService {
    async fn find_images(
        &self,
        dataset: &str,
        band: &str,
        start: NaiveDate,
        end: NaiveDate,
        _aoi: &MultiPolygon<f64>,
    ) -> ServiceResult<CollectionHandle> {
        self.record()?;
        *self.last_range.lock().unwrap() = Some((start, end));
        let slow_month = *self.slow_month.lock().unwrap();
        let delay = match slow_month {
            Some((month, delay)) if month == start => Some(delay),
            _ => None,
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(CollectionHandle {
            expr: json!({ "dataset": dataset, "start": start.to_string(), "end": end.to_string() }),
            band: band.to_string(),
        })
    }

    async fn collection_size(&self, _collection: &CollectionHandle) -> ServiceResult<u64> {
        self.record()?;
        self.size_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.image_count.load(Ordering::SeqCst))
    }

    async fn temporal_mean(&self, collection: &CollectionHandle) -> ServiceResult<ImageHandle> {
        self.record()?;
        Ok(ImageHandle { expr: json!({ "mean": collection.expr }), band: collection.band.clone() })
    }

    async fn clip(&self, image: &ImageHandle, _aoi: &MultiPolygon<f64>) -> ServiceResult<ImageHandle> {
        self.record()?;
        Ok(ImageHandle { expr: json!({ "clip": image.expr }), band: image.band.clone() })
    }

    async fn reduce_at_point(
        &self,
        _image: &ImageHandle,
        point: Point<f64>,
        _reducer: Reducer,
        scale: f64,
    ) -> ServiceResult<BandValues> {
        self.record()?;
        self.reduce_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_point.lock().unwrap() = Some((point.x(), point.y(), scale));
        Ok(self.values.lock().unwrap().clone())
    }

    async fn render_tile_layer(&self, image: &ImageHandle, _display: &DisplayRange) -> ServiceResult<String> {
        self.record()?;
        Ok(format!("https://tiles.test/{}/{{z}}/{{x}}/{{y}}", image.band))
    }
}
