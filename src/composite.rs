//! Monthly mean composites over the area of interest, memoized per
//! `(pollutant, year, month)`.

use crate::aoi::AreaOfInterest;
use crate::error::{DashboardError, DashboardResult};
use crate::imagery::{ImageHandle, ImageryService};
use crate::pollutant::Pollutant;
use chrono::{Months, NaiveDate};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompositeRequest {
    pub pollutant: Pollutant,
    pub year: i32,
    pub month: u32,
}

impl CompositeRequest {
    pub fn new(pollutant: Pollutant, year: i32, month: u32) -> DashboardResult<Self> {
        month_range(year, month)?;
        Ok(Self { pollutant, year, month })
    }

    /// Layer name shown in the map control, e.g. "NO₂ 2021-03".
    pub fn layer_name(&self) -> String {
        format!("{} {}-{:02}", self.pollutant, self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompositeResult {
    Ready(ImageHandle),
    /// No source image was acquired over the AOI in that month.
    Empty,
}

impl CompositeResult {
    pub fn is_empty(&self) -> bool {
        matches!(self, CompositeResult::Empty)
    }
}

/// First day of the month and first day of the next one, as a half-open range.
pub fn month_range(year: i32, month: u32) -> DashboardResult<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
        DashboardError::Validation(format!("invalid month {}-{}", year, month))
    })?;
    let end = start
        .checked_add_months(Months::new(1))
        .ok_or_else(|| DashboardError::Validation(format!("month {}-{} is out of range", year, month)))?;
    Ok((start, end))
}

struct CachedComposite {
    result: CompositeResult,
    inserted_at: Instant,
}

/// One slot per request. The cell is filled at most once; a failed
/// computation leaves it empty so the next caller retries.
type Slot = Arc<OnceCell<CachedComposite>>;

pub struct CompositeBuilder {
    service: Arc<dyn ImageryService>,
    aoi: Arc<AreaOfInterest>,
    ttl: Duration,
    cache: Mutex<HashMap<CompositeRequest, Slot>>,
}

impl CompositeBuilder {
    pub fn new(service: Arc<dyn ImageryService>, aoi: Arc<AreaOfInterest>, ttl: Duration) -> Self {
        Self {
            service,
            aoi,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn build_composite(&self, pollutant_id: &str, year: i32, month: u32) -> DashboardResult<CompositeResult> {
        let pollutant: Pollutant = pollutant_id.parse()?;
        self.build(CompositeRequest::new(pollutant, year, month)?).await
    }

    pub async fn build(&self, request: CompositeRequest) -> DashboardResult<CompositeResult> {
        let slot = self.slot(request).await;

        // the map lock is released here; callers for the same key wait on
        // the cell, callers for other keys are not blocked
        let entry = slot
            .get_or_try_init(|| async {
                let result = self.compute(request).await.map_err(|e| {
                    warn!(layer = %request.layer_name(), error = %e, "Composite request failed");
                    e
                })?;
                Ok::<_, DashboardError>(CachedComposite { result, inserted_at: Instant::now() })
            })
            .await?;
        Ok(entry.result.clone())
    }

    async fn slot(&self, request: CompositeRequest) -> Slot {
        let mut cache = self.cache.lock().await;

        if let Some(slot) = cache.get(&request) {
            match slot.get() {
                Some(entry) if entry.inserted_at.elapsed() >= self.ttl => {
                    debug!(layer = %request.layer_name(), "Composite cache entry expired");
                }
                Some(_) => {
                    debug!(layer = %request.layer_name(), "Composite cache hit");
                    return slot.clone();
                }
                None => return slot.clone(),
            }
        }

        let slot: Slot = Arc::new(OnceCell::new());
        cache.insert(request, slot.clone());
        slot
    }

    async fn compute(&self, request: CompositeRequest) -> DashboardResult<CompositeResult> {
        let spec = request.pollutant.spec();
        let (start, end) = month_range(request.year, request.month)?;

        let collection = self.service
            .find_images(spec.dataset, spec.band, start, end, &self.aoi.geometry)
            .await?;
        let count = self.service.collection_size(&collection).await?;
        if count == 0 {
            info!(layer = %request.layer_name(), "No source images for month");
            return Ok(CompositeResult::Empty);
        }

        let mean = self.service.temporal_mean(&collection).await?;
        let clipped = self.service.clip(&mean, &self.aoi.geometry).await?;
        info!(layer = %request.layer_name(), images = count, "Built monthly composite");
        Ok(CompositeResult::Ready(clipped))
    }

    /// Drops every entry. Computations already in flight finish into
    /// their detached slot and are not cached.
    pub async fn invalidate(&self) -> usize {
        let mut cache = self.cache.lock().await;
        let dropped = cache.values().filter(|slot| slot.initialized()).count();
        cache.clear();
        dropped
    }

    /// Number of computed composites currently held.
    pub async fn cached_entries(&self) -> usize {
        self.cache.lock().await.values().filter(|slot| slot.initialized()).count()
    }
}
