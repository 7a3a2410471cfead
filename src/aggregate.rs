//! Concurrent multi-region aggregation
//!
//! Fans a single request out to one task per region and collects the values
//! into a `CarbonMap`. The first error (or the context expiring) wins; tasks
//! still in flight are left to finish on their own and their late writes go
//! through the same lock as every other write.

use crate::context::Context;
use crate::error::{GridError, GridResult};
use crate::provider::Provider;
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Region to intensity map shared by the region tasks
#[derive(Debug, Default)]
pub struct CarbonMap {
    inner: RwLock<HashMap<String, f64>>,
}

impl CarbonMap {
    /// Create an empty map sized for `capacity` regions
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Set the value for a region
    pub fn set(&self, region: impl Into<String>, intensity: f64) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(region.into(), intensity);
    }

    /// Value for a single region
    pub fn get(&self, region: &str) -> Option<f64> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(region)
            .copied()
    }

    /// Snapshot of every entry
    pub fn get_all(&self) -> HashMap<String, f64> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fetch the carbon intensity for every region concurrently.
///
/// Returns once all regions have a value, or with the first error observed.
/// `GridError::Timeout` is returned when `ctx` is cancelled or expires first,
/// even if some region requests would later succeed.
pub async fn get_carbon_intensity_map<P, S>(
    ctx: &Context,
    provider: Arc<P>,
    regions: &[S],
) -> GridResult<HashMap<String, f64>>
where
    P: Provider + ?Sized + 'static,
    S: AsRef<str>,
{
    if regions.is_empty() {
        return Err(GridError::NoRegionProvided);
    }

    let map = Arc::new(CarbonMap::with_capacity(regions.len()));

    // Dropping a JoinHandle detaches the task rather than aborting it, so an
    // early return leaves in-flight requests running.
    let mut pending: FuturesUnordered<_> = regions
        .iter()
        .map(|region| {
            let region = region.as_ref().to_string();
            let provider = Arc::clone(&provider);
            let map = Arc::clone(&map);
            let ctx = ctx.clone();

            tokio::spawn(async move {
                let intensity = provider.get_carbon_intensity(&ctx, &region).await?;
                map.set(region, intensity);
                Ok::<(), GridError>(())
            })
        })
        .collect();

    let mut remaining = regions.len();
    debug!("Waiting on {} region requests", remaining);

    while remaining > 0 {
        tokio::select! {
            biased;

            _ = ctx.done() => return Err(GridError::Timeout),
            next = pending.next() => match next {
                Some(Ok(Ok(()))) => remaining -= 1,
                Some(Ok(Err(e))) => return Err(e),
                Some(Err(e)) => return Err(GridError::Task(e.to_string())),
                None => break,
            },
        }
    }

    Ok(map.get_all())
}
