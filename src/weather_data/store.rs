use crate::types::weather_reading::WeatherReading;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Authoritative mapping of station id to its latest known reading.
///
/// Owned by the loader and shared read-only with consumers, who re-poll
/// [`StationWeatherStore::snapshot`] whenever they want fresh data. Entries are
/// replaced wholesale and never expire.
///
/// The store also carries a monotonic load generation. Each load run takes a
/// new generation and tags its writes with it, which lets the store tell a
/// superseded run's late results apart from current ones.
#[derive(Debug, Clone, Default)]
pub struct StationWeatherStore {
    inner: Arc<RwLock<StoreState>>,
}

#[derive(Debug, Default)]
struct StoreState {
    readings: HashMap<String, WeatherReading>,
    generation: u64,
}

impl StationWeatherStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new load generation and returns it. Older generations become stale.
    pub(crate) async fn begin_generation(&self) -> u64 {
        let mut state = self.inner.write().await;
        state.generation += 1;
        state.generation
    }

    pub async fn current_generation(&self) -> u64 {
        self.inner.read().await.generation
    }

    /// Replaces the entry for `station_id` unconditionally.
    pub(crate) async fn insert(&self, station_id: &str, reading: WeatherReading) {
        self.inner
            .write()
            .await
            .readings
            .insert(station_id.to_string(), reading);
    }

    /// Replaces the entry for `station_id` only if `generation` is still current.
    ///
    /// Returns whether the write was applied.
    pub(crate) async fn insert_if_current(
        &self,
        generation: u64,
        station_id: &str,
        reading: WeatherReading,
    ) -> bool {
        let mut state = self.inner.write().await;
        if generation < state.generation {
            return false;
        }
        state.readings.insert(station_id.to_string(), reading);
        true
    }

    pub async fn get(&self, station_id: &str) -> Option<WeatherReading> {
        self.inner.read().await.readings.get(station_id).cloned()
    }

    /// Copy of every entry at this instant.
    pub async fn snapshot(&self) -> HashMap<String, WeatherReading> {
        self.inner.read().await.readings.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.readings.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.readings.is_empty()
    }
}
