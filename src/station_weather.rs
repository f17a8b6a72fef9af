//! Main entry point: one rate-limited client for the station service plus the
//! batch loader and store that sit on top of it.

use crate::error::StationWeatherError;
use crate::scheduler::rate_limiter::{RateLimit, RequestScheduler};
use crate::stations::catalog::StationCatalog;
use crate::types::fetch_outcome::FetchOutcome;
use crate::types::station::Station;
use crate::types::weather_reading::WeatherReading;
use crate::weather_data::client::{ReadingSource, WeatherClient};
use crate::weather_data::loader::{LoaderConfig, WeatherLoader};
use crate::weather_data::store::StationWeatherStore;
use bon::bon;
use std::collections::HashMap;
use std::time::Duration;

/// Ingestion pipeline for station catalogs and latest weather readings.
///
/// Every request made through one `StationWeather` (catalog, per-station
/// history, batch loads) shares a single [`RequestScheduler`], so the rate
/// ceiling holds across all of them. Results of [`StationWeather::load_weather`]
/// are merged into a [`StationWeatherStore`] that consumers can poll.
///
/// Construction spawns the scheduler's background tick, so it must happen
/// inside a Tokio runtime.
///
/// # Examples
///
/// ```no_run
/// # use station_weather::{StationWeather, StationWeatherError};
/// # #[tokio::main]
/// # async fn main() -> Result<(), StationWeatherError> {
/// let client = StationWeather::new()?;
/// let catalog = client.fetch_catalog().await;
///
/// let stations = client
///     .load_weather(catalog.first(50), 5, |completed, total| {
///         println!("{completed}/{total}");
///     })
///     .await;
/// println!("{} stations with weather", stations.iter().filter(|s| s.has_weather()).count());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct StationWeather {
    client: WeatherClient,
    loader: WeatherLoader<WeatherClient>,
}

#[bon]
impl StationWeather {
    /// Creates a pipeline with explicit settings. Every setting is optional.
    ///
    /// * `.base_url(..)`: root of the station service, defaults to [`crate::config::BASE_URL`].
    /// * `.request_timeout(..)`: per-request timeout, defaults to [`crate::config::REQUEST_TIMEOUT`].
    /// * `.rate_limit(..)`: scheduler ceiling and window, defaults to 20 requests per 60 s.
    /// * `.loader_config(..)`: pacing delays and supersede policy.
    ///
    /// # Errors
    ///
    /// Returns [`StationWeatherError::InvalidBaseUrl`] or [`StationWeatherError::ClientBuild`]
    /// if the HTTP client cannot be set up.
    #[builder(start_fn = builder, finish_fn = build)]
    pub fn with_options(
        #[builder(into)] base_url: Option<String>,
        request_timeout: Option<Duration>,
        rate_limit: Option<RateLimit>,
        loader_config: Option<LoaderConfig>,
    ) -> Result<Self, StationWeatherError> {
        let scheduler = RequestScheduler::new(rate_limit.unwrap_or_default());
        let client = WeatherClient::builder()
            .scheduler(scheduler)
            .maybe_base_url(base_url)
            .maybe_request_timeout(request_timeout)
            .build()?;
        let loader = WeatherLoader::new(
            client.clone(),
            StationWeatherStore::new(),
            loader_config.unwrap_or_default(),
        );
        Ok(Self { client, loader })
    }

    /// Creates a pipeline against the default service with default limits.
    pub fn new() -> Result<Self, StationWeatherError> {
        Self::builder().build()
    }

    /// Fetches the station directory. Empty means the catalog is unavailable.
    pub async fn fetch_stations(&self) -> Vec<Station> {
        self.client.fetch_stations().await
    }

    /// Fetches the station directory, reporting why it failed.
    pub async fn try_fetch_stations(&self) -> Result<Vec<Station>, StationWeatherError> {
        Ok(self.client.try_fetch_stations().await?)
    }

    /// Fetches the station directory into a [`StationCatalog`] for subset selection.
    pub async fn fetch_catalog(&self) -> StationCatalog {
        StationCatalog::new(self.fetch_stations().await)
    }

    /// Full history of one station, oldest first; empty on any failure.
    pub async fn fetch_station_weather(&self, station_id: &str) -> Vec<WeatherReading> {
        self.client.fetch_station_weather(station_id).await
    }

    /// Full history of one station with the failure kind preserved.
    pub async fn station_weather(&self, station_id: &str) -> FetchOutcome {
        self.client.station_weather(station_id).await
    }

    /// Latest reading per station for `station_ids`, fetched sequentially.
    pub async fn fetch_latest_for_stations(
        &self,
        station_ids: &[String],
    ) -> HashMap<String, WeatherReading> {
        self.loader.fetch_latest_for_stations(station_ids).await
    }

    /// Loads current weather for `stations`; see [`WeatherLoader::load_weather`].
    pub async fn load_weather<F>(
        &self,
        stations: &[Station],
        batch_size: usize,
        on_progress: F,
    ) -> Vec<Station>
    where
        F: FnMut(usize, usize),
    {
        self.loader.load_weather(stations, batch_size, on_progress).await
    }

    /// [`StationWeather::load_weather`] with the configured default batch size.
    pub async fn load_weather_default<F>(&self, stations: &[Station], on_progress: F) -> Vec<Station>
    where
        F: FnMut(usize, usize),
    {
        let batch_size = self.loader.config().batch_size;
        self.loader.load_weather(stations, batch_size, on_progress).await
    }

    /// Shared handle to the station-weather store.
    pub fn store(&self) -> StationWeatherStore {
        self.loader.store().clone()
    }

    pub fn scheduler(&self) -> &RequestScheduler {
        self.client.scheduler()
    }
}
