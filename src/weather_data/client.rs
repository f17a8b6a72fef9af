//! HTTP access to the station service. Every request goes through the shared
//! [`RequestScheduler`] before it is sent.

use crate::config::{BASE_URL, REQUEST_TIMEOUT};
use crate::error::StationWeatherError;
use crate::scheduler::rate_limiter::RequestScheduler;
use crate::types::fetch_outcome::FetchOutcome;
use crate::types::station::{ApiStation, Station};
use crate::types::weather_reading::WeatherReading;
use crate::weather_data::error::FetchError;
use crate::weather_data::parser::parse_points;
use bon::bon;
use log::{debug, error, info, warn};
use reqwest::{Client, Url};
use std::future::Future;
use std::time::Duration;

/// Anything that can produce the weather history of one station.
///
/// [`WeatherClient`] is the production implementation; the batch loader is
/// generic over this so it can be driven without a network.
pub trait ReadingSource {
    /// Fetches the history of `station_id`, oldest reading first.
    fn station_weather(&self, station_id: &str) -> impl Future<Output = FetchOutcome> + Send;
}

/// Client for `GET /stations` and `GET /historical_weather`.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    http: Client,
    base_url: Url,
    scheduler: RequestScheduler,
}

#[bon]
impl WeatherClient {
    /// Creates a client that gates every request through `scheduler`.
    ///
    /// `base_url` defaults to [`BASE_URL`] and `request_timeout` to
    /// [`REQUEST_TIMEOUT`]. A request that exceeds the timeout counts as a
    /// failed fetch.
    ///
    /// # Errors
    ///
    /// Returns [`StationWeatherError::InvalidBaseUrl`] if `base_url` does not parse,
    /// or [`StationWeatherError::ClientBuild`] if the HTTP client cannot be built.
    #[builder]
    pub fn new(
        scheduler: RequestScheduler,
        #[builder(into)] base_url: Option<String>,
        request_timeout: Option<Duration>,
    ) -> Result<Self, StationWeatherError> {
        let raw = base_url.unwrap_or_else(|| BASE_URL.to_string());
        let base_url = Url::parse(raw.trim_end_matches('/'))
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| StationWeatherError::InvalidBaseUrl(raw.clone()))?;
        let http = Client::builder()
            .timeout(request_timeout.unwrap_or(REQUEST_TIMEOUT))
            .build()
            .map_err(StationWeatherError::ClientBuild)?;
        Ok(Self {
            http,
            base_url,
            scheduler,
        })
    }
}

impl WeatherClient {
    pub fn scheduler(&self) -> &RequestScheduler {
        &self.scheduler
    }

    /// Fetches and normalizes the station directory.
    ///
    /// # Errors
    ///
    /// Any transport failure, non-success status, timeout, or undecodable body.
    pub async fn try_fetch_stations(&self) -> Result<Vec<Station>, FetchError> {
        let url = self.endpoint("stations", &[]);
        let body = self.get_body(&url).await?;
        let api_stations: Vec<ApiStation> = serde_json::from_str(&body)
            .map_err(|e| FetchError::JsonParse(url.to_string(), e))?;
        info!("Fetched {} stations from {}", api_stations.len(), url);
        Ok(api_stations.into_iter().map(Station::from).collect())
    }

    /// Fetches the station directory, or an empty list if it is unavailable.
    ///
    /// An empty result means "catalog unavailable", not "no stations".
    pub async fn fetch_stations(&self) -> Vec<Station> {
        match self.try_fetch_stations().await {
            Ok(stations) => stations,
            Err(e) => {
                error!("Error fetching stations: {}", error_chain(&e));
                Vec::new()
            }
        }
    }

    /// Fetches the full history of one station as a plain list.
    ///
    /// Failures of any kind are logged and yield an empty list. Use
    /// [`ReadingSource::station_weather`] to tell them apart.
    pub async fn fetch_station_weather(&self, station_id: &str) -> Vec<WeatherReading> {
        self.station_weather(station_id).await.into_readings()
    }

    async fn weather_outcome(&self, station_id: &str) -> FetchOutcome {
        let url = self.endpoint("historical_weather", &[("station", station_id)]);
        let body = match self.get_body(&url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    "Error fetching weather for station {}: {}",
                    station_id,
                    error_chain(&e)
                );
                return FetchOutcome::Failed(e);
            }
        };

        match parse_points(&body) {
            Ok(points) => {
                debug!("Station {} returned {} points", station_id, points.len());
                FetchOutcome::from_readings(points)
            }
            Err(e) => {
                warn!(
                    "JSON parse error for station {} (after repair): {}; raw body: {:?}",
                    station_id, e, body
                );
                FetchOutcome::Failed(FetchError::MalformedBody {
                    station: station_id.to_string(),
                    source: e,
                })
            }
        }
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(path);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    /// Waits for admission, performs the GET and returns the body of a 2xx response.
    async fn get_body(&self, url: &Url) -> Result<String, FetchError> {
        self.scheduler.admit().await;
        debug!("GET {}", url);

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e.status());
                return Err(FetchError::from_reqwest(url.as_str(), e));
            }
        };

        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))
    }
}

impl ReadingSource for WeatherClient {
    fn station_weather(&self, station_id: &str) -> impl Future<Output = FetchOutcome> + Send {
        self.weather_outcome(station_id)
    }
}

/// Renders an error with its `source` chain on one line.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut rendered = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
