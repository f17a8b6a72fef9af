use bon::Builder;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

const NAIVE_TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// One timestamped observation from a station.
///
/// Field names match the `points` entries of `GET /historical_weather`.
/// Every measurement may be `null` on the wire. Wind is stored as two
/// orthogonal components; speed and direction are derived on demand.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Builder)]
pub struct WeatherReading {
    /// Service-defined timestamp, kept verbatim.
    #[builder(into)]
    pub timestamp: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub wind_x: Option<f64>,
    #[serde(default)]
    pub wind_y: Option<f64>,
    #[serde(default)]
    pub dewpoint: Option<f64>,
    #[serde(default)]
    pub pressure: Option<f64>,
    #[serde(default)]
    pub precip: Option<f64>,
}

impl WeatherReading {
    /// Magnitude of the wind vector, if both components are known.
    pub fn wind_speed(&self) -> Option<f64> {
        let (x, y) = (self.wind_x?, self.wind_y?);
        Some(x.hypot(y))
    }

    /// Angle of the wind vector in degrees, measured from the x axis.
    pub fn wind_direction(&self) -> Option<f64> {
        let (x, y) = (self.wind_x?, self.wind_y?);
        Some(y.atan2(x).to_degrees())
    }

    /// Best-effort interpretation of [`WeatherReading::timestamp`] as a UTC instant.
    ///
    /// Accepts RFC 3339 as well as offset-less `YYYY-MM-DD[T ]HH:MM[:SS]`, which is
    /// taken to be UTC. Returns `None` for anything else; the raw string stays
    /// the authoritative value.
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.timestamp.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NAIVE_TIMESTAMP_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|naive| naive.and_utc())
    }
}
