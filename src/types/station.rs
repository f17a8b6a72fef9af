//! Station records as handed to downstream consumers, the wire shape the
//! station service returns, and the `rstar` glue used for spatial lookups.

use crate::types::weather_reading::WeatherReading;
use rstar::{PointDistance, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

/// A fixed-location sensor from the station catalog.
///
/// Catalog fields never change after the fetch. The only thing ever attached
/// later is [`Station::current_weather`], and that happens by producing a new
/// record through [`Station::with_weather`].
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    /// Opaque identifier, unique across the catalog.
    pub id: String,
    /// Display name, if the service reports one.
    pub name: Option<String>,
    /// Geographical position of the station.
    pub location: Location,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    /// Most recent reading resolved for this station, if any.
    pub current_weather: Option<WeatherReading>,
}

/// Geographical location of a station.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Location {
    /// Latitude in decimal degrees (positive for North).
    pub latitude: f64,
    /// Longitude in decimal degrees (positive for East).
    pub longitude: f64,
    /// Elevation as reported by the service, if available.
    pub elevation: Option<f64>,
}

impl Station {
    /// Returns a copy of this station with `reading` attached as its current weather.
    ///
    /// Any previously attached reading is replaced wholesale.
    pub fn with_weather(&self, reading: WeatherReading) -> Station {
        Station {
            current_weather: Some(reading),
            ..self.clone()
        }
    }

    pub fn has_weather(&self) -> bool {
        self.current_weather.is_some()
    }
}

/// A station record exactly as `GET /stations` returns it.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiStation {
    station_id: String,
    #[serde(default)]
    station_name: Option<String>,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    elevation: Option<f64>,
}

impl From<ApiStation> for Station {
    fn from(api: ApiStation) -> Self {
        Station {
            id: api.station_id,
            name: api.station_name,
            location: Location {
                latitude: api.latitude,
                longitude: api.longitude,
                elevation: api.elevation,
            },
            city: api.city,
            state: api.state,
            country: api.country,
            current_weather: None,
        }
    }
}

// --- R-Tree Implementations ---

impl RTreeObject for Station {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.location.latitude, self.location.longitude])
    }
}

impl PointDistance for Station {
    // Squared Euclidean on raw degrees; only used to order candidates.
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.location.latitude - point[0];
        let dy = self.location.longitude - point[1];
        dx * dx + dy * dy
    }
}
