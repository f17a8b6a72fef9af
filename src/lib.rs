pub mod config;
mod error;
mod scheduler;
mod station_weather;
mod stations;
mod types;
mod weather_data;

pub use error::StationWeatherError;
pub use station_weather::*;

pub use scheduler::rate_limiter::{RateLimit, RequestScheduler};
pub use stations::catalog::{LatLon, StationCatalog};

pub use types::fetch_outcome::{FetchOutcome, OutcomeKind};
pub use types::station::{Location, Station};
pub use types::weather_reading::WeatherReading;

pub use weather_data::client::{ReadingSource, WeatherClient};
pub use weather_data::error::FetchError;
pub use weather_data::loader::{LoaderConfig, SupersedePolicy, WeatherLoader};
pub use weather_data::parser::{parse_points, parse_readings, repair_body};
pub use weather_data::store::StationWeatherStore;
