pub mod fetch_outcome;
pub mod station;
pub mod weather_reading;
