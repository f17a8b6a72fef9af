//! Structured result of one per-station weather fetch.

use crate::types::weather_reading::WeatherReading;
use crate::weather_data::error::FetchError;
use std::fmt;

/// What a single `historical_weather` request produced.
///
/// Fetches never raise past the client boundary. Instead of collapsing every
/// failure into an empty list, the outcome keeps the distinction between a
/// station that simply has no data and one whose request failed.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The body parsed and contained at least one reading, oldest first.
    Readings(Vec<WeatherReading>),
    /// The body parsed but held no readings.
    NoData,
    /// Transport, status, timeout or payload failure.
    Failed(FetchError),
}

/// Coarse classification of a [`FetchOutcome`], for logging and tallies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Readings,
    NoData,
    Transport,
    HttpStatus,
    Timeout,
    Malformed,
}

impl FetchOutcome {
    pub(crate) fn from_readings(readings: Vec<WeatherReading>) -> Self {
        if readings.is_empty() {
            FetchOutcome::NoData
        } else {
            FetchOutcome::Readings(readings)
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            FetchOutcome::Readings(_) => OutcomeKind::Readings,
            FetchOutcome::NoData => OutcomeKind::NoData,
            FetchOutcome::Failed(e) => match e {
                FetchError::NetworkRequest(..) => OutcomeKind::Transport,
                FetchError::HttpStatus { .. } => OutcomeKind::HttpStatus,
                FetchError::Timeout { .. } => OutcomeKind::Timeout,
                FetchError::JsonParse(..) | FetchError::MalformedBody { .. } => {
                    OutcomeKind::Malformed
                }
            },
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, FetchOutcome::Failed(_))
    }

    /// The most recent reading. The service orders points oldest to newest.
    pub fn latest(&self) -> Option<&WeatherReading> {
        match self {
            FetchOutcome::Readings(readings) => readings.last(),
            _ => None,
        }
    }

    pub fn into_latest(self) -> Option<WeatherReading> {
        match self {
            FetchOutcome::Readings(mut readings) => readings.pop(),
            _ => None,
        }
    }

    /// Flattens the outcome to the plain list contract: failures become empty.
    pub fn into_readings(self) -> Vec<WeatherReading> {
        match self {
            FetchOutcome::Readings(readings) => readings,
            FetchOutcome::NoData | FetchOutcome::Failed(_) => Vec::new(),
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OutcomeKind::Readings => "readings",
            OutcomeKind::NoData => "no data",
            OutcomeKind::Transport => "transport failure",
            OutcomeKind::HttpStatus => "http status",
            OutcomeKind::Timeout => "timeout",
            OutcomeKind::Malformed => "malformed payload",
        };
        f.write_str(label)
    }
}
