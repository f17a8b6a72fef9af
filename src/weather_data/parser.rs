//! Defensive decoding of `historical_weather` bodies.
//!
//! The upstream service sometimes drops the outer JSON object (the body starts
//! with a bare `"points":` member) or cuts the final closing brace. Those two
//! cases are repaired before decoding. Nothing else is guessed at: a body that
//! still fails to decode yields no readings.

use crate::types::weather_reading::WeatherReading;
use log::warn;
use serde::Deserialize;
use std::borrow::Cow;

const BARE_POINTS_MEMBER: &str = "\"points\":";

#[derive(Debug, Deserialize)]
struct PointsEnvelope {
    #[serde(default)]
    points: Option<Vec<WeatherReading>>,
}

/// Applies the envelope and truncation repairs to a raw body.
///
/// Well-formed bodies come back trimmed but otherwise untouched.
pub fn repair_body(raw: &str) -> Cow<'_, str> {
    let trimmed = raw.trim();
    let mut text = if trimmed.starts_with(BARE_POINTS_MEMBER) {
        Cow::Owned(format!("{{{trimmed}}}"))
    } else {
        Cow::Borrowed(trimmed)
    };
    if !text.ends_with('}') {
        text.to_mut().push('}');
    }
    text
}

/// Repairs and decodes a body, reporting the decode error if repair was not enough.
///
/// A missing or `null` `points` member decodes to an empty list.
pub fn parse_points(raw: &str) -> Result<Vec<WeatherReading>, serde_json::Error> {
    let repaired = repair_body(raw);
    let envelope: PointsEnvelope = serde_json::from_str(&repaired)?;
    Ok(envelope.points.unwrap_or_default())
}

/// Total variant of [`parse_points`]: never fails, logs and returns an empty
/// list when the body cannot be recovered.
pub fn parse_readings(raw: &str) -> Vec<WeatherReading> {
    match parse_points(raw) {
        Ok(points) => points,
        Err(e) => {
            warn!(
                "Weather payload could not be decoded after repair ({}); raw body: {:?}",
                e, raw
            );
            Vec::new()
        }
    }
}
