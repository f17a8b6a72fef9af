//! Compile-time defaults for the ingestion pipeline.
//!
//! These are not a runtime configuration surface. Overrides go through the
//! builders on [`RateLimit`](crate::RateLimit), [`LoaderConfig`](crate::LoaderConfig)
//! and [`StationWeather`](crate::StationWeather).

use std::time::Duration;

/// Root of the remote station service.
pub const BASE_URL: &str = "https://sfc.windbornesystems.com";

/// Maximum admissions inside any trailing [`REQUEST_WINDOW`].
pub const REQUEST_LIMIT: usize = 20;

/// Length of the trailing window the [`REQUEST_LIMIT`] applies to.
pub const REQUEST_WINDOW: Duration = Duration::from_secs(60);

/// Period of the background pass that releases queued admissions.
pub const QUEUE_TICK: Duration = Duration::from_secs(1);

/// Pause between two station fetches inside one batch.
pub const STATION_DELAY: Duration = Duration::from_secs(3);

/// Pause between two batches.
pub const BATCH_DELAY: Duration = Duration::from_secs(1);

pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Upper bound on a single HTTP round trip.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
