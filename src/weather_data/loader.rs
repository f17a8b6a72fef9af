//! Batch orchestration of per-station weather fetches.
//!
//! Stations are processed strictly one after another: batches in order, and
//! stations in list order inside a batch. On top of scheduler admission there
//! is a fixed pause between station fetches and another between batches.
//! Nothing is retried; a station whose fetch fails or returns nothing keeps
//! its previous record for this pass.

use crate::config::{BATCH_DELAY, DEFAULT_BATCH_SIZE, STATION_DELAY};
use crate::types::fetch_outcome::OutcomeKind;
use crate::types::station::Station;
use crate::types::weather_reading::WeatherReading;
use crate::weather_data::client::ReadingSource;
use crate::weather_data::store::StationWeatherStore;
use bon::Builder;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time;

/// What happens to results of a load that a newer load has superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupersedePolicy {
    /// Late results still go back to their caller but are not written to the store.
    #[default]
    DiscardStale,
    /// Late results overwrite the store, even if a newer load already wrote fresher data.
    LastResolvedWins,
}

/// Pacing and batching knobs for [`WeatherLoader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder)]
pub struct LoaderConfig {
    /// Pause between two station fetches inside a batch.
    #[builder(default = STATION_DELAY)]
    pub station_delay: Duration,
    /// Pause between two batches.
    #[builder(default = BATCH_DELAY)]
    pub batch_delay: Duration,
    #[builder(default = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
    #[builder(default)]
    pub supersede_policy: SupersedePolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            station_delay: STATION_DELAY,
            batch_delay: BATCH_DELAY,
            batch_size: DEFAULT_BATCH_SIZE,
            supersede_policy: SupersedePolicy::default(),
        }
    }
}

/// Drives weather fetches for station sets and merges results into a
/// [`StationWeatherStore`].
#[derive(Debug)]
pub struct WeatherLoader<S> {
    source: S,
    store: StationWeatherStore,
    config: LoaderConfig,
}

impl<S: ReadingSource> WeatherLoader<S> {
    pub fn new(source: S, store: StationWeatherStore, config: LoaderConfig) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &StationWeatherStore {
        &self.store
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Fetches each station in turn and keeps its most recent reading.
    ///
    /// Stations with no readings, or whose fetch failed, are absent from the
    /// result. Consecutive fetches are separated by the configured station delay.
    pub async fn fetch_latest_for_stations(
        &self,
        station_ids: &[String],
    ) -> HashMap<String, WeatherReading> {
        let mut latest = HashMap::with_capacity(station_ids.len());
        let mut tally: HashMap<OutcomeKind, usize> = HashMap::new();

        for (i, station_id) in station_ids.iter().enumerate() {
            if i > 0 {
                time::sleep(self.config.station_delay).await;
            }
            let outcome = self.source.station_weather(station_id).await;
            *tally.entry(outcome.kind()).or_default() += 1;
            if let Some(reading) = outcome.into_latest() {
                latest.insert(station_id.clone(), reading);
            }
        }

        let failed: usize = tally
            .iter()
            .filter(|(kind, _)| !matches!(kind, OutcomeKind::Readings | OutcomeKind::NoData))
            .map(|(_, count)| count)
            .sum();
        debug!(
            "Fetched {} stations: {} with readings, {} without data, {} failed",
            station_ids.len(),
            tally.get(&OutcomeKind::Readings).copied().unwrap_or(0),
            tally.get(&OutcomeKind::NoData).copied().unwrap_or(0),
            failed
        );
        latest
    }

    /// Loads current weather for `stations` in contiguous batches of `batch_size`.
    ///
    /// Returns every input station in its original order, with `current_weather`
    /// attached where a reading was resolved and otherwise unchanged.
    /// `on_progress(completed, total)` is called once per station as its batch
    /// completes; `completed` rises by one each call and `total` never changes.
    /// A `batch_size` of zero is treated as one.
    pub async fn load_weather<F>(
        &self,
        stations: &[Station],
        batch_size: usize,
        mut on_progress: F,
    ) -> Vec<Station>
    where
        F: FnMut(usize, usize),
    {
        let total = stations.len();
        let batch_size = batch_size.max(1);
        let generation = self.store.begin_generation().await;
        info!(
            "Loading weather for {} stations in batches of {} (generation {})",
            total, batch_size, generation
        );

        let mut updated = Vec::with_capacity(total);
        let mut completed = 0;

        for (batch_index, batch) in stations.chunks(batch_size).enumerate() {
            if batch_index > 0 {
                time::sleep(self.config.batch_delay).await;
            }

            let ids: Vec<String> = batch.iter().map(|s| s.id.clone()).collect();
            let latest = self.fetch_latest_for_stations(&ids).await;

            for station in batch {
                match latest.get(&station.id) {
                    Some(reading) => {
                        self.record(generation, &station.id, reading.clone()).await;
                        updated.push(station.with_weather(reading.clone()));
                    }
                    None => updated.push(station.clone()),
                }
                completed += 1;
                on_progress(completed, total);
            }
        }

        info!(
            "{} of {} stations have current weather",
            updated.iter().filter(|s| s.has_weather()).count(),
            total
        );
        updated
    }

    async fn record(&self, generation: u64, station_id: &str, reading: WeatherReading) {
        match self.config.supersede_policy {
            SupersedePolicy::LastResolvedWins => self.store.insert(station_id, reading).await,
            SupersedePolicy::DiscardStale => {
                if !self
                    .store
                    .insert_if_current(generation, station_id, reading)
                    .await
                {
                    warn!(
                        "Discarding reading for station {} from superseded load (generation {})",
                        station_id, generation
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fetch_outcome::FetchOutcome;
    use crate::types::station::Location;
    use crate::weather_data::error::FetchError;
    use std::collections::{HashSet, VecDeque};
    use std::future::Future;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Fetch(String),
        Progress(usize, usize),
    }

    #[derive(Default)]
    struct FakeSource {
        histories: HashMap<String, Vec<WeatherReading>>,
        failing: HashSet<String>,
        // When non-empty, each call pops the next (latency, history) instead.
        scripted: Mutex<VecDeque<(Duration, Vec<WeatherReading>)>>,
        events: Arc<Mutex<Vec<Event>>>,
    }

    impl FakeSource {
        fn with_history(mut self, id: &str, timestamps: &[&str]) -> Self {
            self.histories
                .insert(id.to_string(), timestamps.iter().map(|t| reading(t)).collect());
            self
        }

        fn failing(mut self, id: &str) -> Self {
            self.failing.insert(id.to_string());
            self
        }

        fn scripted(self, calls: Vec<(Duration, &str)>) -> Self {
            *self.scripted.lock().unwrap() = calls
                .into_iter()
                .map(|(latency, ts)| (latency, vec![reading(ts)]))
                .collect();
            self
        }
    }

    impl ReadingSource for FakeSource {
        fn station_weather(&self, station_id: &str) -> impl Future<Output = FetchOutcome> + Send {
            self.events
                .lock()
                .unwrap()
                .push(Event::Fetch(station_id.to_string()));

            let (latency, outcome) = if let Some((latency, history)) =
                self.scripted.lock().unwrap().pop_front()
            {
                (latency, FetchOutcome::from_readings(history))
            } else if self.failing.contains(station_id) {
                let source = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
                let e = FetchError::MalformedBody {
                    station: station_id.to_string(),
                    source,
                };
                (Duration::ZERO, FetchOutcome::Failed(e))
            } else {
                let history = self.histories.get(station_id).cloned().unwrap_or_default();
                (Duration::ZERO, FetchOutcome::from_readings(history))
            };

            async move {
                if !latency.is_zero() {
                    time::sleep(latency).await;
                }
                outcome
            }
        }
    }

    fn reading(ts: &str) -> WeatherReading {
        WeatherReading::builder().timestamp(ts).temperature(50.0).build()
    }

    fn station(id: &str) -> Station {
        Station {
            id: id.to_string(),
            name: Some(format!("Station {id}")),
            location: Location {
                latitude: 40.0,
                longitude: -100.0,
                elevation: None,
            },
            city: None,
            state: None,
            country: Some("US".to_string()),
            current_weather: None,
        }
    }

    fn stations(n: usize) -> Vec<Station> {
        (0..n).map(|i| station(&format!("S{i}"))).collect()
    }

    fn loader(source: FakeSource) -> WeatherLoader<FakeSource> {
        WeatherLoader::new(source, StationWeatherStore::new(), LoaderConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_reading_selected() {
        let loader = loader(FakeSource::default().with_history("S0", &["r1", "r2", "r3"]));

        let result = loader.load_weather(&stations(1), 5, |_, _| {}).await;

        assert_eq!(result[0].current_weather, Some(reading("r3")));
        assert_eq!(loader.store().get("S0").await, Some(reading("r3")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_latest_skips_empty_and_failed() {
        let source = FakeSource::default()
            .with_history("A", &["a1", "a2"])
            .with_history("B", &[])
            .failing("C");
        let loader = loader(source);
        let ids: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();

        let latest = loader.fetch_latest_for_stations(&ids).await;

        assert_eq!(latest.len(), 1);
        assert_eq!(latest["A"], reading("a2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_batch_keeps_every_station() {
        let source = FakeSource::default()
            .with_history("S1", &["t1"])
            .with_history("S3", &["t1", "t2"])
            .failing("S4");
        let loader = loader(source);
        let input = stations(5);

        let result = loader.load_weather(&input, 5, |_, _| {}).await;

        assert_eq!(result.len(), 5);
        let ids: Vec<&str> = result.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["S0", "S1", "S2", "S3", "S4"]);

        assert_eq!(result[1].current_weather, Some(reading("t1")));
        assert_eq!(result[3].current_weather, Some(reading("t2")));
        for i in [0, 2, 4] {
            assert_eq!(result[i], input[i]);
        }
        assert_eq!(loader.store().len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_and_progress_for_twelve_stations() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let source = FakeSource {
            events: events.clone(),
            ..FakeSource::default()
        };
        let loader = loader(source);

        let progress_events = events.clone();
        let result = loader
            .load_weather(&stations(12), 5, move |completed, total| {
                progress_events
                    .lock()
                    .unwrap()
                    .push(Event::Progress(completed, total));
            })
            .await;
        assert_eq!(result.len(), 12);

        let events = events.lock().unwrap().clone();

        let progress: Vec<(usize, usize)> = events
            .iter()
            .filter_map(|e| match e {
                Event::Progress(c, t) => Some((*c, *t)),
                Event::Fetch(_) => None,
            })
            .collect();
        assert_eq!(progress, (1..=12).map(|c| (c, 12)).collect::<Vec<_>>());

        // Fetch runs between progress runs give the batch sizes.
        let mut batch_sizes = Vec::new();
        let mut run = 0;
        for event in &events {
            match event {
                Event::Fetch(_) => run += 1,
                Event::Progress(..) if run > 0 => {
                    batch_sizes.push(run);
                    run = 0;
                }
                Event::Progress(..) => {}
            }
        }
        assert_eq!(batch_sizes, [5, 5, 2]);

        // Progress for a batch lands after its fetches and before the next batch starts.
        let position = |wanted: &Event| events.iter().position(|e| e == wanted).unwrap();
        assert!(position(&Event::Fetch("S4".into())) < position(&Event::Progress(1, 12)));
        assert!(position(&Event::Progress(5, 12)) < position(&Event::Fetch("S5".into())));
        assert!(position(&Event::Progress(10, 12)) < position(&Event::Fetch("S10".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_delays() {
        let loader = loader(FakeSource::default());
        let start = Instant::now();

        loader.load_weather(&stations(12), 5, |_, _| {}).await;

        // 4 + 4 + 1 station gaps at 3s, 2 batch gaps at 1s.
        assert_eq!(start.elapsed(), Duration::from_secs(29));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_input_and_zero_batch_size() {
        let loader = loader(FakeSource::default().with_history("S0", &["t1"]));
        let mut calls = 0;

        let empty = loader.load_weather(&[], 5, |_, _| calls += 1).await;
        assert!(empty.is_empty());
        assert_eq!(calls, 0);

        let result = loader.load_weather(&stations(3), 0, |_, _| calls += 1).await;
        assert_eq!(result.len(), 3);
        assert_eq!(calls, 3);
        assert!(result[0].has_weather());
    }

    async fn race_two_loads(policy: SupersedePolicy) -> (Vec<Station>, Vec<Station>, WeatherReading) {
        // The first load's fetch is slow, so it resolves after the second load.
        let source = FakeSource::default().scripted(vec![
            (Duration::from_secs(10), "old"),
            (Duration::from_secs(1), "new"),
        ]);
        let config = LoaderConfig::builder().supersede_policy(policy).build();
        let loader = WeatherLoader::new(source, StationWeatherStore::new(), config);
        let input = stations(1);

        let (first, second) = tokio::join!(loader.load_weather(&input, 5, |_, _| {}), async {
            time::sleep(Duration::from_secs(1)).await;
            loader.load_weather(&input, 5, |_, _| {}).await
        });
        let stored = loader.store().get("S0").await.unwrap();
        (first, second, stored)
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_load_does_not_overwrite_store() {
        let (first, second, stored) = race_two_loads(SupersedePolicy::DiscardStale).await;

        assert_eq!(first[0].current_weather, Some(reading("old")));
        assert_eq!(second[0].current_weather, Some(reading("new")));
        assert_eq!(stored, reading("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_resolved_wins_policy() {
        let (_, _, stored) = race_two_loads(SupersedePolicy::LastResolvedWins).await;
        assert_eq!(stored, reading("old"));
    }
}
