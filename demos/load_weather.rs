use station_weather::{LatLon, StationWeather, StationWeatherError};

#[tokio::main]
async fn main() -> Result<(), StationWeatherError> {
    // Set RUST_LOG=info (or debug, trace) to see pipeline diagnostics
    env_logger::init();

    let client = StationWeather::new()?;
    let catalog = client.fetch_catalog().await;
    if catalog.is_empty() {
        eprintln!("Station catalog unavailable");
        return Ok(());
    }
    println!("Found {} weather stations", catalog.len());

    // Stations around San Francisco, falling back to the head of the catalog.
    let nearby: Vec<_> = catalog
        .nearest(LatLon(37.77, -122.42), 10, 300.0)
        .into_iter()
        .map(|(station, _)| station)
        .collect();
    let subset = if nearby.is_empty() {
        catalog.first(10).to_vec()
    } else {
        nearby
    };

    let stations = client
        .load_weather_default(&subset, |completed, total| {
            println!("Loading weather data... {completed}/{total}");
        })
        .await;

    for station in stations.iter().filter(|s| s.has_weather()) {
        if let Some(reading) = &station.current_weather {
            println!(
                "{:<10} {:>8} temp={:?} wind={:?} at {}",
                station.id,
                station.name.as_deref().unwrap_or("-"),
                reading.temperature,
                reading.wind_speed(),
                reading.timestamp
            );
        }
    }
    println!(
        "{} stations have current weather data",
        client.store().len().await
    );

    Ok(())
}
