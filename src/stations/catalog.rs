use crate::types::station::Station;
use haversine::{distance, Location as HaversineLocation, Units};
use ordered_float::OrderedFloat;
use rstar::RTree;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// A geographical coordinate: latitude first, longitude second, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon(pub f64, pub f64);

/// The fetched station directory, indexed for picking the subsets a weather
/// load runs over.
///
/// Catalog order is kept as fetched; [`StationCatalog::first`] slices it.
#[derive(Debug, Clone)]
pub struct StationCatalog {
    stations: Vec<Station>,
    by_id: HashMap<String, usize>,
    rtree: RTree<Station>,
}

// Helper struct for BinaryHeap ordering
struct StationCandidate<'a> {
    distance_km: OrderedFloat<f64>,
    station: &'a Station,
}
impl PartialEq for StationCandidate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.distance_km == other.distance_km
    }
}
impl Eq for StationCandidate<'_> {}
impl PartialOrd for StationCandidate<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for StationCandidate<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_km.cmp(&other.distance_km)
    }
}

impl StationCatalog {
    pub fn new(stations: Vec<Station>) -> Self {
        let by_id = stations
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();
        let rtree = RTree::bulk_load(stations.clone());
        Self {
            stations,
            by_id,
            rtree,
        }
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn get(&self, id: &str) -> Option<&Station> {
        self.by_id.get(id).map(|&i| &self.stations[i])
    }

    /// The first `n` stations in catalog order (all of them if there are fewer).
    pub fn first(&self, n: usize) -> &[Station] {
        &self.stations[..n.min(self.stations.len())]
    }

    /// Up to `limit` stations within `max_distance_km` of `location`, closest first,
    /// paired with their Haversine distance in kilometres.
    pub fn nearest(&self, location: LatLon, limit: usize, max_distance_km: f64) -> Vec<(Station, f64)> {
        if limit == 0 {
            return vec![];
        }

        // R-tree order is planar; over-fetch before re-ranking by great-circle distance.
        let candidate_limit = limit.saturating_mul(2).max(20);

        let mut seen = HashSet::new();
        let mut stations_with_dist: Vec<(Station, f64)> = query_points(location)
            .into_iter()
            .flat_map(|point| self.rtree.nearest_neighbor_iter(&point).take(candidate_limit))
            .filter(|station| seen.insert(station.id.as_str()))
            .filter_map(|station| {
                let dist_km = haversine_km(location, station);
                (dist_km <= max_distance_km).then(|| (station.clone(), dist_km))
            })
            .collect();

        stations_with_dist.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        stations_with_dist.truncate(limit);
        stations_with_dist
    }

    /// Like [`StationCatalog::nearest`], but only stations for which `predicate`
    /// holds are considered.
    pub fn nearest_matching<P>(
        &self,
        location: LatLon,
        limit: usize,
        max_distance_km: f64,
        predicate: P,
    ) -> Vec<(Station, f64)>
    where
        P: Fn(&Station) -> bool,
    {
        if limit == 0 {
            return vec![];
        }
        let mut heap: BinaryHeap<StationCandidate<'_>> =
            BinaryHeap::with_capacity(limit.min(self.len()));
        let mut seen = HashSet::new();

        for point in query_points(location) {
            for station in self.rtree.nearest_neighbor_iter(&point) {
                if !predicate(station) {
                    continue;
                }
                let dist_km = haversine_km(location, station);

                // Planar and great-circle order differ a little; stop only once well past the radius.
                if dist_km > max_distance_km * 2.0 {
                    break;
                }
                if dist_km > max_distance_km || !seen.insert(station.id.as_str()) {
                    continue;
                }

                let candidate = StationCandidate {
                    distance_km: OrderedFloat(dist_km),
                    station,
                };
                if heap.len() < limit {
                    heap.push(candidate);
                } else if heap
                    .peek()
                    .is_some_and(|worst| candidate.distance_km < worst.distance_km)
                {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }

        heap.into_sorted_vec()
            .into_iter()
            .map(|c| (c.station.to_owned(), c.distance_km.into_inner()))
            .collect()
    }
}

/// The location plus copies shifted a full turn east and west, so planar
/// R-tree queries also reach stations across the antimeridian.
fn query_points(location: LatLon) -> [[f64; 2]; 3] {
    [
        [location.0, location.1],
        [location.0, location.1 + 360.0],
        [location.0, location.1 - 360.0],
    ]
}

fn haversine_km(location: LatLon, station: &Station) -> f64 {
    distance(
        HaversineLocation {
            latitude: location.0,
            longitude: location.1,
        },
        HaversineLocation {
            latitude: station.location.latitude,
            longitude: station.location.longitude,
        },
        Units::Kilometers,
    )
}
