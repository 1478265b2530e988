use std::collections::{BTreeSet, HashMap};

use serde::Deserialize;

use crate::schedule::TrainSchedule;

/// Catalog validation limits. These were hard constants in the legacy
/// system; here they come from runtime config with the same defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogLimits {
    #[serde(default = "default_max_stations")]
    pub max_stations: usize,
    #[serde(default = "default_max_seats")]
    pub max_seats: u32,
}

fn default_max_stations() -> usize {
    100
}

fn default_max_seats() -> u32 {
    100_000
}

impl Default for CatalogLimits {
    fn default() -> Self {
        Self {
            max_stations: default_max_stations(),
            max_seats: default_max_seats(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Train already exists: {0}")]
    DuplicateTrain(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Train not found: {0}")]
    NotFound(String),

    #[error("Train already released: {0}")]
    AlreadyReleased(String),

    #[error("Train not available for booking: {0}")]
    Unavailable(String),
}

/// Owns every train template and a station-name index for search.
pub struct Catalog {
    limits: CatalogLimits,
    trains: HashMap<String, TrainSchedule>,
    /// station name -> ids of trains calling there. BTreeSet keeps
    /// candidate enumeration deterministic by train id.
    by_station: HashMap<String, BTreeSet<String>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::with_limits(CatalogLimits::default())
    }

    pub fn with_limits(limits: CatalogLimits) -> Self {
        Self {
            limits,
            trains: HashMap::new(),
            by_station: HashMap::new(),
        }
    }

    /// Validates and stores a new, unreleased train template.
    pub fn add_train(&mut self, mut train: TrainSchedule) -> Result<(), CatalogError> {
        if self.trains.contains_key(&train.train_id) {
            return Err(CatalogError::DuplicateTrain(train.train_id));
        }
        self.validate(&train)?;
        train.released = false;

        for station in &train.stations {
            self.by_station
                .entry(station.clone())
                .or_default()
                .insert(train.train_id.clone());
        }
        tracing::info!(train_id = %train.train_id, stations = train.stations.len(), "train added");
        self.trains.insert(train.train_id.clone(), train);
        Ok(())
    }

    fn validate(&self, train: &TrainSchedule) -> Result<(), CatalogError> {
        let n = train.stations.len();
        if train.train_id.is_empty() {
            return Err(CatalogError::InvalidSchedule("empty train id".into()));
        }
        if n < 2 || n > self.limits.max_stations {
            return Err(CatalogError::InvalidSchedule(format!(
                "station count {n} out of range 2..={}",
                self.limits.max_stations
            )));
        }
        if train.seat_count == 0 || train.seat_count > self.limits.max_seats {
            return Err(CatalogError::InvalidSchedule(format!(
                "seat count {} out of range 1..={}",
                train.seat_count, self.limits.max_seats
            )));
        }
        if train.prices.len() != n - 1 {
            return Err(CatalogError::InvalidSchedule(format!(
                "expected {} segment prices, got {}",
                n - 1,
                train.prices.len()
            )));
        }
        if train.travel_minutes.len() != n - 1 {
            return Err(CatalogError::InvalidSchedule(format!(
                "expected {} travel times, got {}",
                n - 1,
                train.travel_minutes.len()
            )));
        }
        if train.stopover_minutes.len() != n - 2 {
            return Err(CatalogError::InvalidSchedule(format!(
                "expected {} stopover times, got {}",
                n - 2,
                train.stopover_minutes.len()
            )));
        }
        if train.sale_last < train.sale_first {
            return Err(CatalogError::InvalidSchedule(
                "sale window ends before it starts".into(),
            ));
        }
        let mut seen = BTreeSet::new();
        for station in &train.stations {
            if station.is_empty() {
                return Err(CatalogError::InvalidSchedule("empty station name".into()));
            }
            if !seen.insert(station) {
                return Err(CatalogError::InvalidSchedule(format!(
                    "station repeats on route: {station}"
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, train_id: &str) -> Option<&TrainSchedule> {
        self.trains.get(train_id)
    }

    /// Marks a train sellable. One-way: a released train stays released.
    pub fn release(&mut self, train_id: &str) -> Result<(), CatalogError> {
        let train = self
            .trains
            .get_mut(train_id)
            .ok_or_else(|| CatalogError::NotFound(train_id.to_string()))?;
        if train.released {
            return Err(CatalogError::AlreadyReleased(train_id.to_string()));
        }
        train.released = true;
        tracing::info!(train_id, "train released");
        Ok(())
    }

    /// Deletes an unreleased train. Released trains are permanent so that
    /// historical runs stay queryable and refundable.
    pub fn remove(&mut self, train_id: &str) -> Result<(), CatalogError> {
        match self.trains.get(train_id) {
            None => return Err(CatalogError::NotFound(train_id.to_string())),
            Some(train) if train.released => {
                return Err(CatalogError::AlreadyReleased(train_id.to_string()))
            }
            Some(_) => {}
        }
        let Some(train) = self.trains.remove(train_id) else {
            return Err(CatalogError::NotFound(train_id.to_string()));
        };
        for station in &train.stations {
            if let Some(ids) = self.by_station.get_mut(station) {
                ids.remove(train_id);
                if ids.is_empty() {
                    self.by_station.remove(station);
                }
            }
        }
        tracing::info!(train_id, "train removed");
        Ok(())
    }

    /// Trains calling at `station`, in train-id order.
    pub fn trains_via<'a>(&'a self, station: &str) -> impl Iterator<Item = &'a TrainSchedule> + 'a {
        self.by_station
            .get(station)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.trains.get(id))
    }

    /// Trains whose route visits `from` strictly before `to`, with the two
    /// station indices. Restartable and read-only.
    pub fn find_by_station_pair<'a>(
        &'a self,
        from: &'a str,
        to: &'a str,
    ) -> impl Iterator<Item = (&'a TrainSchedule, usize, usize)> + 'a {
        self.trains_via(from).filter_map(move |train| {
            let from_idx = train.station_index(from)?;
            let to_idx = train.station_index(to)?;
            (from_idx < to_idx).then_some((train, from_idx, to_idx))
        })
    }

    pub fn clear(&mut self) {
        self.trains.clear();
        self.by_station.clear();
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use railbook_shared::parse_time_of_day;

    fn schedule(id: &str, stations: &[&str]) -> TrainSchedule {
        let n = stations.len();
        TrainSchedule {
            train_id: id.to_string(),
            stations: stations.iter().map(|s| s.to_string()).collect(),
            seat_count: 100,
            prices: vec![50; n - 1],
            start_time: parse_time_of_day("08:00").unwrap(),
            travel_minutes: vec![60; n - 1],
            stopover_minutes: vec![10; n - 2],
            sale_first: "06-01".parse().unwrap(),
            sale_last: "06-30".parse().unwrap(),
            seat_class: 'G',
            released: false,
        }
    }

    #[test]
    fn test_add_rejects_duplicates_and_bad_lengths() {
        let mut catalog = Catalog::new();
        catalog.add_train(schedule("T1", &["a", "b", "c"])).unwrap();

        let result = catalog.add_train(schedule("T1", &["x", "y"]));
        assert!(matches!(result, Err(CatalogError::DuplicateTrain(_))));

        let mut bad = schedule("T2", &["a", "b", "c"]);
        bad.prices.pop();
        assert!(matches!(
            catalog.add_train(bad),
            Err(CatalogError::InvalidSchedule(_))
        ));

        let mut bad = schedule("T3", &["a", "b"]);
        bad.seat_count = 0;
        assert!(matches!(
            catalog.add_train(bad),
            Err(CatalogError::InvalidSchedule(_))
        ));
    }

    #[test]
    fn test_release_is_one_way() {
        let mut catalog = Catalog::new();
        catalog.add_train(schedule("T1", &["a", "b"])).unwrap();

        catalog.release("T1").unwrap();
        assert!(matches!(
            catalog.release("T1"),
            Err(CatalogError::AlreadyReleased(_))
        ));
        assert!(matches!(
            catalog.release("T9"),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn test_remove_refuses_released_trains() {
        let mut catalog = Catalog::new();
        catalog.add_train(schedule("T1", &["a", "b"])).unwrap();
        catalog.add_train(schedule("T2", &["a", "c"])).unwrap();

        catalog.release("T1").unwrap();
        assert!(matches!(
            catalog.remove("T1"),
            Err(CatalogError::AlreadyReleased(_))
        ));

        catalog.remove("T2").unwrap();
        assert!(catalog.get("T2").is_none());
        assert_eq!(catalog.trains_via("c").count(), 0);
    }

    #[test]
    fn test_station_pair_respects_route_order() {
        let mut catalog = Catalog::new();
        catalog.add_train(schedule("T1", &["a", "b", "c"])).unwrap();
        catalog.add_train(schedule("T2", &["c", "b", "a"])).unwrap();

        let hits: Vec<_> = catalog
            .find_by_station_pair("a", "c")
            .map(|(t, from, to)| (t.train_id.clone(), from, to))
            .collect();
        assert_eq!(hits, vec![("T1".to_string(), 0, 2)]);

        let hits: Vec<_> = catalog
            .find_by_station_pair("c", "a")
            .map(|(t, _, _)| t.train_id.clone())
            .collect();
        assert_eq!(hits, vec!["T2".to_string()]);
    }
}
