use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use railbook_shared::ServiceDate;
use serde::{Deserialize, Serialize};

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Immutable route template for one train.
///
/// A *run* of the train is this template pinned to an origin departure
/// date inside the sale window; runs have no storage of their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainSchedule {
    pub train_id: String,
    pub stations: Vec<String>,
    pub seat_count: u32,
    /// Price of each segment, `stations.len() - 1` entries.
    pub prices: Vec<u32>,
    /// Departure time at the origin station.
    pub start_time: NaiveTime,
    /// Minutes spent on each segment, `stations.len() - 1` entries.
    pub travel_minutes: Vec<u32>,
    /// Minutes stopped at each intermediate station, `stations.len() - 2`
    /// entries; empty for a two-station route.
    pub stopover_minutes: Vec<u32>,
    pub sale_first: ServiceDate,
    pub sale_last: ServiceDate,
    pub seat_class: char,
    pub released: bool,
}

/// One station row of a derived run timetable.
#[derive(Debug, Clone, Serialize)]
pub struct StopTime {
    pub station: String,
    /// Absent at the origin station.
    pub arrival: Option<NaiveDateTime>,
    /// Absent at the terminal station.
    pub departure: Option<NaiveDateTime>,
    /// Cumulative price from the origin to this station.
    pub price_from_origin: u32,
}

impl TrainSchedule {
    pub fn segment_count(&self) -> usize {
        self.stations.len() - 1
    }

    pub fn station_index(&self, name: &str) -> Option<usize> {
        self.stations.iter().position(|s| s == name)
    }

    pub fn in_sale_window(&self, date: ServiceDate) -> bool {
        self.sale_first <= date && date <= self.sale_last
    }

    /// Sum of segment prices over `[from_idx, to_idx)`.
    pub fn price_between(&self, from_idx: usize, to_idx: usize) -> u32 {
        self.prices[from_idx..to_idx].iter().sum()
    }

    /// Minutes from origin departure to arrival at station `idx` (idx >= 1).
    fn minutes_to_arrival(&self, idx: usize) -> i64 {
        let travel: i64 = self.travel_minutes[..idx].iter().map(|&m| i64::from(m)).sum();
        let stops: i64 = self.stopover_minutes[..idx - 1]
            .iter()
            .map(|&m| i64::from(m))
            .sum();
        travel + stops
    }

    /// Minutes from origin departure to departure from station `idx`.
    fn minutes_to_departure(&self, idx: usize) -> i64 {
        if idx == 0 {
            0
        } else {
            self.minutes_to_arrival(idx) + i64::from(self.stopover_minutes[idx - 1])
        }
    }

    /// Arrival date-time at station `idx` for the run leaving the origin
    /// on `origin_date`. `None` at the origin station.
    pub fn arrival_at(&self, origin_date: ServiceDate, idx: usize) -> Option<NaiveDateTime> {
        (idx > 0 && idx < self.stations.len()).then(|| {
            origin_date.and_time(self.start_time) + Duration::minutes(self.minutes_to_arrival(idx))
        })
    }

    /// Departure date-time at station `idx` for the run leaving the origin
    /// on `origin_date`. `None` at the terminal station.
    pub fn departure_at(&self, origin_date: ServiceDate, idx: usize) -> Option<NaiveDateTime> {
        (idx < self.segment_count()).then(|| {
            origin_date.and_time(self.start_time)
                + Duration::minutes(self.minutes_to_departure(idx))
        })
    }

    /// Inverts the timetable: finds the origin date of the run that departs
    /// station `from_idx` on `query_date`.
    ///
    /// A query date always pins the run at the *queried* station, so a train
    /// that left its origin the previous evening still matches today's date
    /// at a downstream stop. Returns `None` when the implied origin date
    /// falls outside the calendar.
    pub fn origin_date_for_departure_at(
        &self,
        from_idx: usize,
        query_date: ServiceDate,
    ) -> Option<ServiceDate> {
        let start = i64::from(self.start_time.hour()) * 60 + i64::from(self.start_time.minute());
        let day_offset = (start + self.minutes_to_departure(from_idx)) / MINUTES_PER_DAY;
        query_date.minus_days(day_offset as u64)
    }

    /// Full per-station timetable of the run leaving the origin on
    /// `origin_date`.
    pub fn timetable(&self, origin_date: ServiceDate) -> Vec<StopTime> {
        (0..self.stations.len())
            .map(|idx| StopTime {
                station: self.stations[idx].clone(),
                arrival: self.arrival_at(origin_date, idx),
                departure: self.departure_at(origin_date, idx),
                price_from_origin: self.price_between(0, idx),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use railbook_shared::{format_instant, parse_time_of_day};

    fn schedule() -> TrainSchedule {
        TrainSchedule {
            train_id: "G100".to_string(),
            stations: vec!["alpha".into(), "beta".into(), "gamma".into()],
            seat_count: 500,
            prices: vec![100, 200],
            start_time: parse_time_of_day("23:00").unwrap(),
            travel_minutes: vec![90, 60],
            stopover_minutes: vec![30],
            sale_first: "06-01".parse().unwrap(),
            sale_last: "06-30".parse().unwrap(),
            seat_class: 'G',
            released: true,
        }
    }

    #[test]
    fn test_timetable_accumulates_travel_and_stopovers() {
        let train = schedule();
        let origin: ServiceDate = "06-05".parse().unwrap();

        let rows = train.timetable(origin);
        assert_eq!(rows.len(), 3);
        assert!(rows[0].arrival.is_none());
        assert_eq!(format_instant(rows[0].departure.unwrap()), "06-05 23:00");
        // 90 minutes of travel crosses midnight.
        assert_eq!(format_instant(rows[1].arrival.unwrap()), "06-06 00:30");
        assert_eq!(format_instant(rows[1].departure.unwrap()), "06-06 01:00");
        assert_eq!(format_instant(rows[2].arrival.unwrap()), "06-06 02:00");
        assert!(rows[2].departure.is_none());
        assert_eq!(rows[2].price_from_origin, 300);
    }

    #[test]
    fn test_arrival_rolls_over_month_boundary() {
        let mut train = schedule();
        train.sale_last = "07-31".parse().unwrap();
        let origin: ServiceDate = "06-30".parse().unwrap();

        // 23:00 on the last day of a 30-day month plus 120 minutes.
        let arrival = train.arrival_at(origin, 2).unwrap();
        assert_eq!(format_instant(arrival), "07-01 01:00");
    }

    #[test]
    fn test_origin_date_inversion_accounts_for_overnight_offset() {
        let train = schedule();

        // Departure from beta happens one calendar day after the origin
        // departure, so a query date at beta maps to the previous origin date.
        let query: ServiceDate = "06-06".parse().unwrap();
        let origin = train.origin_date_for_departure_at(1, query).unwrap();
        assert_eq!(origin.to_string(), "06-05");

        // At the origin station the dates coincide.
        let origin = train.origin_date_for_departure_at(0, query).unwrap();
        assert_eq!(origin.to_string(), "06-06");
    }

    #[test]
    fn test_schedule_serde_round_trip() {
        let train = schedule();
        let json = serde_json::to_string(&train).unwrap();
        let back: TrainSchedule = serde_json::from_str(&json).unwrap();
        assert_eq!(back.train_id, train.train_id);
        assert_eq!(back.prices, train.prices);
        assert_eq!(back.sale_last, train.sale_last);
    }
}
