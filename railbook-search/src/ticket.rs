use railbook_catalog::{Catalog, SeatLedger, TrainSchedule};
use railbook_shared::ServiceDate;

use crate::models::{SortKey, TicketOption};

/// Direct-route search: every released run connecting `from` to `to`
/// whose departure at `from` falls on `date`.
///
/// Results sort ascending by duration (`SortKey::Time`) or price
/// (`SortKey::Cost`); ties break by train id.
pub fn search_tickets(
    catalog: &Catalog,
    seats: &SeatLedger,
    from: &str,
    to: &str,
    date: ServiceDate,
    key: SortKey,
) -> Vec<TicketOption> {
    let mut options: Vec<TicketOption> = catalog
        .find_by_station_pair(from, to)
        .filter(|(train, _, _)| train.released)
        .filter_map(|(train, from_idx, to_idx)| {
            leg_option(train, seats, from_idx, to_idx, date)
        })
        .collect();
    sort_options(&mut options, key);
    options
}

/// Builds the option for one train's passage through `from_idx` on
/// `query_date`, or `None` when that pins a run outside the sale window.
pub(crate) fn leg_option(
    train: &TrainSchedule,
    seats: &SeatLedger,
    from_idx: usize,
    to_idx: usize,
    query_date: ServiceDate,
) -> Option<TicketOption> {
    let origin = train.origin_date_for_departure_at(from_idx, query_date)?;
    if !train.in_sale_window(origin) {
        return None;
    }
    Some(TicketOption {
        train_id: train.train_id.clone(),
        from: train.stations[from_idx].clone(),
        to: train.stations[to_idx].clone(),
        departure: train.departure_at(origin, from_idx)?,
        arrival: train.arrival_at(origin, to_idx)?,
        price: train.price_between(from_idx, to_idx),
        remaining: seats.remaining(train, origin, from_idx, to_idx),
    })
}

fn sort_options(options: &mut [TicketOption], key: SortKey) {
    options.sort_by(|a, b| {
        let primary = match key {
            SortKey::Time => a.duration_minutes().cmp(&b.duration_minutes()),
            SortKey::Cost => a.price.cmp(&b.price),
        };
        primary.then_with(|| a.train_id.cmp(&b.train_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use railbook_catalog::TrainSchedule;
    use railbook_shared::parse_time_of_day;

    fn train(id: &str, start: &str, travel: u32, price: u32) -> TrainSchedule {
        TrainSchedule {
            train_id: id.to_string(),
            stations: vec!["east".into(), "mid".into(), "west".into()],
            seat_count: 50,
            prices: vec![price, price],
            start_time: parse_time_of_day(start).unwrap(),
            travel_minutes: vec![travel, travel],
            stopover_minutes: vec![10],
            sale_first: "06-01".parse().unwrap(),
            sale_last: "06-30".parse().unwrap(),
            seat_class: 'G',
            released: false,
        }
    }

    fn released_catalog(trains: Vec<TrainSchedule>) -> Catalog {
        let mut catalog = Catalog::new();
        for train in trains {
            let id = train.train_id.clone();
            catalog.add_train(train).unwrap();
            catalog.release(&id).unwrap();
        }
        catalog
    }

    #[test]
    fn test_sorts_by_duration_then_train_id() {
        let catalog = released_catalog(vec![
            train("B2", "08:00", 90, 10),
            train("A1", "09:00", 60, 99),
            train("A0", "10:00", 60, 99),
        ]);
        let seats = SeatLedger::new();
        let date: ServiceDate = "06-10".parse().unwrap();

        let hits = search_tickets(&catalog, &seats, "east", "west", date, SortKey::Time);
        let ids: Vec<_> = hits.iter().map(|o| o.train_id.as_str()).collect();
        assert_eq!(ids, vec!["A0", "A1", "B2"]);

        let hits = search_tickets(&catalog, &seats, "east", "west", date, SortKey::Cost);
        let ids: Vec<_> = hits.iter().map(|o| o.train_id.as_str()).collect();
        assert_eq!(ids, vec!["B2", "A0", "A1"]);
    }

    #[test]
    fn test_skips_unreleased_and_out_of_window() {
        let mut catalog = released_catalog(vec![train("A1", "08:00", 60, 10)]);
        catalog.add_train(train("B1", "08:00", 60, 10)).unwrap();
        let seats = SeatLedger::new();

        let date: ServiceDate = "06-10".parse().unwrap();
        let hits = search_tickets(&catalog, &seats, "east", "west", date, SortKey::Time);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].train_id, "A1");

        let date: ServiceDate = "07-10".parse().unwrap();
        let hits = search_tickets(&catalog, &seats, "east", "west", date, SortKey::Time);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_sold_out_runs_are_still_listed() {
        let catalog = released_catalog(vec![train("A1", "08:00", 60, 10)]);
        let mut seats = SeatLedger::new();
        let date: ServiceDate = "06-10".parse().unwrap();
        let schedule = catalog.get("A1").unwrap();
        seats.try_reserve(schedule, date, 0, 2, 50).unwrap();

        let hits = search_tickets(&catalog, &seats, "east", "west", date, SortKey::Time);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].remaining, 0);
    }

    #[test]
    fn test_query_date_pins_run_at_queried_station() {
        // Departure from mid is 23:30 + 90 + 10 minutes, one day after the
        // origin departure. A 06-02 query at mid must match the 06-01 run.
        let mut overnight = train("N1", "23:30", 90, 10);
        overnight.sale_first = "06-01".parse().unwrap();
        overnight.sale_last = "06-01".parse().unwrap();
        let catalog = released_catalog(vec![overnight]);
        let seats = SeatLedger::new();

        let date: ServiceDate = "06-02".parse().unwrap();
        let hits = search_tickets(&catalog, &seats, "mid", "west", date, SortKey::Time);
        assert_eq!(hits.len(), 1);
        assert_eq!(
            railbook_shared::format_instant(hits[0].departure),
            "06-02 01:10"
        );

        // At the origin station that same query date is out of window.
        let hits = search_tickets(&catalog, &seats, "east", "west", date, SortKey::Time);
        assert!(hits.is_empty());
    }
}
