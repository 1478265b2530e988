use std::cmp::Ordering;

use chrono::NaiveDateTime;
use railbook_catalog::{Catalog, SeatLedger, TrainSchedule};
use railbook_shared::ServiceDate;

use crate::models::{SortKey, TicketOption, TransferItinerary};
use crate::ticket::leg_option;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// One-transfer search: the best pair of runs joined at an intermediate
/// station, or `None` when no feasible pair exists.
///
/// Candidates come from the station index on both ends of the join, never
/// from a full scan of the catalog. For each (first leg, second leg, mid)
/// triple the second leg's run is the earliest one departing mid at or
/// after the first leg's arrival there; the global winner minimizes the
/// requested key, breaking ties by the other metric, then by the two
/// train ids.
pub fn search_transfer(
    catalog: &Catalog,
    seats: &SeatLedger,
    from: &str,
    to: &str,
    date: ServiceDate,
    key: SortKey,
) -> Option<TransferItinerary> {
    let mut best: Option<TransferItinerary> = None;

    for first in catalog.trains_via(from) {
        if !first.released {
            continue;
        }
        let Some(from_idx) = first.station_index(from) else {
            continue;
        };
        if from_idx >= first.segment_count() {
            continue;
        }

        for mid_idx in from_idx + 1..first.stations.len() {
            let mid = &first.stations[mid_idx];
            // Pins the first leg's run by the query date at `from` and
            // yields its arrival at the join station.
            let Some(leg_a) = leg_option(first, seats, from_idx, mid_idx, date) else {
                break; // out of the sale window for every mid alike
            };

            for second in catalog.trains_via(mid) {
                if !second.released || second.train_id == first.train_id {
                    continue;
                }
                let Some(board_idx) = second.station_index(mid) else {
                    continue;
                };
                let Some(alight_idx) = second.station_index(to) else {
                    continue;
                };
                if board_idx >= alight_idx {
                    continue;
                }
                let Some(origin_b) =
                    earliest_feasible_origin(second, board_idx, leg_a.arrival)
                else {
                    continue;
                };
                let Some(departure) = second.departure_at(origin_b, board_idx) else {
                    continue;
                };
                let Some(arrival) = second.arrival_at(origin_b, alight_idx) else {
                    continue;
                };
                let leg_b = TicketOption {
                    train_id: second.train_id.clone(),
                    from: mid.clone(),
                    to: to.to_string(),
                    departure,
                    arrival,
                    price: second.price_between(board_idx, alight_idx),
                    remaining: seats.remaining(second, origin_b, board_idx, alight_idx),
                };
                let candidate = TransferItinerary {
                    first: leg_a.clone(),
                    second: leg_b,
                };
                let replace = match &best {
                    None => true,
                    Some(current) => compare(&candidate, current, key) == Ordering::Less,
                };
                if replace {
                    best = Some(candidate);
                }
            }
        }
    }

    best
}

/// The earliest origin date, inside the sale window, whose departure at
/// `board_idx` is at or after `not_before`.
fn earliest_feasible_origin(
    train: &TrainSchedule,
    board_idx: usize,
    not_before: NaiveDateTime,
) -> Option<ServiceDate> {
    let first_departure = train.departure_at(train.sale_first, board_idx)?;
    if first_departure >= not_before {
        return Some(train.sale_first);
    }
    // Departure shifts by exactly one day per origin-date step.
    let deficit = (not_before - first_departure).num_minutes();
    let days = (deficit + MINUTES_PER_DAY - 1) / MINUTES_PER_DAY;
    let origin = train.sale_first.plus_days(days as u64)?;
    train.in_sale_window(origin).then_some(origin)
}

fn compare(a: &TransferItinerary, b: &TransferItinerary, key: SortKey) -> Ordering {
    let primary = match key {
        SortKey::Time => a
            .total_minutes()
            .cmp(&b.total_minutes())
            .then_with(|| a.total_price().cmp(&b.total_price())),
        SortKey::Cost => a
            .total_price()
            .cmp(&b.total_price())
            .then_with(|| a.total_minutes().cmp(&b.total_minutes())),
    };
    primary
        .then_with(|| a.first.train_id.cmp(&b.first.train_id))
        .then_with(|| a.second.train_id.cmp(&b.second.train_id))
}
