use std::collections::HashMap;

use railbook_shared::ServiceDate;
use serde::{Deserialize, Serialize};

use crate::schedule::TrainSchedule;

/// Identifies one run: a train pinned to its origin departure date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunKey {
    pub train_id: String,
    pub origin_date: ServiceDate,
}

impl RunKey {
    pub fn new(train_id: &str, origin_date: ServiceDate) -> Self {
        Self {
            train_id: train_id.to_string(),
            origin_date,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: u32, available: u32 },

    #[error("Seat ledger corrupted for run {train_id} {origin_date}: segment {segment} would exceed capacity")]
    LedgerCorrupted {
        train_id: String,
        origin_date: ServiceDate,
        segment: usize,
    },
}

/// Per-run, per-segment remaining-seat counts.
///
/// A run's entry is materialized at full capacity on first mutation;
/// reads of an untouched run report the train's capacity directly. The
/// two mutators are all-or-nothing over the requested span, so no caller
/// ever observes a partially reserved range.
pub struct SeatLedger {
    runs: HashMap<RunKey, Vec<u32>>,
}

impl SeatLedger {
    pub fn new() -> Self {
        Self {
            runs: HashMap::new(),
        }
    }

    /// Seats still available over every segment of `[from_idx, to_idx)`:
    /// the minimum across the span, since the scarcest segment binds.
    pub fn remaining(
        &self,
        train: &TrainSchedule,
        origin_date: ServiceDate,
        from_idx: usize,
        to_idx: usize,
    ) -> u32 {
        debug_assert!(from_idx < to_idx && to_idx <= train.segment_count());
        match self.runs.get(&RunKey::new(&train.train_id, origin_date)) {
            Some(seats) => seats[from_idx..to_idx].iter().copied().min().unwrap_or(0),
            None => train.seat_count,
        }
    }

    /// Reserves `count` seats on every segment of the span, or fails with
    /// `InsufficientSeats` leaving the ledger untouched.
    pub fn try_reserve(
        &mut self,
        train: &TrainSchedule,
        origin_date: ServiceDate,
        from_idx: usize,
        to_idx: usize,
        count: u32,
    ) -> Result<(), InventoryError> {
        debug_assert!(from_idx < to_idx && to_idx <= train.segment_count());
        let seats = self.seats_mut(train, origin_date);
        let available = seats[from_idx..to_idx].iter().copied().min().unwrap_or(0);
        if available < count {
            return Err(InventoryError::InsufficientSeats {
                requested: count,
                available,
            });
        }
        for seat in &mut seats[from_idx..to_idx] {
            *seat -= count;
        }
        Ok(())
    }

    /// Returns `count` seats to every segment of the span. A release that
    /// would push any segment past capacity indicates ledger corruption and
    /// mutates nothing.
    pub fn release(
        &mut self,
        train: &TrainSchedule,
        origin_date: ServiceDate,
        from_idx: usize,
        to_idx: usize,
        count: u32,
    ) -> Result<(), InventoryError> {
        debug_assert!(from_idx < to_idx && to_idx <= train.segment_count());
        let capacity = train.seat_count;
        let seats = self.seats_mut(train, origin_date);
        for (offset, seat) in seats[from_idx..to_idx].iter().enumerate() {
            if seat + count > capacity {
                let segment = from_idx + offset;
                tracing::error!(
                    train_id = %train.train_id,
                    %origin_date,
                    segment,
                    "seat release would exceed capacity"
                );
                return Err(InventoryError::LedgerCorrupted {
                    train_id: train.train_id.clone(),
                    origin_date,
                    segment,
                });
            }
        }
        for seat in &mut seats[from_idx..to_idx] {
            *seat += count;
        }
        Ok(())
    }

    fn seats_mut(&mut self, train: &TrainSchedule, origin_date: ServiceDate) -> &mut Vec<u32> {
        self.runs
            .entry(RunKey::new(&train.train_id, origin_date))
            .or_insert_with(|| vec![train.seat_count; train.segment_count()])
    }

    pub fn clear(&mut self) {
        self.runs.clear();
    }
}

impl Default for SeatLedger {
    fn default() -> Self {
        Self::new()
    }
}
