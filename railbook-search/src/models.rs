use chrono::NaiveDateTime;
use serde::Serialize;
use std::str::FromStr;

/// Ranking key for ticket and transfer search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Time,
    Cost,
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown sort key: {0}")]
pub struct SortKeyError(String);

impl FromStr for SortKey {
    type Err = SortKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "time" => Ok(SortKey::Time),
            "cost" => Ok(SortKey::Cost),
            other => Err(SortKeyError(other.to_string())),
        }
    }
}

/// One bookable leg between two stations on a specific run.
///
/// Sold-out runs are still reported; `remaining` is display data, not a
/// filter.
#[derive(Debug, Clone, Serialize)]
pub struct TicketOption {
    pub train_id: String,
    pub from: String,
    pub to: String,
    pub departure: NaiveDateTime,
    pub arrival: NaiveDateTime,
    pub price: u32,
    pub remaining: u32,
}

impl TicketOption {
    pub fn duration_minutes(&self) -> i64 {
        (self.arrival - self.departure).num_minutes()
    }
}

/// A one-transfer itinerary: two legs joined at an intermediate station.
#[derive(Debug, Clone, Serialize)]
pub struct TransferItinerary {
    pub first: TicketOption,
    pub second: TicketOption,
}

impl TransferItinerary {
    pub fn total_price(&self) -> u32 {
        self.first.price + self.second.price
    }

    /// Door-to-door minutes, transfer wait included.
    pub fn total_minutes(&self) -> i64 {
        (self.second.arrival - self.first.departure).num_minutes()
    }
}
