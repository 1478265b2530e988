use chrono::NaiveDateTime;
use railbook_shared::ServiceDate;
use serde::{Deserialize, Serialize};

/// Order lifecycle. Legal transitions are `Pending -> Success` (queue
/// resolution), `Success -> Refunded` (refund), and `Pending -> Refunded`
/// (canceling a never-fulfilled request). Nothing else.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Success,
    Pending,
    Refunded,
}

/// One purchase record. Orders are append-only; refunds flip the status
/// but never delete the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Global monotonic id; doubles as the creation sequence number that
    /// defines queue and display order.
    pub id: u64,
    pub username: String,
    pub train_id: String,
    pub origin_date: ServiceDate,
    pub from: String,
    pub to: String,
    pub from_idx: usize,
    pub to_idx: usize,
    pub departure: NaiveDateTime,
    pub arrival: NaiveDateTime,
    pub count: u32,
    pub unit_price: u32,
    pub status: OrderStatus,
}

impl Order {
    pub fn total_price(&self) -> u64 {
        u64::from(self.unit_price) * u64::from(self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use railbook_shared::parse_time_of_day;

    #[test]
    fn test_order_serde_round_trip() {
        let date: ServiceDate = "06-10".parse().unwrap();
        let order = Order {
            id: 7,
            username: "rider".into(),
            train_id: "G100".into(),
            origin_date: date,
            from: "east".into(),
            to: "west".into(),
            from_idx: 0,
            to_idx: 2,
            departure: date.and_time(parse_time_of_day("08:00").unwrap()),
            arrival: date.and_time(parse_time_of_day("10:00").unwrap()),
            count: 3,
            unit_price: 150,
            status: OrderStatus::Pending,
        };

        let json = serde_json::to_string(&order).unwrap();
        assert!(json.contains("\"PENDING\""));
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, 7);
        assert_eq!(back.total_price(), 450);
        assert_eq!(back.status, OrderStatus::Pending);
    }
}
