use std::collections::{HashMap, VecDeque};

use railbook_catalog::{Catalog, InventoryError, RunKey, SeatLedger};
use railbook_shared::ServiceDate;
use serde::Deserialize;

use crate::models::{Order, OrderStatus};

#[derive(Debug, Clone, Deserialize)]
pub struct OrderLimits {
    /// Largest ticket count accepted in one purchase.
    #[serde(default = "default_max_tickets")]
    pub max_tickets: u32,
}

fn default_max_tickets() -> u32 {
    100_000
}

impl Default for OrderLimits {
    fn default() -> Self {
        Self {
            max_tickets: default_max_tickets(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Train not available: {0}")]
    TrainUnavailable(String),

    #[error("Not enough seats and queueing was declined")]
    SoldOut,

    #[error("Order not found")]
    NotFound,

    #[error("Order is not refundable")]
    NotRefundable,

    #[error("Order {0} references a train missing from the catalog")]
    MissingTrain(u64),

    #[error(transparent)]
    Ledger(InventoryError),
}

#[derive(Debug, Clone)]
pub struct BuyRequest<'a> {
    pub username: &'a str,
    pub train_id: &'a str,
    /// Departure calendar date at the `from` station.
    pub date: ServiceDate,
    pub from: &'a str,
    pub to: &'a str,
    pub count: u32,
    pub allow_queue: bool,
}

/// Outcome of a buy: an immediate purchase with its price, or an
/// acknowledgment that the request is waiting in the run's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuyOutcome {
    Purchased { order_id: u64, total_price: u64 },
    Queued { order_id: u64 },
}

/// Owns every order record and the per-run FIFO pending queues; the only
/// writer of order status. Inventory moves through the seat ledger it is
/// handed, never directly.
pub struct OrderLedger {
    limits: OrderLimits,
    /// Creation order; `orders[i].id == i + 1`.
    orders: Vec<Order>,
    by_user: HashMap<String, Vec<usize>>,
    queues: HashMap<RunKey, VecDeque<usize>>,
}

impl OrderLedger {
    pub fn new() -> Self {
        Self::with_limits(OrderLimits::default())
    }

    pub fn with_limits(limits: OrderLimits) -> Self {
        Self {
            limits,
            orders: Vec::new(),
            by_user: HashMap::new(),
            queues: HashMap::new(),
        }
    }

    /// Attempts a purchase over `[from, to)` of the run pinned by the
    /// request date at the `from` station.
    pub fn buy(
        &mut self,
        catalog: &Catalog,
        seats: &mut SeatLedger,
        request: BuyRequest<'_>,
    ) -> Result<BuyOutcome, OrderError> {
        if request.count == 0 || request.count > self.limits.max_tickets {
            return Err(OrderError::InvalidRequest(format!(
                "ticket count {} out of range",
                request.count
            )));
        }
        let train = catalog
            .get(request.train_id)
            .ok_or_else(|| OrderError::TrainUnavailable(request.train_id.to_string()))?;
        if !train.released {
            return Err(OrderError::TrainUnavailable(request.train_id.to_string()));
        }
        if request.count > train.seat_count {
            return Err(OrderError::InvalidRequest(format!(
                "ticket count {} exceeds train capacity {}",
                request.count, train.seat_count
            )));
        }
        let from_idx = train.station_index(request.from).ok_or_else(|| {
            OrderError::InvalidRequest(format!("station not on route: {}", request.from))
        })?;
        let to_idx = train.station_index(request.to).ok_or_else(|| {
            OrderError::InvalidRequest(format!("station not on route: {}", request.to))
        })?;
        if from_idx >= to_idx {
            return Err(OrderError::InvalidRequest(
                "stations out of route order".into(),
            ));
        }
        let origin_date = train
            .origin_date_for_departure_at(from_idx, request.date)
            .ok_or_else(|| OrderError::InvalidRequest(format!("bad date {}", request.date)))?;
        if !train.in_sale_window(origin_date) {
            return Err(OrderError::TrainUnavailable(request.train_id.to_string()));
        }

        let order_id = self.orders.len() as u64 + 1;
        let mut order = Order {
            id: order_id,
            username: request.username.to_string(),
            train_id: train.train_id.clone(),
            origin_date,
            from: request.from.to_string(),
            to: request.to.to_string(),
            from_idx,
            to_idx,
            // Both are always present for a valid 0 <= from < to span.
            departure: train
                .departure_at(origin_date, from_idx)
                .ok_or_else(|| OrderError::InvalidRequest("span outside route".into()))?,
            arrival: train
                .arrival_at(origin_date, to_idx)
                .ok_or_else(|| OrderError::InvalidRequest("span outside route".into()))?,
            count: request.count,
            unit_price: train.price_between(from_idx, to_idx),
            status: OrderStatus::Success,
        };

        match seats.try_reserve(train, origin_date, from_idx, to_idx, request.count) {
            Ok(()) => {
                let total = order.total_price();
                tracing::info!(order_id, train_id = %order.train_id, count = order.count, "purchase succeeded");
                self.append(order);
                Ok(BuyOutcome::Purchased {
                    order_id,
                    total_price: total,
                })
            }
            Err(InventoryError::InsufficientSeats { .. }) if request.allow_queue => {
                order.status = OrderStatus::Pending;
                let run = RunKey::new(&order.train_id, origin_date);
                let idx = self.append(order);
                self.queues.entry(run).or_default().push_back(idx);
                tracing::info!(order_id, "purchase queued");
                Ok(BuyOutcome::Queued { order_id })
            }
            Err(InventoryError::InsufficientSeats { .. }) => Err(OrderError::SoldOut),
            Err(err) => Err(OrderError::Ledger(err)),
        }
    }

    /// Refunds the user's `order_index`-th most recent order (1 = latest).
    ///
    /// Refunding a Success order releases its seats and then resolves the
    /// run's pending queue; refunding a Pending order just removes it from
    /// the queue.
    pub fn refund(
        &mut self,
        catalog: &Catalog,
        seats: &mut SeatLedger,
        username: &str,
        order_index: usize,
    ) -> Result<(), OrderError> {
        let user_orders = self.by_user.get(username).ok_or(OrderError::NotFound)?;
        if order_index == 0 || order_index > user_orders.len() {
            return Err(OrderError::NotFound);
        }
        let idx = user_orders[user_orders.len() - order_index];

        match self.orders[idx].status {
            OrderStatus::Refunded => Err(OrderError::NotRefundable),
            OrderStatus::Pending => {
                self.orders[idx].status = OrderStatus::Refunded;
                let run = RunKey::new(&self.orders[idx].train_id, self.orders[idx].origin_date);
                if let Some(queue) = self.queues.get_mut(&run) {
                    queue.retain(|&queued| queued != idx);
                }
                tracing::info!(order_id = self.orders[idx].id, "pending order refunded");
                Ok(())
            }
            OrderStatus::Success => {
                let order = &self.orders[idx];
                let train = catalog
                    .get(&order.train_id)
                    .ok_or(OrderError::MissingTrain(order.id))?;
                seats
                    .release(
                        train,
                        order.origin_date,
                        order.from_idx,
                        order.to_idx,
                        order.count,
                    )
                    .map_err(OrderError::Ledger)?;
                let run = RunKey::new(&order.train_id, order.origin_date);
                tracing::info!(order_id = order.id, "order refunded, seats released");
                self.orders[idx].status = OrderStatus::Refunded;
                self.resolve_queue(catalog, seats, &run)
            }
        }
    }

    /// Services the run's pending queue strictly in submission order.
    ///
    /// Scanning stops at the first entry that still does not fit: a later,
    /// smaller request is never serviced past an unsatisfied earlier one.
    fn resolve_queue(
        &mut self,
        catalog: &Catalog,
        seats: &mut SeatLedger,
        run: &RunKey,
    ) -> Result<(), OrderError> {
        loop {
            let Some(queue) = self.queues.get_mut(run) else {
                return Ok(());
            };
            let Some(&idx) = queue.front() else {
                self.queues.remove(run);
                return Ok(());
            };
            let order = &self.orders[idx];
            debug_assert_eq!(order.status, OrderStatus::Pending);
            let train = catalog
                .get(&order.train_id)
                .ok_or(OrderError::MissingTrain(order.id))?;
            match seats.try_reserve(
                train,
                order.origin_date,
                order.from_idx,
                order.to_idx,
                order.count,
            ) {
                Ok(()) => {
                    tracing::debug!(order_id = order.id, "queued order promoted");
                    self.orders[idx].status = OrderStatus::Success;
                    queue.pop_front();
                }
                Err(InventoryError::InsufficientSeats { .. }) => return Ok(()),
                Err(err) => return Err(OrderError::Ledger(err)),
            }
        }
    }

    /// The user's orders, newest first by creation sequence.
    pub fn orders_for(&self, username: &str) -> Vec<&Order> {
        self.by_user
            .get(username)
            .map(|indices| indices.iter().rev().map(|&i| &self.orders[i]).collect())
            .unwrap_or_default()
    }

    fn append(&mut self, order: Order) -> usize {
        let idx = self.orders.len();
        self.by_user
            .entry(order.username.clone())
            .or_default()
            .push(idx);
        self.orders.push(order);
        idx
    }

    pub fn clear(&mut self) {
        self.orders.clear();
        self.by_user.clear();
        self.queues.clear();
    }
}

impl Default for OrderLedger {
    fn default() -> Self {
        Self::new()
    }
}
