use chrono::NaiveDateTime;
use serde::Serialize;

use railbook_catalog::{Catalog, CatalogError, SeatLedger, TrainSchedule};
use railbook_order::{BuyOutcome, BuyRequest, Order, OrderError, OrderLedger};
use railbook_search::{search_tickets, search_transfer, SortKey, TicketOption, TransferItinerary};
use railbook_shared::ServiceDate;

use crate::config::Config;
use crate::identity::{IdentityError, NewUser, ProfileUpdate, User, UserDirectory};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Timetable of one run, ready for display.
#[derive(Debug, Clone, Serialize)]
pub struct RunTimetable {
    pub train_id: String,
    pub seat_class: char,
    pub rows: Vec<TimetableRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimetableRow {
    pub station: String,
    pub arrival: Option<NaiveDateTime>,
    pub departure: Option<NaiveDateTime>,
    pub price_from_origin: u32,
    /// Remaining seats on the segment leaving this station; absent at the
    /// terminal.
    pub remaining: Option<u32>,
}

/// The booking engine: one instance per process, owning the catalog, the
/// seat ledger, the order ledger, and the user directory.
///
/// All operations run to completion on the caller's thread. A concurrent
/// host must hold one exclusion scope per run around buy/refund, since a
/// reservation and the queue scan it may trigger form one atomic unit.
pub struct TicketEngine {
    catalog: Catalog,
    seats: SeatLedger,
    orders: OrderLedger,
    users: UserDirectory,
}

impl TicketEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            catalog: Catalog::with_limits(config.catalog.clone()),
            seats: SeatLedger::new(),
            orders: OrderLedger::with_limits(config.orders.clone()),
            users: UserDirectory::new(),
        }
    }

    // --- identity -------------------------------------------------------

    pub fn add_user(&mut self, current: Option<&str>, user: NewUser) -> Result<(), EngineError> {
        Ok(self.users.add_user(current, user)?)
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<(), EngineError> {
        Ok(self.users.login(username, password)?)
    }

    pub fn logout(&mut self, username: &str) -> Result<(), EngineError> {
        Ok(self.users.logout(username)?)
    }

    pub fn query_profile(&self, current: &str, username: &str) -> Result<&User, EngineError> {
        Ok(self.users.query_profile(current, username)?)
    }

    pub fn modify_profile(
        &mut self,
        current: &str,
        username: &str,
        update: ProfileUpdate,
    ) -> Result<&User, EngineError> {
        Ok(self.users.modify_profile(current, username, update)?)
    }

    // --- catalog --------------------------------------------------------

    pub fn add_train(&mut self, train: TrainSchedule) -> Result<(), EngineError> {
        Ok(self.catalog.add_train(train)?)
    }

    pub fn release_train(&mut self, train_id: &str) -> Result<(), EngineError> {
        Ok(self.catalog.release(train_id)?)
    }

    pub fn delete_train(&mut self, train_id: &str) -> Result<(), EngineError> {
        Ok(self.catalog.remove(train_id)?)
    }

    /// Full stop listing of the run leaving its origin on `date`, with
    /// per-segment remaining seats.
    pub fn query_timetable(
        &self,
        train_id: &str,
        date: ServiceDate,
    ) -> Result<RunTimetable, EngineError> {
        let train = self
            .catalog
            .get(train_id)
            .ok_or_else(|| CatalogError::NotFound(train_id.to_string()))?;
        if !train.in_sale_window(date) {
            return Err(CatalogError::Unavailable(train_id.to_string()).into());
        }
        let last = train.segment_count();
        let rows = train
            .timetable(date)
            .into_iter()
            .enumerate()
            .map(|(idx, stop)| TimetableRow {
                station: stop.station,
                arrival: stop.arrival,
                departure: stop.departure,
                price_from_origin: stop.price_from_origin,
                remaining: (idx < last).then(|| self.seats.remaining(train, date, idx, idx + 1)),
            })
            .collect();
        Ok(RunTimetable {
            train_id: train.train_id.clone(),
            seat_class: train.seat_class,
            rows,
        })
    }

    // --- search ---------------------------------------------------------

    pub fn query_ticket(
        &self,
        from: &str,
        to: &str,
        date: ServiceDate,
        key: SortKey,
    ) -> Vec<TicketOption> {
        search_tickets(&self.catalog, &self.seats, from, to, date, key)
    }

    pub fn query_transfer(
        &self,
        from: &str,
        to: &str,
        date: ServiceDate,
        key: SortKey,
    ) -> Option<TransferItinerary> {
        search_transfer(&self.catalog, &self.seats, from, to, date, key)
    }

    // --- orders ---------------------------------------------------------

    pub fn buy_ticket(&mut self, request: BuyRequest<'_>) -> Result<BuyOutcome, EngineError> {
        self.require_login(request.username)?;
        Ok(self.orders.buy(&self.catalog, &mut self.seats, request)?)
    }

    pub fn refund_ticket(&mut self, username: &str, order_index: usize) -> Result<(), EngineError> {
        self.require_login(username)?;
        Ok(self
            .orders
            .refund(&self.catalog, &mut self.seats, username, order_index)?)
    }

    pub fn query_orders(&self, username: &str) -> Result<Vec<&Order>, EngineError> {
        self.require_login(username)?;
        Ok(self.orders.orders_for(username))
    }

    fn require_login(&self, username: &str) -> Result<(), EngineError> {
        if self.users.is_logged_in(username) {
            Ok(())
        } else {
            Err(IdentityError::NotLoggedIn(username.to_string()).into())
        }
    }

    /// Resets every component, as the legacy `clean` command did.
    pub fn clean(&mut self) {
        self.catalog.clear();
        self.seats.clear();
        self.orders.clear();
        self.users.clear();
        tracing::info!("engine state cleared");
    }
}
