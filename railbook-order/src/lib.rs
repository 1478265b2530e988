pub mod ledger;
pub mod models;

pub use ledger::{BuyOutcome, BuyRequest, OrderError, OrderLedger, OrderLimits};
pub use models::{Order, OrderStatus};
