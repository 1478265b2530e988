pub mod catalog;
pub mod inventory;
pub mod schedule;

pub use catalog::{Catalog, CatalogError, CatalogLimits};
pub use inventory::{InventoryError, RunKey, SeatLedger};
pub use schedule::{StopTime, TrainSchedule};
