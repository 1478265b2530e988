pub mod models;
pub mod ticket;
pub mod transfer;

pub use models::{SortKey, SortKeyError, TicketOption, TransferItinerary};
pub use ticket::search_tickets;
pub use transfer::search_transfer;
