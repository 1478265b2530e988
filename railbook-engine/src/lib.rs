pub mod commands;
pub mod config;
pub mod engine;
pub mod identity;

pub use commands::{dispatch_line, Dispatch};
pub use config::Config;
pub use engine::{EngineError, TicketEngine};
pub use identity::{IdentityError, UserDirectory};
