pub mod time;

pub use time::{format_instant, parse_time_of_day, ServiceDate, TimeParseError, SERVICE_YEAR};
