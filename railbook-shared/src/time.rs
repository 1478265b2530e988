use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// All schedule dates live inside one implied service year.
pub const SERVICE_YEAR: i32 = 2021;

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid calendar date: month {month}, day {day}")]
    InvalidDate { month: u32, day: u32 },

    #[error("Malformed date, expected MM-dd: {0}")]
    MalformedDate(String),

    #[error("Malformed time, expected HH:MM: {0}")]
    MalformedTime(String),
}

/// A calendar date within the service year, carried as `MM-dd`.
///
/// Backed by a real calendar date so that day arithmetic respects actual
/// month lengths: the day after 06-30 is 07-01, never "06-31".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceDate(NaiveDate);

impl ServiceDate {
    pub fn new(month: u32, day: u32) -> Result<Self, TimeParseError> {
        NaiveDate::from_ymd_opt(SERVICE_YEAR, month, day)
            .map(Self)
            .ok_or(TimeParseError::InvalidDate { month, day })
    }

    /// Wraps a calendar date, rejecting dates outside the service year.
    pub fn from_naive(date: NaiveDate) -> Option<Self> {
        (date.year() == SERVICE_YEAR).then_some(Self(date))
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    pub fn and_time(&self, time: NaiveTime) -> NaiveDateTime {
        self.0.and_time(time)
    }

    /// The date `n` days later, if still inside the service year.
    pub fn plus_days(&self, n: u64) -> Option<Self> {
        self.0.checked_add_days(Days::new(n)).and_then(Self::from_naive)
    }

    /// The date `n` days earlier, if still inside the service year.
    pub fn minus_days(&self, n: u64) -> Option<Self> {
        self.0.checked_sub_days(Days::new(n)).and_then(Self::from_naive)
    }
}

impl fmt::Display for ServiceDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.0.month(), self.0.day())
    }
}

impl FromStr for ServiceDate {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (month, day) = s
            .split_once('-')
            .ok_or_else(|| TimeParseError::MalformedDate(s.to_string()))?;
        let month: u32 = month
            .parse()
            .map_err(|_| TimeParseError::MalformedDate(s.to_string()))?;
        let day: u32 = day
            .parse()
            .map_err(|_| TimeParseError::MalformedDate(s.to_string()))?;
        Self::new(month, day)
    }
}

impl Serialize for ServiceDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ServiceDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parses a `HH:MM` time of day.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime, TimeParseError> {
    let (hour, minute) = s
        .split_once(':')
        .ok_or_else(|| TimeParseError::MalformedTime(s.to_string()))?;
    let hour: u32 = hour
        .parse()
        .map_err(|_| TimeParseError::MalformedTime(s.to_string()))?;
    let minute: u32 = minute
        .parse()
        .map_err(|_| TimeParseError::MalformedTime(s.to_string()))?;
    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| TimeParseError::MalformedTime(s.to_string()))
}

/// Formats a date-time as `MM-dd HH:MM` for the line protocol.
pub fn format_instant(at: NaiveDateTime) -> String {
    format!(
        "{:02}-{:02} {:02}:{:02}",
        at.month(),
        at.day(),
        at.hour(),
        at.minute()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_parse_and_display() {
        let date: ServiceDate = "06-05".parse().unwrap();
        assert_eq!(date.month(), 6);
        assert_eq!(date.day(), 5);
        assert_eq!(date.to_string(), "06-05");
    }

    #[test]
    fn test_date_rejects_bad_calendar_days() {
        assert!("06-31".parse::<ServiceDate>().is_err());
        assert!("02-30".parse::<ServiceDate>().is_err());
        assert!("13-01".parse::<ServiceDate>().is_err());
        assert!("0630".parse::<ServiceDate>().is_err());
    }

    #[test]
    fn test_day_arithmetic_rolls_over_real_month_lengths() {
        // June has 30 days.
        let date: ServiceDate = "06-30".parse().unwrap();
        assert_eq!(date.plus_days(1).unwrap().to_string(), "07-01");

        // July has 31.
        let date: ServiceDate = "07-31".parse().unwrap();
        assert_eq!(date.plus_days(1).unwrap().to_string(), "08-01");

        let date: ServiceDate = "08-01".parse().unwrap();
        assert_eq!(date.minus_days(1).unwrap().to_string(), "07-31");
    }

    #[test]
    fn test_minute_offsets_cross_month_boundaries() {
        let date: ServiceDate = "06-30".parse().unwrap();
        let depart = date.and_time(parse_time_of_day("23:00").unwrap());
        let arrive = depart + chrono::Duration::minutes(120);
        assert_eq!(format_instant(arrive), "07-01 01:00");
    }

    #[test]
    fn test_time_parse() {
        let t = parse_time_of_day("08:05").unwrap();
        assert_eq!((t.hour(), t.minute()), (8, 5));
        assert!(parse_time_of_day("24:00").is_err());
        assert!(parse_time_of_day("0800").is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let date: ServiceDate = "06-30".parse().unwrap();
        let json = serde_json::to_string(&date).unwrap();
        assert_eq!(json, "\"06-30\"");
        let back: ServiceDate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, date);
    }
}
