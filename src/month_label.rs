// 🗓️ Month Label - the one way a calendar month is written and read
//
// Obligation months and the `month` field on payments both go through this
// type. Matching happens on the parsed value, never on raw strings, so
// "January 2024", "january 2024" and "2024-01" all name the same month.

use crate::errors::{DuesError, Result};
use chrono::{Datelike, Month, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar month, stored as its first day.
///
/// Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MonthLabel {
    first_day: NaiveDate,
}

impl MonthLabel {
    /// Build from year and month number (1-12).
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|first_day| MonthLabel { first_day })
    }

    /// The month containing `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        MonthLabel {
            first_day: date.with_day(1).unwrap_or(date),
        }
    }

    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    pub fn month(&self) -> u32 {
        self.first_day.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    /// The following calendar month (None only at the end of chrono's range).
    pub fn next(&self) -> Option<MonthLabel> {
        self.first_day
            .checked_add_months(Months::new(1))
            .map(|first_day| MonthLabel { first_day })
    }

    /// Number of months from `self` through `end`, both inclusive.
    ///
    /// Zero when `end` is earlier than `self`.
    pub fn months_through(&self, end: &MonthLabel) -> u32 {
        let diff = (end.year() as i64 - self.year() as i64) * 12 + end.month() as i64
            - self.month() as i64;
        if diff < 0 {
            0
        } else {
            (diff + 1).min(u32::MAX as i64) as u32
        }
    }

    /// Canonical label, e.g. "January 2024".
    pub fn label(&self) -> String {
        self.to_string()
    }

    /// Parse a recorded month label.
    ///
    /// Accepted: "January 2024" in any casing, extra whitespace or a comma
    /// between the parts, 3-letter abbreviations ("Jan 2024"), and ISO "2024-01".
    pub fn parse(raw: &str) -> Result<MonthLabel> {
        let invalid = || DuesError::InvalidMonthLabel(raw.to_string());

        let normalized = raw.replace(',', " ");
        let parts: Vec<&str> = normalized.split_whitespace().collect();

        match parts.as_slice() {
            [name, year] => {
                let month = Month::from_str(name).map_err(|_| invalid())?;
                let year = parse_year(year).ok_or_else(invalid)?;
                MonthLabel::new(year, month.number_from_month()).ok_or_else(invalid)
            }
            [iso] => {
                let (year, month) = iso.split_once('-').ok_or_else(invalid)?;
                if month.len() != 2 {
                    return Err(invalid());
                }
                let year = parse_year(year).ok_or_else(invalid)?;
                let month: u32 = month.parse().map_err(|_| invalid())?;
                MonthLabel::new(year, month).ok_or_else(invalid)
            }
            _ => Err(invalid()),
        }
    }
}

fn parse_year(raw: &str) -> Option<i32> {
    if raw.len() != 4 || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

impl fmt::Display for MonthLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first_day.format("%B %Y"))
    }
}

impl FromStr for MonthLabel {
    type Err = DuesError;

    fn from_str(s: &str) -> Result<Self> {
        MonthLabel::parse(s)
    }
}

impl From<MonthLabel> for String {
    fn from(label: MonthLabel) -> Self {
        label.to_string()
    }
}

impl TryFrom<String> for MonthLabel {
    type Error = DuesError;

    fn try_from(value: String) -> Result<Self> {
        MonthLabel::parse(&value)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(year: i32, month: u32) -> MonthLabel {
        MonthLabel::new(year, month).unwrap()
    }

    #[test]
    fn test_canonical_format() {
        assert_eq!(ym(2024, 1).to_string(), "January 2024");
        assert_eq!(ym(2023, 12).label(), "December 2023");
        assert_eq!(
            MonthLabel::from_date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()).label(),
            "February 2024"
        );
    }

    #[test]
    fn test_parse_canonical_round_trip() {
        let label = ym(2024, 9);
        assert_eq!(MonthLabel::parse(&label.label()).unwrap(), label);
    }

    #[test]
    fn test_parse_is_format_stable() {
        let expected = ym(2024, 3);
        for variant in [
            "March 2024",
            "march 2024",
            "MARCH 2024",
            "  March   2024 ",
            "March, 2024",
            "Mar 2024",
            "2024-03",
        ] {
            assert_eq!(MonthLabel::parse(variant).unwrap(), expected, "variant {:?}", variant);
        }
    }

    #[test]
    fn test_parse_rejects_other_locales_and_garbage() {
        for bad in [
            "Janvier 2024",
            "enero de 2024",
            "2024",
            "",
            "March",
            "March 24",
            "2024-13",
            "2024-3",
            "13/2024",
        ] {
            assert!(
                matches!(MonthLabel::parse(bad), Err(DuesError::InvalidMonthLabel(_))),
                "expected {:?} to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_next_crosses_year() {
        assert_eq!(ym(2023, 12).next(), Some(ym(2024, 1)));
        assert_eq!(ym(2024, 1).next(), Some(ym(2024, 2)));
    }

    #[test]
    fn test_months_through() {
        assert_eq!(ym(2024, 1).months_through(&ym(2024, 4)), 4);
        assert_eq!(ym(2024, 4).months_through(&ym(2024, 4)), 1);
        assert_eq!(ym(2023, 11).months_through(&ym(2024, 2)), 4);
        assert_eq!(ym(2024, 5).months_through(&ym(2024, 4)), 0);
    }

    #[test]
    fn test_ordering_is_chronological() {
        let mut labels = vec![ym(2024, 3), ym(2023, 12), ym(2024, 1)];
        labels.sort();
        assert_eq!(labels, vec![ym(2023, 12), ym(2024, 1), ym(2024, 3)]);
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let json = serde_json::to_string(&ym(2024, 2)).unwrap();
        assert_eq!(json, "\"February 2024\"");

        let parsed: MonthLabel = serde_json::from_str("\"feb 2024\"").unwrap();
        assert_eq!(parsed, ym(2024, 2));

        assert!(serde_json::from_str::<MonthLabel>("\"Février 2024\"").is_err());
    }
}
