// 📅 Month Keys - Calendar months as `YYYY-MM`
//
// Month keys are compared in calendar order. The derived Ord (year, then
// month) agrees with lexicographic order of the zero-padded string form.

use crate::error::{ExpenseError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// YEAR-MONTH
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || !(0..=9999).contains(&year) {
            return Err(ExpenseError::InvalidMonth(format!("{}-{}", year, month)));
        }
        Ok(YearMonth { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        YearMonth {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Month key of an ISO `YYYY-MM-DD` date string
    pub fn from_iso_date(date: &str) -> Result<Self> {
        let parsed = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|_| ExpenseError::Validation(format!("unparseable date '{}'", date)))?;
        Ok(Self::from_date(parsed))
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Next calendar month; December carries into January of the next year
    pub fn succ(&self) -> Self {
        if self.month == 12 {
            YearMonth {
                year: self.year + 1,
                month: 1,
            }
        } else {
            YearMonth {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        // year/month are validated at construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// `YYYY-MM-01`
    pub fn first_day_iso(&self) -> String {
        format!("{}-01", self)
    }

    /// Every month from `self` through `end`, inclusive, in calendar order
    pub fn through(self, end: YearMonth) -> MonthRange {
        MonthRange {
            next: Some(self),
            end,
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = ExpenseError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (y, m) = s
            .split_once('-')
            .ok_or_else(|| ExpenseError::InvalidMonth(s.to_string()))?;
        if y.len() != 4 || m.len() != 2 {
            return Err(ExpenseError::InvalidMonth(s.to_string()));
        }
        let year = y
            .parse::<i32>()
            .map_err(|_| ExpenseError::InvalidMonth(s.to_string()))?;
        let month = m
            .parse::<u32>()
            .map_err(|_| ExpenseError::InvalidMonth(s.to_string()))?;
        YearMonth::new(year, month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// MONTH RANGE
// ============================================================================

/// Iterator over an inclusive range of months
#[derive(Debug, Clone)]
pub struct MonthRange {
    next: Option<YearMonth>,
    end: YearMonth,
}

impl Iterator for MonthRange {
    type Item = YearMonth;

    fn next(&mut self) -> Option<YearMonth> {
        let current = self.next.filter(|ym| *ym <= self.end)?;
        self.next = Some(current.succ());
        Some(current)
    }
}

/// Months between `start` and `end` (inclusive) that are not in `have`
///
/// Returns an empty list when `start` is after `end`.
pub fn missing_months(start: YearMonth, end: YearMonth, have: &BTreeSet<YearMonth>) -> Vec<YearMonth> {
    start.through(end).filter(|ym| !have.contains(ym)).collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let m = ym("2024-03");
        assert_eq!(m.year(), 2024);
        assert_eq!(m.month(), 3);
        assert_eq!(m.to_string(), "2024-03");
        assert_eq!(m.first_day_iso(), "2024-03-01");
    }

    #[test]
    fn test_parse_rejects_bad_keys() {
        assert!("2024-13".parse::<YearMonth>().is_err());
        assert!("2024-00".parse::<YearMonth>().is_err());
        assert!("2024-3".parse::<YearMonth>().is_err());
        assert!("March".parse::<YearMonth>().is_err());
    }

    #[test]
    fn test_from_iso_date() {
        assert_eq!(YearMonth::from_iso_date("2024-01-31").unwrap(), ym("2024-01"));
        assert!(YearMonth::from_iso_date("2024-02-30").is_err());
        assert!(YearMonth::from_iso_date("01/31/2024").is_err());
    }

    #[test]
    fn test_year_rollover() {
        let months: Vec<String> = ym("2023-11")
            .through(ym("2024-02"))
            .map(|m| m.to_string())
            .collect();

        assert_eq!(months, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
    }

    #[test]
    fn test_ordering_matches_string_order() {
        let a = ym("2023-12");
        let b = ym("2024-01");
        assert!(a < b);
        assert!(a.to_string() < b.to_string());
    }

    #[test]
    fn test_missing_months() {
        let have: BTreeSet<YearMonth> = [ym("2024-01"), ym("2024-03")].into_iter().collect();
        let missing = missing_months(ym("2024-01"), ym("2024-04"), &have);

        assert_eq!(missing, vec![ym("2024-02"), ym("2024-04")]);
    }

    #[test]
    fn test_missing_months_empty_when_start_after_end() {
        let have = BTreeSet::new();
        assert!(missing_months(ym("2025-01"), ym("2024-12"), &have).is_empty());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&ym("2024-07")).unwrap();
        assert_eq!(json, "\"2024-07\"");
        let back: YearMonth = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ym("2024-07"));
    }
}
