// 🕐 Clock - Injectable "today"

use crate::month::YearMonth;
use chrono::{Local, NaiveDate};

/// Source of the current local date
pub trait Clock {
    fn today(&self) -> NaiveDate;

    fn current_month(&self) -> YearMonth {
        YearMonth::from_date(self.today())
    }

    /// `YYYY-MM-DD`
    fn today_iso(&self) -> String {
        self.today().format("%Y-%m-%d").to_string()
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    fn today(&self) -> NaiveDate {
        (**self).today()
    }
}

/// Wall clock in the machine's local timezone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to a single date
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl FixedClock {
    pub fn ymd(year: i32, month: u32, day: u32) -> Self {
        FixedClock(NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN))
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
