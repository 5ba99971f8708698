//! Passage date extraction.
//!
//! Laws usually state when they were adopted in free text, e.g.
//! `"The bill passed 3/15/2024 after debate"`. The extractor looks for the
//! first occurrence of the word `passed` (any case) followed by whitespace
//! and a `M/D/YYYY` date. The numbers are read month-first; if that is not a
//! valid calendar date they are read day-first instead.
//!
//! Only the first match is considered. An unparseable date is a normal
//! outcome and yields `None`.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

static PASSED_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bpassed\s+(\d{1,2})/(\d{1,2})/(\d{4})\b").expect("passage date pattern")
});

/// Which interpretation of the numeric date was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrder {
    MonthFirst,
    DayFirst,
}

/// A passage date together with how it was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassageDate {
    pub date: NaiveDate,
    pub order: DateOrder,
    /// The day-first reading was also a valid, different date.
    pub ambiguous: bool,
}

/// Extract the passage date from free text, if any.
pub fn extract_passage_date(text: &str) -> Option<NaiveDate> {
    read_passage_date(text).map(|p| p.date)
}

/// Like [`extract_passage_date`], but reports the reading that was used.
pub fn read_passage_date(text: &str) -> Option<PassageDate> {
    let caps = PASSED_DATE.captures(text)?;
    let first: u32 = caps[1].parse().ok()?;
    let second: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;

    let month_first = NaiveDate::from_ymd_opt(year, first, second);
    let day_first = NaiveDate::from_ymd_opt(year, second, first);

    match (month_first, day_first) {
        (Some(date), alt) => Some(PassageDate {
            date,
            order: DateOrder::MonthFirst,
            ambiguous: alt.is_some_and(|d| d != date),
        }),
        (None, Some(date)) => Some(PassageDate {
            date,
            order: DateOrder::DayFirst,
            ambiguous: false,
        }),
        (None, None) => None,
    }
}
