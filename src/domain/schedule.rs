//! Rebalance date scheduling.
//!
//! Rebalances land on the last business day of each period (weekends
//! excluded; exchange holidays are the data layer's problem — a holiday
//! date simply finds the prior close through the price lag).

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::domain::error::ValuesimError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceFrequency {
    Monthly,
    Quarterly,
}

impl RebalanceFrequency {
    pub fn parse(value: &str) -> Result<Self, ValuesimError> {
        match value.trim().to_lowercase().as_str() {
            "monthly" => Ok(RebalanceFrequency::Monthly),
            "quarterly" => Ok(RebalanceFrequency::Quarterly),
            other => Err(ValuesimError::ConfigInvalid {
                section: "backtest".into(),
                key: "rebalance_frequency".into(),
                reason: format!("unknown frequency '{other}', expected monthly or quarterly"),
            }),
        }
    }

    pub fn periods_per_year(self) -> f64 {
        match self {
            RebalanceFrequency::Monthly => 12.0,
            RebalanceFrequency::Quarterly => 4.0,
        }
    }

    fn includes_month(self, month: u32) -> bool {
        match self {
            RebalanceFrequency::Monthly => true,
            RebalanceFrequency::Quarterly => matches!(month, 3 | 6 | 9 | 12),
        }
    }
}

/// Last weekday of the given month.
pub fn last_business_day(year: i32, month: u32) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let mut day = first_of_next.checked_sub_days(Days::new(1))?;
    while matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
        day = day.checked_sub_days(Days::new(1))?;
    }
    Some(day)
}

/// All scheduled rebalance dates in `[start, end]`, ascending.
pub fn rebalance_dates(
    start: NaiveDate,
    end: NaiveDate,
    frequency: RebalanceFrequency,
) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut year = start.year();
    let mut month = start.month();

    while NaiveDate::from_ymd_opt(year, month, 1).is_some_and(|first| first <= end) {
        if frequency.includes_month(month) {
            if let Some(date) = last_business_day(year, month) {
                if date >= start && date <= end {
                    dates.push(date);
                }
            }
        }
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    dates
}
