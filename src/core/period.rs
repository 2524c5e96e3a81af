//! Benefit period calculation.
//!
//! Maps a benefit's recurrence schedule and a card's anchor (open) date to the
//! accounting period that contains a given day, the day that period ends, and
//! how many periods fit in a year. Everything here is a pure function of its
//! arguments.

use crate::errors::{Error, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Stored key of the single lifetime period of a one-time benefit.
pub const ONE_TIME_KEY: &str = "one-time";

/// Recurrence rule governing how often a benefit's value resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    /// Resets every January 1st
    CalendarYear,
    /// Resets on every anniversary of the card open date
    CardYear,
    /// Resets on the first of every month
    Monthly,
    /// Resets on the first day of January, April, July and October
    Quarterly,
    /// Resets on January 1st and July 1st
    Biannual,
    /// Never resets
    OneTime,
}

impl Schedule {
    /// Every schedule, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::CalendarYear,
        Self::CardYear,
        Self::Monthly,
        Self::Quarterly,
        Self::Biannual,
        Self::OneTime,
    ];

    /// Name used in storage and configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CalendarYear => "calendar_year",
            Self::CardYear => "card_year",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Biannual => "biannual",
            Self::OneTime => "one_time",
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Schedule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|schedule| schedule.as_str() == s)
            .ok_or_else(|| Error::InconsistentSchedule {
                message: format!("unknown schedule {s:?}"),
            })
    }
}

/// One accounting period of a schedule.
///
/// `Year` carries the calendar year for calendar-year benefits and the number
/// of completed anniversaries for card-year benefits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PeriodKey {
    /// A calendar year, or a card-year anniversary index
    Year(i32),
    /// One month of a monthly schedule
    YearMonth {
        /// Calendar year
        year: i32,
        /// Month, 1-12
        month: u32,
    },
    /// One quarter of a quarterly schedule
    YearQuarter {
        /// Calendar year
        year: i32,
        /// Quarter, 1-4
        quarter: u32,
    },
    /// One half of a biannual schedule
    YearHalf {
        /// Calendar year
        year: i32,
        /// Half, 1 for January-June and 2 for July-December
        half: u32,
    },
    /// The single lifetime period of a one-time benefit
    OneTime,
}

impl PeriodKey {
    /// Canonical text form, unique per period within one schedule.
    #[must_use]
    pub fn storage_key(&self) -> String {
        match *self {
            Self::Year(year) => year.to_string(),
            Self::YearMonth { year, month } => format!("{year}-{month:02}"),
            Self::YearQuarter { year, quarter } => format!("{year}-Q{quarter}"),
            Self::YearHalf { year, half } => format!("{year}-H{half}"),
            Self::OneTime => ONE_TIME_KEY.to_string(),
        }
    }

    /// Splits the key into the `(year, month, quarter, half)` storage columns.
    /// One-time periods are stored with year 0.
    #[must_use]
    // month, quarter and half are at most 12, so the casts are lossless
    #[allow(clippy::cast_possible_wrap)]
    pub fn columns(&self) -> (i32, Option<i32>, Option<i32>, Option<i32>) {
        match *self {
            Self::Year(year) => (year, None, None, None),
            Self::YearMonth { year, month } => (year, Some(month as i32), None, None),
            Self::YearQuarter { year, quarter } => (year, None, Some(quarter as i32), None),
            Self::YearHalf { year, half } => (year, None, None, Some(half as i32)),
            Self::OneTime => (0, None, None, None),
        }
    }

    /// Rebuilds a key from its storage columns.
    ///
    /// Fails with [`Error::InconsistentSchedule`] when more than one of month,
    /// quarter and half is set, a component is out of range, or the stored
    /// text disagrees with the columns.
    pub fn from_columns(
        key: &str,
        year: i32,
        month: Option<i32>,
        quarter: Option<i32>,
        half: Option<i32>,
    ) -> Result<Self> {
        let bad = || inconsistent(key, year, month, quarter, half);
        let period = if key == ONE_TIME_KEY {
            if month.is_some() || quarter.is_some() || half.is_some() {
                return Err(bad());
            }
            Self::OneTime
        } else {
            match (month, quarter, half) {
                (None, None, None) => Self::Year(year),
                (Some(m), None, None) => Self::YearMonth {
                    year,
                    month: component(m, 12).ok_or_else(bad)?,
                },
                (None, Some(q), None) => Self::YearQuarter {
                    year,
                    quarter: component(q, 4).ok_or_else(bad)?,
                },
                (None, None, Some(h)) => Self::YearHalf {
                    year,
                    half: component(h, 2).ok_or_else(bad)?,
                },
                _ => return Err(bad()),
            }
        };

        if period.storage_key() != key {
            return Err(bad());
        }
        Ok(period)
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

fn component(value: i32, max: u32) -> Option<u32> {
    u32::try_from(value).ok().filter(|v| (1..=max).contains(v))
}

fn inconsistent(
    key: &str,
    year: i32,
    month: Option<i32>,
    quarter: Option<i32>,
    half: Option<i32>,
) -> Error {
    Error::InconsistentSchedule {
        message: format!(
            "stored period {key:?} has year={year} month={month:?} quarter={quarter:?} half={half:?}"
        ),
    }
}

fn quarter_of(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

fn half_of(date: NaiveDate) -> u32 {
    if date.month() <= 6 { 1 } else { 2 }
}

/// Number of full anniversary years elapsed between `anchor` and `today`.
/// Negative when the anchor lies in the future.
#[must_use]
pub fn card_year_index(anchor: NaiveDate, today: NaiveDate) -> i32 {
    let elapsed = today.year() - anchor.year();
    if (today.month(), today.day()) < (anchor.month(), anchor.day()) {
        elapsed - 1
    } else {
        elapsed
    }
}

/// The anchor's month and day in `year`. A Feb 29 anchor falls on Mar 1 in
/// non-leap years, the first day whose (month, day) is not before Feb 29.
fn anniversary_in(anchor: NaiveDate, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, anchor.month(), anchor.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))
}

/// The period of `schedule` that contains `today`.
#[must_use]
pub fn current_period(schedule: Schedule, anchor: NaiveDate, today: NaiveDate) -> PeriodKey {
    match schedule {
        Schedule::CalendarYear => PeriodKey::Year(today.year()),
        Schedule::CardYear => PeriodKey::Year(card_year_index(anchor, today)),
        Schedule::Monthly => PeriodKey::YearMonth {
            year: today.year(),
            month: today.month(),
        },
        Schedule::Quarterly => PeriodKey::YearQuarter {
            year: today.year(),
            quarter: quarter_of(today),
        },
        Schedule::Biannual => PeriodKey::YearHalf {
            year: today.year(),
            half: half_of(today),
        },
        Schedule::OneTime => PeriodKey::OneTime,
    }
}

/// The first day of the next period, or `None` for one-time benefits.
/// Always strictly after `today`.
#[must_use]
pub fn reset_date(schedule: Schedule, anchor: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
    let year = today.year();
    match schedule {
        Schedule::CalendarYear => NaiveDate::from_ymd_opt(year + 1, 1, 1),
        Schedule::CardYear => anniversary_in(anchor, year)
            .filter(|anniversary| *anniversary > today)
            .or_else(|| anniversary_in(anchor, year + 1)),
        Schedule::Monthly => {
            if today.month() == 12 {
                NaiveDate::from_ymd_opt(year + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(year, today.month() + 1, 1)
            }
        }
        Schedule::Quarterly => match quarter_of(today) {
            4 => NaiveDate::from_ymd_opt(year + 1, 1, 1),
            quarter => NaiveDate::from_ymd_opt(year, quarter * 3 + 1, 1),
        },
        Schedule::Biannual => match half_of(today) {
            1 => NaiveDate::from_ymd_opt(year, 7, 1),
            _ => NaiveDate::from_ymd_opt(year + 1, 1, 1),
        },
        Schedule::OneTime => None,
    }
}

/// How many periods of `schedule` make up one year of value.
#[must_use]
pub const fn periods_per_year(schedule: Schedule) -> u32 {
    match schedule {
        Schedule::Monthly => 12,
        Schedule::Quarterly => 4,
        Schedule::Biannual => 2,
        Schedule::CalendarYear | Schedule::CardYear | Schedule::OneTime => 1,
    }
}

/// Calendar year a stored period is attributed to in yearly summaries.
///
/// Calendar-anchored keys use their own year. A card-year period counts
/// towards the calendar year in which it began, and the single one-time
/// period towards the year it was redeemed.
#[must_use]
pub fn attributed_year(
    schedule: Schedule,
    period: PeriodKey,
    anchor: NaiveDate,
    redeemed_on: NaiveDate,
) -> i32 {
    match period {
        PeriodKey::Year(index) if schedule == Schedule::CardYear => anchor.year() + index,
        PeriodKey::Year(year)
        | PeriodKey::YearMonth { year, .. }
        | PeriodKey::YearQuarter { year, .. }
        | PeriodKey::YearHalf { year, .. } => year,
        PeriodKey::OneTime => redeemed_on.year(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_monthly_period_and_reset() {
        let anchor = date(2020, 1, 15);
        let today = date(2024, 3, 15);

        assert_eq!(
            current_period(Schedule::Monthly, anchor, today),
            PeriodKey::YearMonth {
                year: 2024,
                month: 3
            }
        );
        assert_eq!(
            reset_date(Schedule::Monthly, anchor, today),
            Some(date(2024, 4, 1))
        );
        assert_eq!(
            reset_date(Schedule::Monthly, anchor, date(2024, 12, 31)),
            Some(date(2025, 1, 1))
        );
    }

    #[test]
    fn test_card_year_anniversary_boundary() {
        let anchor = date(2023, 6, 10);

        let before = date(2024, 6, 9);
        assert_eq!(current_period(Schedule::CardYear, anchor, before), PeriodKey::Year(0));
        assert_eq!(
            reset_date(Schedule::CardYear, anchor, before),
            Some(date(2024, 6, 10))
        );

        let on = date(2024, 6, 10);
        assert_eq!(current_period(Schedule::CardYear, anchor, on), PeriodKey::Year(1));
        assert_eq!(
            reset_date(Schedule::CardYear, anchor, on),
            Some(date(2025, 6, 10))
        );
    }

    #[test]
    fn test_card_year_index_is_monotonic() {
        let anchor = date(2021, 2, 14);
        let mut day = date(2021, 1, 1);
        let mut previous = card_year_index(anchor, day);

        while day < date(2026, 1, 1) {
            day = day.succ_opt().unwrap();
            let index = card_year_index(anchor, day);
            assert!(index >= previous);
            if index != previous {
                assert_eq!(index, previous + 1);
                assert_eq!((day.month(), day.day()), (2, 14));
            }
            previous = index;
        }
    }

    #[test]
    fn test_leap_day_anchor_resets_on_march_first() {
        let anchor = date(2020, 2, 29);

        assert_eq!(
            reset_date(Schedule::CardYear, anchor, date(2023, 2, 28)),
            Some(date(2023, 3, 1))
        );
        assert_eq!(card_year_index(anchor, date(2023, 2, 28)), 2);
        assert_eq!(card_year_index(anchor, date(2023, 3, 1)), 3);
        assert_eq!(
            reset_date(Schedule::CardYear, anchor, date(2023, 3, 1)),
            Some(date(2024, 2, 29))
        );
    }

    #[test]
    fn test_quarterly_and_biannual() {
        let anchor = date(2020, 1, 1);

        assert_eq!(
            current_period(Schedule::Quarterly, anchor, date(2024, 5, 20)),
            PeriodKey::YearQuarter {
                year: 2024,
                quarter: 2
            }
        );
        assert_eq!(
            reset_date(Schedule::Quarterly, anchor, date(2024, 5, 20)),
            Some(date(2024, 7, 1))
        );
        assert_eq!(
            reset_date(Schedule::Quarterly, anchor, date(2024, 11, 2)),
            Some(date(2025, 1, 1))
        );

        assert_eq!(
            current_period(Schedule::Biannual, anchor, date(2024, 6, 30)),
            PeriodKey::YearHalf { year: 2024, half: 1 }
        );
        assert_eq!(
            reset_date(Schedule::Biannual, anchor, date(2024, 6, 30)),
            Some(date(2024, 7, 1))
        );
        assert_eq!(
            reset_date(Schedule::Biannual, anchor, date(2024, 7, 1)),
            Some(date(2025, 1, 1))
        );
    }

    #[test]
    fn test_one_time_never_resets() {
        let anchor = date(2020, 1, 1);
        assert_eq!(
            current_period(Schedule::OneTime, anchor, date(2021, 4, 4)),
            current_period(Schedule::OneTime, anchor, date(2030, 9, 9))
        );
        assert_eq!(reset_date(Schedule::OneTime, anchor, date(2021, 4, 4)), None);
    }

    #[test]
    fn test_reset_date_is_strictly_after_today() {
        let anchors = [date(2019, 1, 1), date(2020, 2, 29), date(2022, 12, 31)];
        let mut day = date(2023, 1, 1);

        while day < date(2025, 1, 1) {
            for anchor in anchors {
                for schedule in Schedule::ALL {
                    match reset_date(schedule, anchor, day) {
                        Some(reset) => assert!(reset > day, "{schedule} {anchor} {day}"),
                        None => assert_eq!(schedule, Schedule::OneTime),
                    }
                }
            }
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_periods_per_year() {
        assert_eq!(periods_per_year(Schedule::Monthly), 12);
        assert_eq!(periods_per_year(Schedule::Quarterly), 4);
        assert_eq!(periods_per_year(Schedule::Biannual), 2);
        assert_eq!(periods_per_year(Schedule::CalendarYear), 1);
        assert_eq!(periods_per_year(Schedule::CardYear), 1);
        assert_eq!(periods_per_year(Schedule::OneTime), 1);
    }

    #[test]
    fn test_schedule_parsing() {
        for schedule in Schedule::ALL {
            assert_eq!(schedule.as_str().parse::<Schedule>().unwrap(), schedule);
        }
        assert!(matches!(
            "weekly".parse::<Schedule>(),
            Err(Error::InconsistentSchedule { .. })
        ));
    }

    #[test]
    fn test_period_key_storage_columns() {
        let keys = [
            PeriodKey::Year(2024),
            PeriodKey::Year(0),
            PeriodKey::YearMonth { year: 2024, month: 3 },
            PeriodKey::YearQuarter { year: 2024, quarter: 4 },
            PeriodKey::YearHalf { year: 2024, half: 2 },
            PeriodKey::OneTime,
        ];
        for key in keys {
            let (year, month, quarter, half) = key.columns();
            let rebuilt =
                PeriodKey::from_columns(&key.storage_key(), year, month, quarter, half).unwrap();
            assert_eq!(rebuilt, key);
        }
    }

    #[test]
    fn test_period_key_rejects_ambiguous_columns() {
        assert!(matches!(
            PeriodKey::from_columns("2024-03", 2024, Some(3), Some(1), None),
            Err(Error::InconsistentSchedule { .. })
        ));
        assert!(matches!(
            PeriodKey::from_columns("2024-13", 2024, Some(13), None, None),
            Err(Error::InconsistentSchedule { .. })
        ));
        assert!(matches!(
            PeriodKey::from_columns("2024-03", 2024, None, None, None),
            Err(Error::InconsistentSchedule { .. })
        ));
        assert!(matches!(
            PeriodKey::from_columns(ONE_TIME_KEY, 0, None, None, Some(1)),
            Err(Error::InconsistentSchedule { .. })
        ));
    }

    #[test]
    fn test_attributed_year() {
        let anchor = date(2022, 9, 1);
        let redeemed_on = date(2025, 2, 2);

        assert_eq!(
            attributed_year(Schedule::CardYear, PeriodKey::Year(2), anchor, redeemed_on),
            2024
        );
        assert_eq!(
            attributed_year(Schedule::CalendarYear, PeriodKey::Year(2023), anchor, redeemed_on),
            2023
        );
        assert_eq!(
            attributed_year(
                Schedule::Monthly,
                PeriodKey::YearMonth { year: 2024, month: 12 },
                anchor,
                redeemed_on
            ),
            2024
        );
        assert_eq!(
            attributed_year(Schedule::OneTime, PeriodKey::OneTime, anchor, redeemed_on),
            2025
        );
    }
}
