use chrono::{DateTime, Datelike, Days, NaiveDate, TimeDelta, Utc};
use serde::Serialize;

use crate::structs::Period;

/// Half-open interval `[min, max)` of instants selected by a period and shift.
///
/// `min` is `None` for [`Period::All`], meaning no lower bound.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub period: Period,
    pub shift: i32,
    pub min: Option<DateTime<Utc>>,
    pub max: DateTime<Utc>,
}

impl Window {
    /// Window for `period` moved `shift` whole periods away from `now`.
    /// `shift` is ignored for [`Period::All`].
    pub fn resolve(period: Period, shift: i32, now: DateTime<Utc>) -> Self {
        let n = i64::from(shift);
        let (min, max) = match period {
            Period::All => (None, now),
            Period::Day => (Some(add_days(now, n - 1)), add_days(now, n)),
            Period::Week => (Some(add_days(now, (n - 1) * 7)), add_days(now, n * 7)),
            Period::Month => (Some(add_months(now, n - 1)), add_months(now, n)),
            Period::Year => (Some(add_months(now, (n - 1) * 12)), add_months(now, n * 12)),
        };
        Self {
            period,
            shift: if period == Period::All { 0 } else { shift },
            min,
            max,
        }
    }

    pub fn contains(&self, time: &DateTime<Utc>) -> bool {
        self.min.map_or(true, |min| *time >= min) && *time < self.max
    }

    /// Index of the first date `>= min` and of the last date `< max`.
    ///
    /// Both indices are inclusive. `None` when either bound matches nothing or
    /// when the window falls strictly between two neighbouring dates.
    pub fn find_range(&self, dates: &[DateTime<Utc>]) -> Option<(usize, usize)> {
        let first = match self.min {
            Some(min) => dates.partition_point(|d| *d < min),
            None => 0,
        };
        let end = dates.partition_point(|d| *d < self.max);
        if first >= dates.len() || end == 0 {
            return None;
        }
        let last = end - 1;
        (first <= last).then_some((first, last))
    }

    /// The dates inside the window, empty when [`Window::find_range`] finds nothing.
    pub fn slice<'a>(&self, dates: &'a [DateTime<Utc>]) -> &'a [DateTime<Utc>] {
        match self.find_range(dates) {
            Some((first, last)) => &dates[first..=last],
            None => &[],
        }
    }

    pub fn navigation(&self) -> Navigation {
        Navigation::from_shift(self.shift)
    }
}

/// Shift targets for the "older" and "newer" links.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Navigation {
    pub older: i32,
    pub newer: i32,
}

impl Navigation {
    /// Newer never points past the current window; once the shift is
    /// positive older snaps back to it as well.
    pub fn from_shift(shift: i32) -> Self {
        let mut older = shift.saturating_sub(1);
        let mut newer = shift.saturating_add(1);
        if shift >= 0 {
            newer = 0;
        }
        if shift > 0 {
            older = 0;
        }
        Self { older, newer }
    }
}

fn add_days(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    TimeDelta::try_days(days)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or_else(|| saturated(days))
}

/// Calendar month arithmetic. A day past the end of the target month rolls
/// forward into the next one (Mar 31 - 1 month = Mar 2 in a leap year).
fn add_months(now: DateTime<Utc>, months: i64) -> DateTime<Utc> {
    let total = i64::from(now.year()) * 12 + i64::from(now.month0()) + months;
    i32::try_from(total.div_euclid(12))
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, total.rem_euclid(12) as u32 + 1, 1))
        .and_then(|first| first.checked_add_days(Days::new(u64::from(now.day0()))))
        .map(|date| date.and_time(now.time()).and_utc())
        .unwrap_or_else(|| saturated(months))
}

fn saturated(direction: i64) -> DateTime<Utc> {
    if direction < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    }
}

#[cfg(test)]
fn at(m: u32, d: u32, h: u32) -> DateTime<Utc> {
    use chrono::TimeZone;
    Utc.with_ymd_and_hms(2024, m, d, h, 0, 0).unwrap()
}

#[test]
pub fn test_day_window_bounds() {
    let now = at(3, 10, 12);
    let w = Window::resolve(Period::Day, 0, now);
    assert_eq!(w.min, Some(at(3, 9, 12)));
    assert_eq!(w.max, now);
    let w = Window::resolve(Period::Day, -2, now);
    assert_eq!(w.min, Some(at(3, 7, 12)));
    assert_eq!(w.max, at(3, 8, 12));
}

#[test]
pub fn test_week_window_bounds() {
    let now = at(3, 20, 0);
    let w = Window::resolve(Period::Week, -1, now);
    assert_eq!(w.min, Some(at(3, 6, 0)));
    assert_eq!(w.max, at(3, 13, 0));
}

#[test]
pub fn test_month_and_year_use_calendar_units() {
    let now = at(3, 31, 8);
    let w = Window::resolve(Period::Month, 0, now);
    assert_eq!(w.min, Some(at(3, 2, 8)));
    assert_eq!(w.max, now);

    let w = Window::resolve(Period::Year, -1, now);
    use chrono::TimeZone;
    assert_eq!(w.min, Some(Utc.with_ymd_and_hms(2022, 3, 31, 8, 0, 0).unwrap()));
    assert_eq!(w.max, Utc.with_ymd_and_hms(2023, 3, 31, 8, 0, 0).unwrap());
}

#[test]
pub fn test_month_end_rolls_into_next_month() {
    use chrono::TimeZone;
    let w = Window::resolve(Period::Year, 0, at(2, 29, 8));
    assert_eq!(w.min, Some(Utc.with_ymd_and_hms(2023, 3, 1, 8, 0, 0).unwrap()));

    let w = Window::resolve(Period::Month, -1, at(5, 31, 23));
    assert_eq!(w.min, Some(at(3, 31, 23)));
    assert_eq!(w.max, at(5, 1, 23));

    let w = Window::resolve(Period::Month, 1, at(1, 30, 0));
    assert_eq!(w.min, Some(at(1, 30, 0)));
    assert_eq!(w.max, at(3, 1, 0));
}

#[test]
pub fn test_all_window_ignores_shift() {
    let now = at(5, 1, 0);
    let w = Window::resolve(Period::All, -7, now);
    assert_eq!(w.min, None);
    assert_eq!(w.max, now);
    assert_eq!(w.shift, 0);
}

#[test]
pub fn test_extreme_shift_saturates() {
    let now = at(5, 1, 0);
    let w = Window::resolve(Period::Year, i32::MIN, now);
    assert_eq!(w.min, Some(DateTime::<Utc>::MIN_UTC));
    let w = Window::resolve(Period::Day, i32::MAX, now);
    assert_eq!(w.max, DateTime::<Utc>::MAX_UTC);
}

#[test]
pub fn test_day_window_landing_in_gap_is_empty() {
    let dates = [at(1, 1, 0), at(1, 2, 0), at(1, 3, 0), at(1, 5, 0)];
    let w = Window::resolve(Period::Day, 0, at(1, 5, 0));
    assert_eq!(w.min, Some(at(1, 4, 0)));
    assert_eq!(w.find_range(&dates), None);
    assert!(w.slice(&dates).is_empty());
}

#[test]
pub fn test_day_window_single_point() {
    let dates = [at(1, 1, 0), at(1, 2, 0), at(1, 3, 0), at(1, 5, 0)];
    let w = Window::resolve(Period::Day, 0, at(1, 6, 0));
    assert_eq!(w.find_range(&dates), Some((3, 3)));
    assert_eq!(w.slice(&dates), &[at(1, 5, 0)]);
}

#[test]
pub fn test_window_before_or_after_data_is_empty() {
    let dates = [at(2, 1, 0), at(2, 2, 0)];
    assert_eq!(Window::resolve(Period::Day, 0, at(1, 10, 0)).find_range(&dates), None);
    assert_eq!(Window::resolve(Period::Day, 0, at(4, 10, 0)).find_range(&dates), None);
    assert_eq!(Window::resolve(Period::All, 0, at(1, 10, 0)).find_range(&[]), None);
}

#[test]
pub fn test_find_range_matches_linear_scan() {
    let dates: Vec<_> = [1, 2, 4, 7, 8, 9, 15, 20, 28].iter().map(|&d| at(1, d, 0)).collect();
    let bounds: Vec<_> = (1..=29).map(|d| at(1, d, 0)).chain([at(1, 8, 6)]).collect();
    for &min in &bounds {
        for &max in &bounds {
            let w = Window { period: Period::Day, shift: 0, min: Some(min), max };
            let first = dates.iter().position(|d| *d >= min);
            let last = dates.iter().rposition(|d| *d < max);
            let expected = match (first, last) {
                (Some(f), Some(l)) if f <= l => Some((f, l)),
                _ => None,
            };
            assert_eq!(w.find_range(&dates), expected, "min={min} max={max}");
            for d in w.slice(&dates) {
                assert!(w.contains(d));
            }
        }
    }
}

#[test]
pub fn test_navigation_clamps_at_present() {
    assert_eq!(Navigation::from_shift(0), Navigation { older: -1, newer: 0 });
    assert_eq!(Navigation::from_shift(-3), Navigation { older: -4, newer: -2 });
    assert_eq!(Navigation::from_shift(-1), Navigation { older: -2, newer: 0 });
    assert_eq!(Navigation::from_shift(2), Navigation { older: 0, newer: 0 });
}
