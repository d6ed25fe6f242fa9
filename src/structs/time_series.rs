use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::structs::{Period, Snapshot, Window};

/// Values of one asset aligned to a date axis; `None` marks a missing sample.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct AssetSeries {
    pub asset: String,
    pub points: Vec<Option<f64>>,
}

/// Everything a chart needs for one period/shift request.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct TimeSeries {
    window: Window,
    dates: Vec<DateTime<Utc>>,
    series: Vec<AssetSeries>,
}

impl TimeSeries {
    pub fn new(window: Window, dates: Vec<DateTime<Utc>>, series: Vec<AssetSeries>) -> Self {
        Self { window, dates, series }
    }

    /// Selects the window's dates from `snapshot` and projects every asset on them.
    pub fn from_snapshot(snapshot: &Snapshot, window: Window) -> Self {
        let dates = window.slice(snapshot.dates()).to_vec();
        let series = project(&dates, snapshot.series());
        Self::new(window, dates, series)
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn period(&self) -> Period {
        self.window.period
    }

    pub fn dates(&self) -> &[DateTime<Utc>] {
        &self.dates
    }

    pub fn series(&self) -> &[AssetSeries] {
        &self.series
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Emits one series per asset, in the order the assets are given.
pub fn project<'a, I>(dates: &[DateTime<Utc>], per_asset: I) -> Vec<AssetSeries>
where
    I: IntoIterator<Item = (&'a str, &'a HashMap<DateTime<Utc>, f64>)>,
{
    per_asset
        .into_iter()
        .map(|(asset, values)| AssetSeries {
            asset: asset.to_string(),
            points: dates.iter().map(|d| values.get(d).copied()).collect(),
        })
        .collect()
}

#[cfg(test)]
fn day(d: u32) -> DateTime<Utc> {
    use chrono::TimeZone;
    Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
}

#[test]
pub fn test_projection_marks_gaps() {
    let snapshot = Snapshot::from_observations(vec![
        (day(1), "BTC", 0.05),
        (day(3), "BTC", 0.07),
        (day(2), "ETH", 0.10),
    ]);
    let series = project(snapshot.dates(), snapshot.series());
    assert_eq!(
        series,
        vec![
            AssetSeries { asset: "BTC".into(), points: vec![Some(0.05), None, Some(0.07)] },
            AssetSeries { asset: "ETH".into(), points: vec![None, Some(0.10), None] },
        ]
    );
}

#[test]
pub fn test_projection_keeps_zero_distinct_from_gap() {
    let snapshot = Snapshot::from_observations(vec![(day(1), "DAI", 0.0), (day(2), "USDT", 0.04)]);
    let series = project(snapshot.dates(), snapshot.series());
    assert_eq!(series[0].points, vec![Some(0.0), None]);
    assert_eq!(series[1].points, vec![None, Some(0.04)]);
}

#[test]
pub fn test_projection_is_idempotent() {
    let snapshot = Snapshot::from_observations(vec![
        (day(1), "BTC", 0.05),
        (day(4), "ETH", 0.09),
        (day(6), "BTC", 0.02),
    ]);
    let first = project(snapshot.dates(), snapshot.series());
    let second = project(snapshot.dates(), snapshot.series());
    assert_eq!(first, second);
}

#[test]
pub fn test_time_series_follows_window() {
    let snapshot = Snapshot::from_observations(vec![
        (day(1), "BTC", 0.05),
        (day(2), "ETH", 0.10),
        (day(3), "BTC", 0.07),
        (day(5), "ETH", 0.12),
    ]);
    let ts = TimeSeries::from_snapshot(&snapshot, Window::resolve(Period::Day, 0, day(6)));
    assert_eq!(ts.dates(), &[day(5)]);
    assert_eq!(ts.series()[0].points, vec![None]);
    assert_eq!(ts.series()[1].points, vec![Some(0.12)]);

    let ts = TimeSeries::from_snapshot(&snapshot, Window::resolve(Period::Day, 0, day(5)));
    assert!(ts.is_empty());
    assert!(ts.series().iter().all(|s| s.points.is_empty()));
}
