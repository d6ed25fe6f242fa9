use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Arc, PoisonError, RwLock},
};

use chrono::{DateTime, Utc};

/// Immutable view of every observation, keyed by asset then timestamp.
///
/// `dates` holds each timestamp that appears in any asset map exactly once,
/// ascending.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Snapshot {
    values: BTreeMap<String, HashMap<DateTime<Utc>, f64>>,
    dates: Vec<DateTime<Utc>>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A repeated (asset, time) pair keeps the last value seen.
    pub fn from_observations<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (DateTime<Utc>, S, f64)>,
        S: Into<String>,
    {
        let mut values: BTreeMap<String, HashMap<DateTime<Utc>, f64>> = BTreeMap::new();
        let mut date_set = BTreeSet::new();
        for (time, asset, value) in rows {
            values.entry(asset.into()).or_default().insert(time, value);
            date_set.insert(time);
        }
        Self {
            values,
            dates: date_set.into_iter().collect(),
        }
    }

    pub fn dates(&self) -> &[DateTime<Utc>] {
        &self.dates
    }

    pub fn assets(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn asset_count(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self, asset: &str) -> Option<&HashMap<DateTime<Utc>, f64>> {
        self.values.get(asset)
    }

    /// Per-asset maps in lexicographic asset order.
    pub fn series(&self) -> impl Iterator<Item = (&str, &HashMap<DateTime<Utc>, f64>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Shared holder of the currently published [`Snapshot`].
///
/// Readers clone the inner `Arc` and work on it without holding the lock;
/// the writer only takes the lock to swap the pointer.
#[derive(Clone, Default)]
pub struct TimeIndex {
    current: Arc<RwLock<Arc<Snapshot>>>,
}

impl TimeIndex {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    pub fn current(&self) -> Arc<Snapshot> {
        // a poisoned lock still guards a whole Arc, never a partial snapshot
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn replace(&self, snapshot: Snapshot) {
        let snapshot = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = snapshot;
    }
}

#[cfg(test)]
fn day(d: u32) -> DateTime<Utc> {
    use chrono::TimeZone;
    Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
}

#[test]
pub fn test_snapshot_dates_are_sorted_and_unique() {
    let snapshot = Snapshot::from_observations(vec![
        (day(3), "BTC", 0.07),
        (day(1), "BTC", 0.05),
        (day(2), "ETH", 0.10),
        (day(1), "ETH", 0.11),
    ]);
    assert_eq!(snapshot.dates(), &[day(1), day(2), day(3)]);
    assert_eq!(snapshot.assets().collect::<Vec<_>>(), vec!["BTC", "ETH"]);
    for (_, values) in snapshot.series() {
        for time in values.keys() {
            assert!(snapshot.dates().binary_search(time).is_ok());
        }
    }
}

#[test]
pub fn test_duplicate_observation_keeps_last_value() {
    let snapshot = Snapshot::from_observations(vec![
        (day(1), "BTC", 0.05),
        (day(1), "BTC", 0.06),
    ]);
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.values("BTC").unwrap().get(&day(1)), Some(&0.06));
}

#[test]
pub fn test_reader_keeps_its_snapshot_across_replace() {
    let index = TimeIndex::new(Snapshot::from_observations(vec![(day(1), "BTC", 0.05)]));
    let held = index.current();
    index.replace(Snapshot::from_observations(vec![
        (day(2), "ETH", 0.10),
        (day(3), "ETH", 0.12),
    ]));
    assert_eq!(held.dates(), &[day(1)]);
    assert!(held.values("ETH").is_none());
    let fresh = index.current();
    assert_eq!(fresh.len(), 2);
    assert!(fresh.values("BTC").is_none());
}

#[test]
pub fn test_concurrent_readers_never_see_torn_snapshot() {
    let index = TimeIndex::new(Snapshot::empty());
    let writer = {
        let index = index.clone();
        std::thread::spawn(move || {
            for n in 1..=200u32 {
                let rows = (0..n % 20 + 1).map(|i| (day(i % 28 + 1), format!("A{n}"), f64::from(i)));
                index.replace(Snapshot::from_observations(rows));
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let index = index.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    let snapshot = index.current();
                    let assets: Vec<_> = snapshot.assets().collect();
                    assert!(assets.len() <= 1);
                    let mut seen: Vec<_> = snapshot
                        .series()
                        .flat_map(|(_, values)| values.keys().copied())
                        .collect();
                    seen.sort();
                    seen.dedup();
                    assert_eq!(seen, snapshot.dates());
                }
            })
        })
        .collect();
    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}
