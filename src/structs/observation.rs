use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{AprError, Result};

/// Text layout of the `Time` column in CSV exports, read as UTC.
pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One recorded APR sample for an asset.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Observation {
    #[serde(
        rename = "Time",
        alias = "time",
        serialize_with = "serialize_date_time",
        deserialize_with = "deserialize_date_time"
    )]
    pub time: DateTime<Utc>,
    #[serde(rename = "Asset", alias = "asset")]
    pub asset: String,
    #[serde(rename = "APY", alias = "apy")]
    pub apy: f64,
    #[serde(rename = "Bonus", alias = "bonus")]
    pub bonus: f64,
}

impl Observation {
    pub fn new(time: DateTime<Utc>, asset: impl Into<String>, apy: f64, bonus: f64) -> Self {
        Self {
            time,
            asset: asset.into(),
            apy,
            bonus,
        }
    }
}

pub fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    let dt = NaiveDateTime::parse_from_str(s.trim(), FORMAT).map_err(|source| AprError::Timestamp {
        value: s.to_string(),
        source,
    })?;
    Ok(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
}

pub fn format_time(time: &DateTime<Utc>) -> String {
    time.format(FORMAT).to_string()
}

/// Store-native representation is unix seconds.
pub fn from_unix(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or(AprError::TimestampRange(secs))
}

pub fn serialize_date_time<S>(time: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_time(time))
}

pub fn deserialize_date_time<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_time(&s).map_err(serde::de::Error::custom)
}

#[test]
pub fn test_time_round_trips_through_csv_layout() {
    let t = parse_time("2023-03-14 09:26:53").unwrap();
    assert_eq!(t.timestamp(), 1678786013);
    assert_eq!(format_time(&t), "2023-03-14 09:26:53");
}

#[test]
pub fn test_bad_time_is_reported_with_value() {
    let err = parse_time("14/03/2023").unwrap_err();
    assert!(err.to_string().contains("14/03/2023"));
}

#[test]
pub fn test_from_unix_rejects_out_of_range() {
    assert!(from_unix(i64::MAX).is_err());
    assert_eq!(from_unix(0).unwrap().timestamp(), 0);
}
