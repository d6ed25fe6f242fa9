use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::structs::{from_unix, Observation, Snapshot};

/// Where the refresher reads the full observation set from.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    async fn load_snapshot(&self) -> Result<Snapshot>;
}

/// SQLite-backed APR table.
#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        Self::connect_with(database_url, options).await
    }

    /// Read-only connection; fails instead of creating a missing database file.
    pub async fn open_existing(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(false)
            .read_only(true);
        Self::connect_with(database_url, options).await
    }

    async fn connect_with(database_url: &str, options: SqliteConnectOptions) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;
        info!("connected to {}", database_url);
        Ok(Self { pool })
    }

    /// Private in-memory database; one connection so every query sees the same data.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS apr (
                time INTEGER NOT NULL,
                asset TEXT NOT NULL,
                apy REAL NOT NULL,
                bonus REAL NOT NULL,
                PRIMARY KEY (time, asset)
            ) WITHOUT ROWID
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upserts all rows inside one transaction; any failure rolls the batch back.
    #[instrument(skip(self, observations), fields(rows = observations.len()))]
    pub async fn insert_batch(&self, observations: &[Observation]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for (n, obs) in observations.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO apr (time, asset, apy, bonus) VALUES (?, ?, ?, ?)
                ON CONFLICT (time, asset) DO UPDATE SET apy = excluded.apy, bonus = excluded.bonus
                "#,
            )
            .bind(obs.time.timestamp())
            .bind(&obs.asset)
            .bind(obs.apy)
            .bind(obs.bonus)
            .execute(&mut *tx)
            .await?;
            if (n + 1) % 100 == 0 {
                debug!("{} rows written", n + 1);
            }
        }
        tx.commit().await?;
        Ok(observations.len())
    }

    /// The `limit` most recent rows, newest first.
    pub async fn latest(&self, limit: u32) -> Result<Vec<Observation>> {
        let rows = sqlx::query("SELECT time, asset, apy, bonus FROM apr ORDER BY time DESC, asset LIMIT ?")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> Result<Observation> {
                Ok(Observation::new(
                    from_unix(row.try_get("time")?)?,
                    row.try_get::<String, _>("asset")?,
                    row.try_get("apy")?,
                    row.try_get("bonus")?,
                ))
            })
            .collect()
    }

    #[instrument(skip(self))]
    pub async fn load_observations(&self) -> Result<Vec<(DateTime<Utc>, String, f64)>> {
        let rows = sqlx::query("SELECT time, asset, apy FROM apr")
            .fetch_all(&self.pool)
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push((
                from_unix(row.try_get("time")?)?,
                row.try_get::<String, _>("asset")?,
                row.try_get::<f64, _>("apy")?,
            ));
        }
        debug!("loaded {} rows", out.len());
        Ok(out)
    }
}

#[async_trait]
impl ObservationSource for Store {
    async fn load_snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot::from_observations(self.load_observations().await?))
    }
}

#[cfg(test)]
fn obs(secs: i64, asset: &str, apy: f64) -> Observation {
    Observation::new(from_unix(secs).unwrap(), asset, apy, 0.0)
}

#[tokio::test]
pub async fn test_insert_then_load_snapshot() {
    let store = Store::in_memory().await.unwrap();
    store.migrate().await.unwrap();
    store
        .insert_batch(&[obs(200, "USDT", 0.05), obs(100, "DAI", 0.03), obs(200, "DAI", 0.04)])
        .await
        .unwrap();
    let snapshot = store.load_snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.assets().collect::<Vec<_>>(), vec!["DAI", "USDT"]);
    assert_eq!(snapshot.values("DAI").unwrap().get(&from_unix(200).unwrap()), Some(&0.04));
}

#[tokio::test]
pub async fn test_reinserting_a_key_updates_it() {
    let store = Store::in_memory().await.unwrap();
    store.migrate().await.unwrap();
    store.insert_batch(&[obs(100, "BUSD", 0.01)]).await.unwrap();
    store.insert_batch(&[obs(100, "BUSD", 0.02)]).await.unwrap();
    let rows = store.latest(10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].apy, 0.02);
}

#[tokio::test]
pub async fn test_latest_is_newest_first_and_limited() {
    let store = Store::in_memory().await.unwrap();
    store.migrate().await.unwrap();
    store
        .insert_batch(&[obs(100, "DAI", 0.01), obs(300, "DAI", 0.03), obs(200, "DAI", 0.02)])
        .await
        .unwrap();
    let rows = store.latest(2).await.unwrap();
    assert_eq!(rows.iter().map(|o| o.time.timestamp()).collect::<Vec<_>>(), vec![300, 200]);
}

#[tokio::test]
pub async fn test_migrate_is_repeatable() {
    let store = Store::in_memory().await.unwrap();
    store.migrate().await.unwrap();
    store.migrate().await.unwrap();
    assert!(store.load_snapshot().await.unwrap().is_empty());
}

#[tokio::test]
pub async fn test_open_existing_does_not_create_a_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.sqlite");
    let url = format!("sqlite:{}", path.display());
    assert!(Store::open_existing(&url).await.is_err());
    assert!(!path.exists());

    let store = Store::connect(&url).await.unwrap();
    store.migrate().await.unwrap();
    store.insert_batch(&[obs(100, "USDT", 0.04)]).await.unwrap();
    let reader = Store::open_existing(&url).await.unwrap();
    assert_eq!(reader.latest(5).await.unwrap().len(), 1);
}
