use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, instrument};

use crate::error::Result;
use crate::store::ObservationSource;
use crate::structs::TimeIndex;

/// Rebuilds the index from its source on a fixed interval.
#[derive(Clone)]
pub struct Refresher {
    source: Arc<dyn ObservationSource>,
    index: TimeIndex,
}

impl Refresher {
    pub fn new(source: Arc<dyn ObservationSource>, index: TimeIndex) -> Self {
        Self { source, index }
    }

    /// Reads the whole source and publishes the result. On error the
    /// previously published snapshot stays in place.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<()> {
        let snapshot = self.source.load_snapshot().await?;
        info!(
            "publishing snapshot with {} assets over {} dates",
            snapshot.asset_count(),
            snapshot.len()
        );
        self.index.replace(snapshot);
        Ok(())
    }

    async fn refresh_logged(&self) {
        if let Err(e) = self.refresh().await {
            error!("refresh failed, keeping previous snapshot: {}", e);
        }
    }

    /// Registers the repeated refresh job and starts the scheduler.
    pub async fn start(self, every: Duration) -> Result<JobScheduler> {
        let scheduler = JobScheduler::new().await?;
        let job = Job::new_repeated_async(every, move |_uuid, _l| {
            let refresher = self.clone();
            Box::pin(async move {
                refresher.refresh_logged().await;
            })
        })?;
        scheduler.add(job).await?;
        scheduler.start().await?;
        info!("refreshing every {:?}", every);
        Ok(scheduler)
    }
}

#[cfg(test)]
mod fixtures {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use crate::error::{AprError, Result};
    use crate::store::ObservationSource;
    use crate::structs::Snapshot;

    /// Fails on every odd call, otherwise returns one row per call made so far.
    #[derive(Default)]
    pub struct Flaky {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl ObservationSource for Flaky {
        async fn load_snapshot(&self) -> Result<Snapshot> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 1 {
                return Err(AprError::Io(std::io::Error::other("store unavailable")));
            }
            Ok(Snapshot::from_observations(
                (0..=n as u32).map(|d| (Utc.with_ymd_and_hms(2024, 1, d + 1, 0, 0, 0).unwrap(), "USDT", 0.05)),
            ))
        }
    }
}

#[tokio::test]
pub async fn test_failed_refresh_keeps_previous_snapshot() {
    let source = Arc::new(fixtures::Flaky::default());
    let index = TimeIndex::default();
    let refresher = Refresher::new(source.clone(), index.clone());

    refresher.refresh().await.unwrap();
    assert_eq!(index.current().len(), 1);

    assert!(refresher.refresh().await.is_err());
    assert_eq!(index.current().len(), 1);

    refresher.refresh().await.unwrap();
    assert_eq!(index.current().len(), 3);
}

#[tokio::test]
pub async fn test_scheduled_refresh_publishes() {
    let source = Arc::new(fixtures::Flaky::default());
    let index = TimeIndex::default();
    let mut scheduler = Refresher::new(source.clone(), index.clone())
        .start(Duration::from_secs(1))
        .await
        .unwrap();
    let mut published = false;
    for _ in 0..80 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if !index.current().is_empty() {
            published = true;
            break;
        }
    }
    scheduler.shutdown().await.unwrap();
    assert!(published);
}
