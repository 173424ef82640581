use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use super::{error::CrawlerError, service::run_once, CrawlSummary};
use crate::config::CrawlerConfig;

/// Serializes crawl runs. A run that finds the lock taken is skipped, not queued.
#[derive(Clone, Default)]
pub struct CrawlGuard(Arc<Mutex<()>>);

impl CrawlGuard {
    pub async fn run(&self, db: &PgPool, cfg: &CrawlerConfig) -> Result<CrawlSummary, CrawlerError> {
        let Ok(_held) = self.0.try_lock() else {
            return Err(CrawlerError::AlreadyRunning);
        };
        run_once(db, cfg).await
    }
}

/// Registers the daily crawl. Returns `None` when crawling is disabled.
pub async fn start_scheduler(
    db: PgPool,
    cfg: CrawlerConfig,
    guard: CrawlGuard,
) -> anyhow::Result<Option<JobScheduler>> {
    if !cfg.enabled {
        info!("crawler disabled");
        return Ok(None);
    }

    let scheduler = JobScheduler::new().await?;
    let cron = cfg.cron.clone();
    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let db = db.clone();
        let cfg = cfg.clone();
        let guard = guard.clone();
        Box::pin(async move {
            info!("scheduled crawl starting");
            match guard.run(&db, &cfg).await {
                Ok(summary) => info!(?summary, "scheduled crawl done"),
                Err(CrawlerError::AlreadyRunning) => info!("previous crawl still running, skipped"),
                Err(e) => error!("scheduled crawl failed: {e}"),
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;
    info!(%cron, "crawl scheduler started");
    Ok(Some(scheduler))
}
