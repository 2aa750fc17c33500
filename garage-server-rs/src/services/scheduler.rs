use crate::backup::{self, StoredBackup};
use crate::state::AppState;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

/// Writes a stored backup on a cron schedule, pruning old archives the same
/// way an on-demand backup does.
pub struct BackupScheduler {
    scheduler: Mutex<JobScheduler>,
    state: Arc<AppState>,
}

impl BackupScheduler {
    pub async fn new(state: Arc<AppState>) -> anyhow::Result<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            state,
        })
    }

    pub async fn schedule(&self, cron_expression: &str) -> anyhow::Result<()> {
        let state = self.state.clone();

        let job = Job::new_async(cron_expression, move |_uuid, _lock| {
            let state = state.clone();
            Box::pin(async move {
                tracing::info!("Starting scheduled backup");
                match run_scheduled_backup(state).await {
                    Ok(stored) => tracing::info!(
                        archive = %stored.name,
                        removed = stored.removed.len(),
                        "Scheduled backup completed"
                    ),
                    Err(e) => tracing::error!(error = %e, "Scheduled backup failed"),
                }
            })
        })?;

        self.scheduler.lock().await.add(job).await?;
        tracing::info!(cron = %cron_expression, "Backup scheduled");
        Ok(())
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        self.scheduler.lock().await.start().await?;
        Ok(())
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.scheduler.lock().await.shutdown().await?;
        Ok(())
    }
}

/// One stored backup, serialized against on-demand backups and restores.
pub async fn run_scheduled_backup(state: Arc<AppState>) -> anyhow::Result<StoredBackup> {
    let _job = state.job_lock.lock().await;
    let store = state.store.clone();
    let dir = state.config.backups_dir.clone();
    let keep = state.config.max_backups;
    let stored = tokio::task::spawn_blocking(move || {
        backup::create_stored_backup(store.as_ref(), &dir, keep)
    })
    .await??;
    Ok(stored)
}
