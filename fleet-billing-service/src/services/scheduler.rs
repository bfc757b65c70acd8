//! Daily trigger for the billing cycle.

use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use service_core::error::AppError;

use crate::models::BillingTrigger;
use crate::services::engine::BillingEngine;
use crate::services::store::BillingStore;

/// Reported scheduler state.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub schedule: String,
    pub timezone: String,
}

/// Owns the recurring daily trigger. An explicit service object with
/// `start`/`stop`/`status`, held by the application lifecycle rather than a
/// process-wide timer handle.
pub struct BillingScheduler<S: BillingStore + 'static> {
    engine: Arc<BillingEngine<S>>,
    schedule: String,
    timezone: Tz,
    inner: Mutex<Option<JobScheduler>>,
}

impl<S: BillingStore + 'static> BillingScheduler<S> {
    /// `billing_hour` is the local wall-clock hour (0-23) in `timezone` at
    /// which the cycle fires each day.
    pub fn new(engine: Arc<BillingEngine<S>>, billing_hour: u32, timezone: Tz) -> Self {
        Self {
            engine,
            schedule: format!("0 0 {} * * *", billing_hour),
            timezone,
            inner: Mutex::new(None),
        }
    }

    /// Register and start the daily job. Calling `start` on a running
    /// scheduler is a no-op.
    ///
    /// A failing run is logged and never deregisters the job; the next
    /// day's firing still occurs.
    pub async fn start(&self) -> Result<(), AppError> {
        let mut guard = self.inner.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let scheduler = JobScheduler::new().await.map_err(|e| {
            AppError::SchedulerError(anyhow::anyhow!("Failed to create scheduler: {}", e))
        })?;

        let engine = Arc::clone(&self.engine);
        let job = Job::new_async_tz(self.schedule.as_str(), self.timezone, move |_uuid, _lock| {
            let engine = Arc::clone(&engine);
            Box::pin(async move {
                match engine
                    .run_billing_cycle(BillingTrigger::Scheduled, None)
                    .await
                {
                    Ok(report) => info!(
                        processed = report.processed,
                        skipped = report.skipped,
                        failed = report.failed,
                        "Scheduled billing cycle finished"
                    ),
                    Err(e) => error!(error = %e, "Scheduled billing cycle failed"),
                }
            })
        })
        .map_err(|e| {
            AppError::SchedulerError(anyhow::anyhow!("Failed to create billing job: {}", e))
        })?;

        scheduler.add(job).await.map_err(|e| {
            AppError::SchedulerError(anyhow::anyhow!("Failed to add billing job: {}", e))
        })?;

        scheduler.start().await.map_err(|e| {
            AppError::SchedulerError(anyhow::anyhow!("Failed to start scheduler: {}", e))
        })?;

        info!(
            schedule = %self.schedule,
            timezone = %self.timezone,
            "Billing scheduler started"
        );

        *guard = Some(scheduler);
        Ok(())
    }

    /// Shut down the recurring trigger. Safe to call when not running.
    pub async fn stop(&self) -> Result<(), AppError> {
        let mut guard = self.inner.lock().await;
        if let Some(mut scheduler) = guard.take() {
            scheduler.shutdown().await.map_err(|e| {
                AppError::SchedulerError(anyhow::anyhow!("Failed to shut down scheduler: {}", e))
            })?;
            info!("Billing scheduler stopped");
        }
        Ok(())
    }

    pub async fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: self.inner.lock().await.is_some(),
            schedule: self.schedule.clone(),
            timezone: self.timezone.to_string(),
        }
    }
}
