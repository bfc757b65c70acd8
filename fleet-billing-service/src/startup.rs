//! Application startup and lifecycle management.

use chrono_tz::Tz;
use service_core::error::AppError;
use std::sync::Arc;

use crate::config::BillingConfig;
use crate::services::{init_metrics, BillingEngine, BillingScheduler, Database};

/// Application container wiring configuration, database, engine, and
/// scheduler together and managing their lifecycle.
pub struct Application {
    config: BillingConfig,
    db: Arc<Database>,
    engine: Arc<BillingEngine<Database>>,
    scheduler: Arc<BillingScheduler<Database>>,
}

impl Application {
    /// Build the application with the given configuration, running any
    /// pending migrations.
    pub async fn build(config: BillingConfig) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            e
        })?;

        let db = Arc::new(db);

        let timezone: Tz = config.billing.timezone.parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Invalid billing timezone '{}': {}",
                config.billing.timezone,
                e
            ))
        })?;

        let engine = Arc::new(BillingEngine::new(
            Arc::clone(&db),
            timezone,
            config.billing.due_in_days,
            config.billing.default_vat_rate,
        ));

        let scheduler = Arc::new(BillingScheduler::new(
            Arc::clone(&engine),
            config.billing.billing_hour,
            timezone,
        ));

        Ok(Self {
            config,
            db,
            engine,
            scheduler,
        })
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// The billing engine, for the manual trigger and due-contract preview.
    pub fn engine(&self) -> Arc<BillingEngine<Database>> {
        Arc::clone(&self.engine)
    }

    /// The scheduler handle, for lifecycle hooks and status queries.
    pub fn scheduler(&self) -> Arc<BillingScheduler<Database>> {
        Arc::clone(&self.scheduler)
    }

    /// Start the scheduler and run until the surrounding task is cancelled.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.scheduler
            .start()
            .await
            .map_err(|e| std::io::Error::other(format!("Scheduler start error: {}", e)))?;

        let status = self.scheduler.status().await;
        tracing::info!(
            service = %self.config.service_name,
            version = env!("CARGO_PKG_VERSION"),
            schedule = %status.schedule,
            timezone = %status.timezone,
            "Service ready, billing scheduler running"
        );

        std::future::pending::<()>().await;
        Ok(())
    }
}
