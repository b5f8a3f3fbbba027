// /consult-payments/services/payment-service/src/utils/scheduler.rs

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tokio_cron_scheduler::{JobScheduler, Job};
use crate::{
    core::resolver::FailureResolver,
    utils::error::{AppError, AppResult},
};

/// Jumlah booking maksimum yang ditutup per run
const SWEEP_BATCH_SIZE: i64 = 200;

// Scheduler metrics for monitoring
pub struct SchedulerMetrics {
    pub sweep_runs: AtomicU64,
    pub sweep_errors: AtomicU64,
    pub bookings_expired: AtomicU64,
    pub last_sweep: RwLock<Option<DateTime<Utc>>>,
}

impl SchedulerMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sweep_runs: AtomicU64::new(0),
            sweep_errors: AtomicU64::new(0),
            bookings_expired: AtomicU64::new(0),
            last_sweep: RwLock::new(None),
        })
    }

    pub async fn get_status(&self) -> serde_json::Value {
        let last_sweep = self.last_sweep.read().await;
        serde_json::json!({
            "sweep_runs": self.sweep_runs.load(Ordering::Relaxed),
            "sweep_errors": self.sweep_errors.load(Ordering::Relaxed),
            "bookings_expired": self.bookings_expired.load(Ordering::Relaxed),
            "last_sweep": *last_sweep,
        })
    }
}

/// Start background job penutup session pending yang kedaluwarsa (setiap 15 menit)
pub async fn start_background_jobs(
    resolver: Arc<FailureResolver>,
    pending_ttl_minutes: i64,
    metrics: Arc<SchedulerMetrics>,
) -> AppResult<JobScheduler> {
    let scheduler = JobScheduler::new().await
        .map_err(|e| AppError::Configuration(format!("Failed to create scheduler: {}", e)))?;

    let ttl = Duration::minutes(pending_ttl_minutes);
    let sweep_job = Job::new_async("0 */15 * * * *", move |_uuid, _l| {
        let resolver = resolver.clone();
        let metrics = metrics.clone();
        Box::pin(async move {
            if let Err(e) = run_stale_sweep(&resolver, ttl, &metrics).await {
                tracing::error!("Stale session sweep failed: {}", e);
            }
        })
    })
    .map_err(|e| AppError::Configuration(format!("Failed to create sweep job: {}", e)))?;

    scheduler.add(sweep_job).await
        .map_err(|e| AppError::Configuration(format!("Failed to add sweep job: {}", e)))?;

    scheduler.start().await
        .map_err(|e| AppError::Configuration(format!("Failed to start scheduler: {}", e)))?;

    tracing::info!("✅ Background jobs scheduler started (pending TTL {} minutes)", pending_ttl_minutes);

    Ok(scheduler)
}

/// Satu run sweep, dipisah dari job supaya bisa dites langsung
pub async fn run_stale_sweep(
    resolver: &FailureResolver,
    ttl: Duration,
    metrics: &SchedulerMetrics,
) -> AppResult<usize> {
    tracing::debug!("Starting stale session sweep");

    match resolver.expire_stale(ttl, SWEEP_BATCH_SIZE).await {
        Ok(closed) => {
            metrics.sweep_runs.fetch_add(1, Ordering::Relaxed);
            metrics.bookings_expired.fetch_add(closed as u64, Ordering::Relaxed);
            *metrics.last_sweep.write().await = Some(Utc::now());
            Ok(closed)
        }
        Err(e) => {
            metrics.sweep_errors.fetch_add(1, Ordering::Relaxed);
            Err(e)
        }
    }
}
