//! Wall-clock cadence that fans distribution out over every active tenant.
//!
//! The trigger is an explicit object owned by the process entry point.
//! Starting it probes the store once; when that fails the scheduler stays
//! disabled for the rest of the process. Firings run one after another in
//! a single loop task, tenants within a firing run sequentially, and each
//! tenant gets its own deadline so one stuck tenant cannot hold up the rest.
//! A tenant that misses its deadline is cancelled but keeps its lease until
//! its pending store work finishes.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use rota_config::{RotaConfig, ScheduleWindow};
use rota_core::{AppError, Tenant};
use rota_registry::TenantRegistry;

use crate::distribution::{DistributionEngine, DistributionOutcome};

/// Cadence, window and deadline of a [`ScheduleTrigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerSettings {
    pub interval: Duration,
    pub window: ScheduleWindow,
    pub run_on_start: bool,
    pub tenant_timeout: Duration,
}

impl TriggerSettings {
    pub fn from_config(config: &RotaConfig) -> Result<Self> {
        Ok(Self {
            interval: config.interval(),
            window: config.window()?,
            run_on_start: config.schedule.run_on_start,
            tenant_timeout: config.tenant_timeout(),
        })
    }

    /// Whether a scheduled tick at `now` should fire.
    pub fn in_window(&self, now: DateTime<Utc>) -> bool {
        self.window.contains(now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyStarted,
    /// The store was unreachable at start; nothing will fire.
    Disabled,
}

/// How one tenant fared in a firing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantResult {
    Finished(DistributionOutcome),
    Failed { error: String },
    TimedOut { timeout_secs: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantRun {
    pub tenant_id: String,
    pub result: TenantResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FiringReport {
    /// Active tenants could not be listed; the whole firing was skipped.
    RegistryUnavailable { error: String },
    Completed { tenants: Vec<TenantRun> },
}

impl FiringReport {
    pub fn tenants(&self) -> &[TenantRun] {
        match self {
            Self::Completed { tenants } => tenants,
            Self::RegistryUnavailable { .. } => &[],
        }
    }

    pub fn assigned(&self) -> usize {
        self.tenants()
            .iter()
            .map(|run| match &run.result {
                TenantResult::Finished(outcome) => outcome.assigned(),
                _ => 0,
            })
            .sum()
    }
}

struct Dispatcher {
    registry: TenantRegistry,
    engine: DistributionEngine,
    settings: TriggerSettings,
}

impl Dispatcher {
    async fn fire(&self, reason: &str) -> FiringReport {
        let tenants = match self.registry.list_active_tenants().await {
            Ok(tenants) => tenants,
            Err(err) => {
                let error = format!("{err:#}");
                error!(%error, reason, "Failed to list active tenants, skipping firing");
                return FiringReport::RegistryUnavailable { error };
            }
        };

        let mut runs = Vec::with_capacity(tenants.len());
        for tenant in &tenants {
            runs.push(self.run_tenant(tenant, reason).await);
        }
        let report = FiringReport::Completed { tenants: runs };
        info!(
            reason,
            tenants = tenants.len(),
            assigned = report.assigned(),
            "Firing complete"
        );
        report
    }

    /// Run one tenant in its own task under the tenant deadline.
    ///
    /// On expiry the run is cancelled and left to drain in the background.
    /// It keeps the tenant's lease until its in-flight store write returns,
    /// so a later run cannot interleave with it.
    async fn run_tenant(&self, tenant: &Tenant, reason: &str) -> TenantRun {
        let tenant_id = tenant.tenant_id.clone();
        let deadline = self.settings.tenant_timeout;
        let cancel = CancellationToken::new();

        let mut task = {
            let engine = self.engine.clone();
            let tenant = tenant.clone();
            let reason = reason.to_string();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let outcome = engine.run_cancellable(&tenant, &reason, &cancel).await;
                if cancel.is_cancelled() {
                    debug!(tenant_id = %tenant.tenant_id, "Abandoned distribution run drained");
                }
                outcome
            })
        };

        let result = match tokio::time::timeout(deadline, &mut task).await {
            Ok(Ok(Ok(outcome))) => TenantResult::Finished(outcome),
            Ok(Ok(Err(err))) => {
                let error = format!("{err:#}");
                error!(%tenant_id, %error, "Distribution failed");
                TenantResult::Failed { error }
            }
            Ok(Err(join_err)) => {
                let error = format!("Distribution task failed: {join_err}");
                error!(%tenant_id, %error, "Distribution failed");
                TenantResult::Failed { error }
            }
            Err(_) => {
                cancel.cancel();
                let err = AppError::TenantTimedOut {
                    tenant_id: tenant_id.clone(),
                    timeout_secs: deadline.as_secs(),
                };
                warn!(%tenant_id, "{err}");
                TenantResult::TimedOut {
                    timeout_secs: deadline.as_secs(),
                }
            }
        };
        TenantRun { tenant_id, result }
    }

    async fn run_loop(self: Arc<Self>, cancel: CancellationToken) {
        if self.settings.run_on_start {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = self.fire("startup") => {}
            }
        }

        let period = self.settings.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let now = Utc::now();
                    if !self.settings.in_window(now) {
                        debug!(%now, "Outside distribution window, tick suppressed");
                        continue;
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.fire("scheduled") => {}
                    }
                }
            }
        }
        info!("Schedule trigger stopped");
    }
}

/// Periodic driver of the distribution engine.
pub struct ScheduleTrigger {
    dispatcher: Arc<Dispatcher>,
    started: AtomicBool,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ScheduleTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleTrigger")
            .field("settings", &self.dispatcher.settings)
            .field("started", &self.started.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl ScheduleTrigger {
    pub fn new(
        registry: TenantRegistry,
        engine: DistributionEngine,
        settings: TriggerSettings,
    ) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher {
                registry,
                engine,
                settings,
            }),
            started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &TriggerSettings {
        &self.dispatcher.settings
    }

    /// Spawn the firing loop. Only the first call on a trigger does anything.
    pub async fn start(&self) -> StartOutcome {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Schedule trigger already started");
            return StartOutcome::AlreadyStarted;
        }

        if let Err(err) = self.dispatcher.registry.store().ping().await {
            error!(error = %format!("{err:#}"), "Document store unavailable, scheduler disabled");
            return StartOutcome::Disabled;
        }

        let settings = &self.dispatcher.settings;
        info!(
            interval_secs = settings.interval.as_secs(),
            window_start = %settings.window.start,
            window_end = %settings.window.end,
            utc_offset = %settings.window.offset,
            run_on_start = settings.run_on_start,
            "Schedule trigger started"
        );
        let dispatcher = Arc::clone(&self.dispatcher);
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(dispatcher.run_loop(cancel));
        *self.task.lock().await = Some(handle);
        StartOutcome::Started
    }

    /// Fire immediately for every active tenant, ignoring cadence and window.
    pub async fn run_now(&self) -> FiringReport {
        self.dispatcher.fire("manual").await
    }

    /// Run one tenant immediately under the same deadline as a firing.
    pub async fn run_tenant(&self, tenant: &Tenant) -> TenantRun {
        self.dispatcher.run_tenant(tenant, "manual").await
    }

    /// Stop the loop and wait for it to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            warn!(error = %err, "Schedule loop ended abnormally");
        }
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
