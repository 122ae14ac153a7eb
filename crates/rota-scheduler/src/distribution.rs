//! Round-robin lead distribution for one tenant.
//!
//! A run takes the tenant's lease, reads the eligible agents (online and
//! verified, ordered by contact address) and the unassigned leads, then
//! places leads in groups of `batch_size` per agent starting at the slot
//! after the last one served. The pointer moves on after every full group,
//! including the last one, and is persisted in the tenant's cursor so the
//! next run resumes from there.
//!
//! The lease is held until every store write the run started has finished,
//! including runs whose caller stopped waiting on them.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use rota_config::RotaConfig;
use rota_core::{Agent, CURSOR_KEY, Cursor, Tenant};
use rota_lock::{LeaseAttempt, try_acquire_lease};
use rota_registry::TenantRegistry;
use rota_store::DocumentStore;

/// Cap on leads one agent receives in a single run unless configured.
pub const DEFAULT_MAX_BATCH: usize = 4;

/// `min(ceil(unassigned / eligible), cap)`; zero when there is nobody to assign to.
pub fn batch_size(unassigned: usize, eligible: usize, cap: usize) -> usize {
    if eligible == 0 {
        return 0;
    }
    unassigned.div_ceil(eligible).min(cap.max(1))
}

/// Most leads a single run may place.
pub fn walk_limit(batch: usize, eligible: usize, unassigned: usize) -> usize {
    batch.saturating_mul(eligible).min(unassigned)
}

/// Slot the walk starts at.
///
/// If the cursor's agent is still eligible the walk continues past it,
/// otherwise it reuses the same slot so membership churn never skips a turn.
/// A neutral (negative) cursor starts at slot 0.
pub fn resume_index(cursor: &Cursor, eligible: &[Agent]) -> usize {
    let n = eligible.len();
    let Ok(last) = usize::try_from(cursor.last_assigned_index) else {
        return 0;
    };
    if n == 0 {
        return 0;
    }
    let still_eligible = cursor.last_assigned_agent.as_deref().is_some_and(|address| {
        eligible
            .iter()
            .any(|a| a.contact_address.eq_ignore_ascii_case(address))
    });
    if still_eligible {
        (last % n + 1) % n
    } else {
        last % n
    }
}

/// Pointer state of one assignment walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    agents: usize,
    batch: usize,
    pointer: usize,
    filled: usize,
}

impl Rotation {
    pub fn new(agents: usize, batch: usize, start: usize) -> Self {
        let agents = agents.max(1);
        Self {
            agents,
            batch: batch.max(1),
            pointer: start % agents,
            filled: 0,
        }
    }

    /// Slot the next lead goes to.
    pub fn pointer(&self) -> usize {
        self.pointer
    }

    /// Record one placement at the current slot and return that slot.
    pub fn place(&mut self) -> usize {
        let slot = self.pointer;
        self.filled += 1;
        if self.filled == self.batch {
            self.filled = 0;
            self.pointer = (self.pointer + 1) % self.agents;
        }
        slot
    }
}

/// One run's assignment walk: the rotation plus the run's attempt budget.
///
/// Every attempt counts toward the budget, placed or not, so a run never
/// touches more than `walk_limit` leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Walk {
    rotation: Rotation,
    batch: usize,
    remaining: usize,
}

impl Walk {
    pub fn new(unassigned: usize, eligible: usize, cap: usize, start: usize) -> Self {
        let batch = batch_size(unassigned, eligible, cap);
        Self {
            rotation: Rotation::new(eligible, batch, start),
            batch,
            remaining: walk_limit(batch, eligible, unassigned),
        }
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn limit_reached(&self) -> bool {
        self.remaining == 0
    }

    /// Slot the next lead is offered to, or `None` once the budget is spent.
    pub fn next_attempt(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.rotation.pointer())
    }

    /// The lead offered by the last attempt was written.
    pub fn placed(&mut self) {
        self.rotation.place();
    }

    pub fn pointer(&self) -> usize {
        self.rotation.pointer()
    }
}

/// One lead placed with one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub lead_id: String,
    pub agent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionReport {
    pub tenant_id: String,
    pub eligible_agents: usize,
    pub unassigned_leads: usize,
    pub batch_size: usize,
    pub assignments: Vec<Assignment>,
    /// Leads that were assigned by someone else between read and write.
    pub conflicts: usize,
    /// The run was cancelled before it used its whole walk.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub interrupted: bool,
    pub cursor: Cursor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DistributionOutcome {
    NoEligibleAgents,
    NoUnassignedLeads,
    /// Another run holds the tenant's lease; nothing was read or written.
    LeaseBusy { holder: String },
    /// Cancelled before the first placement; nothing was written.
    Cancelled,
    Distributed(DistributionReport),
}

impl DistributionOutcome {
    pub fn assigned(&self) -> usize {
        match self {
            Self::Distributed(report) => report.assignments.len(),
            _ => 0,
        }
    }
}

/// Runs the distribution procedure for one tenant at a time.
#[derive(Clone)]
pub struct DistributionEngine {
    store: Arc<dyn DocumentStore>,
    lease_dir: PathBuf,
    max_batch: usize,
}

impl std::fmt::Debug for DistributionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributionEngine")
            .field("lease_dir", &self.lease_dir)
            .field("max_batch", &self.max_batch)
            .finish_non_exhaustive()
    }
}

impl DistributionEngine {
    pub fn new(store: Arc<dyn DocumentStore>, lease_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            lease_dir: lease_dir.into(),
            max_batch: DEFAULT_MAX_BATCH,
        }
    }

    pub fn from_config(store: Arc<dyn DocumentStore>, config: &RotaConfig) -> Self {
        let max_batch = usize::try_from(config.distribution.max_batch_per_agent)
            .unwrap_or(DEFAULT_MAX_BATCH);
        Self::new(store, config.lease_dir()).with_max_batch(max_batch)
    }

    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    pub fn max_batch(&self) -> usize {
        self.max_batch
    }

    /// Distribute the tenant's unassigned leads under its lease.
    ///
    /// `reason` is recorded in the lease file for whoever finds it held.
    pub async fn run(&self, tenant: &Tenant, reason: &str) -> Result<DistributionOutcome> {
        self.run_cancellable(tenant, reason, &CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), but stops placing leads once `cancel` fires.
    ///
    /// The token is checked before every store write, never during one, so
    /// the lease is only released after the last write this run started has
    /// landed. Leads placed before cancellation are kept and the cursor is
    /// saved for them.
    pub async fn run_cancellable(
        &self,
        tenant: &Tenant,
        reason: &str,
        cancel: &CancellationToken,
    ) -> Result<DistributionOutcome> {
        let lease = match try_acquire_lease(&self.lease_dir, &tenant.tenant_id, reason)? {
            LeaseAttempt::Acquired(lease) => lease,
            LeaseAttempt::Held(diagnostic) => {
                let holder = LeaseAttempt::holder_description(&diagnostic);
                info!(tenant_id = %tenant.tenant_id, %holder, "Distribution already running, skipping");
                return Ok(DistributionOutcome::LeaseBusy { holder });
            }
        };

        let outcome = self.distribute(tenant, cancel).await;
        drop(lease);
        outcome
    }

    /// Deprovision a tenant and delete its lease file.
    ///
    /// Refused while a run holds the lease. The lease is kept for the whole
    /// teardown so no run can start against a half-dropped namespace.
    pub async fn deprovision_tenant(
        &self,
        registry: &TenantRegistry,
        tenant_id: &str,
    ) -> Result<()> {
        let lease = match try_acquire_lease(&self.lease_dir, tenant_id, "deprovision")? {
            LeaseAttempt::Acquired(lease) => lease,
            LeaseAttempt::Held(diagnostic) => {
                let holder = LeaseAttempt::holder_description(&diagnostic);
                bail!("Tenant {tenant_id} has a distribution run in progress ({holder})");
            }
        };
        registry.deprovision(tenant_id).await?;
        lease.remove()
    }

    async fn distribute(
        &self,
        tenant: &Tenant,
        cancel: &CancellationToken,
    ) -> Result<DistributionOutcome> {
        let ns = &tenant.namespace;
        let tenant_id = tenant.tenant_id.as_str();

        let mut eligible: Vec<Agent> = self
            .store
            .list_agents(ns)
            .await
            .with_context(|| format!("Failed to load agents for tenant {tenant_id}"))?
            .into_iter()
            .filter(Agent::is_eligible)
            .collect();
        if eligible.is_empty() {
            debug!(tenant_id, "No eligible agents");
            return Ok(DistributionOutcome::NoEligibleAgents);
        }
        eligible.sort_by(|a, b| a.contact_address.cmp(&b.contact_address));

        let leads = self
            .store
            .unassigned_leads(ns)
            .await
            .with_context(|| format!("Failed to load leads for tenant {tenant_id}"))?;
        if leads.is_empty() {
            debug!(tenant_id, "No unassigned leads");
            return Ok(DistributionOutcome::NoUnassignedLeads);
        }

        let cursor = self
            .store
            .load_cursor(ns, CURSOR_KEY)
            .await
            .with_context(|| format!("Failed to load cursor for tenant {tenant_id}"))?
            .unwrap_or_else(|| Cursor::neutral(Utc::now()));

        let n = eligible.len();
        let start = resume_index(&cursor, &eligible);
        let mut walk = Walk::new(leads.len(), n, self.max_batch, start);
        let batch = walk.batch();
        debug!(
            tenant_id,
            eligible = n,
            unassigned = leads.len(),
            batch_size = batch,
            start,
            "Starting assignment walk"
        );

        let mut assignments = Vec::new();
        let mut conflicts = 0;
        let mut interrupted = false;
        for lead in &leads {
            if cancel.is_cancelled() && !walk.limit_reached() {
                interrupted = true;
                break;
            }
            let Some(slot) = walk.next_attempt() else {
                break;
            };
            let agent = &eligible[slot].contact_address;
            let placed = self
                .store
                .assign_lead(ns, &lead.id, agent, Utc::now())
                .await
                .with_context(|| format!("Failed to assign lead {} in tenant {tenant_id}", lead.id))?;
            if placed {
                walk.placed();
                assignments.push(Assignment {
                    lead_id: lead.id.clone(),
                    agent: agent.clone(),
                });
            } else {
                debug!(tenant_id, lead_id = %lead.id, "Lead assigned elsewhere, skipping");
                conflicts += 1;
            }
        }

        if interrupted && assignments.is_empty() {
            info!(tenant_id, conflicts, "Distribution cancelled before any placement");
            return Ok(DistributionOutcome::Cancelled);
        }

        let pointer = walk.pointer();
        let cursor = Cursor {
            last_assigned_index: i64::try_from(pointer).unwrap_or(i64::MAX),
            last_assigned_agent: Some(eligible[pointer].contact_address.clone()),
            last_assigned_at: Utc::now(),
        };
        self.store
            .save_cursor(ns, CURSOR_KEY, &cursor)
            .await
            .with_context(|| format!("Failed to save cursor for tenant {tenant_id}"))?;

        info!(
            tenant_id,
            assigned = assignments.len(),
            conflicts,
            interrupted,
            batch_size = batch,
            next_agent = %eligible[pointer].contact_address,
            "Distributed leads"
        );

        Ok(DistributionOutcome::Distributed(DistributionReport {
            tenant_id: tenant_id.to_string(),
            eligible_agents: n,
            unassigned_leads: leads.len(),
            batch_size: batch,
            assignments,
            conflicts,
            interrupted,
            cursor,
        }))
    }
}

#[cfg(test)]
#[path = "distribution_tests.rs"]
mod tests;
