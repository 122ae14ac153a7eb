//! Resolves tenants to their storage namespace and enforces per-tenant quotas.
//!
//! Contact-address resolution only ever answers with an active tenant. It
//! tries the tenants' admin contact, then the contact-address index
//! maintained by [`TenantRegistry::register_agent`], and finally a scan of
//! every active tenant's agents. The scan is the only
//! operation whose cost grows with the tenant count; a scan hit back-fills
//! the index so the next lookup for that address is constant time.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use rota_core::{
    Agent, AgentRole, AppError, CURSOR_KEY, Cursor, Namespace, QuotaCheck, Tenant, TenantStatus,
};
use rota_store::{Collection, DocumentStore, IndexSpec};

/// Input for [`TenantRegistry::provision`].
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub display_name: String,
    pub admin_contact: String,
    pub max_agents: u32,
    pub max_admins: u32,
}

#[derive(Clone)]
pub struct TenantRegistry {
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for TenantRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantRegistry").finish_non_exhaustive()
    }
}

impl TenantRegistry {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    async fn require_tenant(&self, tenant_id: &str) -> Result<Tenant> {
        self.store
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(|| AppError::TenantNotFound(tenant_id.to_string()).into())
    }

    /// The tenant record, refused unless the tenant is active.
    pub async fn active_tenant(&self, tenant_id: &str) -> Result<Tenant> {
        let tenant = self.require_tenant(tenant_id).await?;
        if !tenant.status.is_active() {
            return Err(AppError::TenantInactive {
                tenant_id: tenant.tenant_id,
                status: tenant.status,
            }
            .into());
        }
        Ok(tenant)
    }

    /// Namespace of an active tenant.
    pub async fn resolve_by_tenant_id(&self, tenant_id: &str) -> Result<Namespace> {
        Ok(self.active_tenant(tenant_id).await?.namespace)
    }

    /// Find the active tenant that owns `address`, as admin or as one of its agents.
    ///
    /// Admin and index hits on a tenant that is no longer active fall
    /// through to the scan, so every path agrees with it. A scan hit
    /// re-points the index.
    pub async fn resolve_by_contact_address(&self, address: &str) -> Result<(Namespace, Tenant)> {
        if let Some(tenant) = self.store.find_tenant_by_admin(address).await? {
            if tenant.status.is_active() {
                return Ok((tenant.namespace.clone(), tenant));
            }
            debug!(
                address,
                tenant_id = %tenant.tenant_id,
                status = %tenant.status,
                "Admin contact belongs to an inactive tenant"
            );
        }

        if let Some(tenant_id) = self.store.lookup_contact(address).await? {
            match self.store.get_tenant(&tenant_id).await? {
                Some(tenant) if tenant.status.is_active() => {
                    return Ok((tenant.namespace.clone(), tenant));
                }
                Some(tenant) => {
                    debug!(
                        address,
                        %tenant_id,
                        status = %tenant.status,
                        "Contact index points at an inactive tenant"
                    );
                }
                None => warn!(address, %tenant_id, "Contact index points at a missing tenant"),
            }
        }

        for tenant in self.list_active_tenants().await? {
            let agents = self.store.list_agents(&tenant.namespace).await?;
            if agents
                .iter()
                .any(|a| a.contact_address.eq_ignore_ascii_case(address))
            {
                debug!(address, tenant_id = %tenant.tenant_id, "Resolved contact by scan");
                self.store.index_contact(address, &tenant.tenant_id).await?;
                return Ok((tenant.namespace.clone(), tenant));
            }
        }

        Err(AppError::ContactNotFound(address.to_string()).into())
    }

    /// Count agents of `role` against the tenant's limit for that role.
    ///
    /// Advisory only: nothing stops two creators from passing the check
    /// concurrently.
    pub async fn check_quota(&self, tenant_id: &str, role: AgentRole) -> Result<QuotaCheck> {
        let tenant = self.active_tenant(tenant_id).await?;
        let current = self
            .store
            .list_agents(&tenant.namespace)
            .await?
            .iter()
            .filter(|a| a.role == role)
            .count();
        let current = u32::try_from(current).unwrap_or(u32::MAX);
        Ok(QuotaCheck::evaluate(current, tenant.quota_for(role)))
    }

    /// Active tenants ordered by tenant id.
    pub async fn list_active_tenants(&self) -> Result<Vec<Tenant>> {
        let mut tenants: Vec<Tenant> = self
            .store
            .list_tenants()
            .await?
            .into_iter()
            .filter(|t| t.status.is_active())
            .collect();
        tenants.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));
        Ok(tenants)
    }

    /// Every tenant regardless of status, ordered by tenant id.
    pub async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        let mut tenants = self.store.list_tenants().await?;
        tenants.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));
        Ok(tenants)
    }

    /// Allocate a namespace for a new tenant and register it as active.
    ///
    /// The registry record is written last, so a failure part-way leaves an
    /// orphan namespace rather than an active tenant with missing collections.
    pub async fn provision(&self, request: ProvisionRequest) -> Result<Tenant> {
        let tenant_id = ulid::Ulid::new().to_string();
        let now = Utc::now();
        let tenant = Tenant {
            namespace: Namespace::for_tenant(&tenant_id),
            tenant_id,
            display_name: request.display_name,
            status: TenantStatus::Active,
            admin_contact: request.admin_contact,
            max_agents: request.max_agents,
            max_admins: request.max_admins,
            created_at: now,
            updated_at: now,
        };

        self.ensure_namespace(&tenant.namespace).await?;
        self.store.put_tenant(&tenant).await?;
        info!(
            tenant_id = %tenant.tenant_id,
            namespace = %tenant.namespace,
            "Provisioned tenant"
        );
        Ok(tenant)
    }

    /// Create missing collections, declare indexes and seed the cursor.
    ///
    /// Safe to re-run: existing collections and an existing cursor are kept.
    pub async fn ensure_namespace(&self, ns: &Namespace) -> Result<()> {
        for collection in Collection::ALL {
            if self.store.create_collection(ns, collection).await? {
                debug!(namespace = %ns, collection = collection.as_str(), "Created collection");
            } else {
                debug!(namespace = %ns, collection = collection.as_str(), "Collection exists, skipping");
            }
        }

        self.store
            .declare_indexes(
                ns,
                &[
                    IndexSpec::unique(Collection::Agents, "contactAddress"),
                    IndexSpec::lookup(Collection::Leads, "assignedTo"),
                    IndexSpec::lookup(Collection::Leads, "createdAt"),
                ],
            )
            .await?;

        self.store
            .seed_cursor(ns, CURSOR_KEY, &Cursor::neutral(Utc::now()))
            .await?;
        Ok(())
    }

    /// Drop the tenant's namespace and registry record. Irreversible.
    pub async fn deprovision(&self, tenant_id: &str) -> Result<()> {
        let tenant = self.require_tenant(tenant_id).await?;
        let dropped = self.store.drop_namespace(&tenant.namespace).await?;
        let unindexed = self.store.unindex_tenant(tenant_id).await?;
        self.store.remove_tenant(tenant_id).await?;
        info!(
            tenant_id,
            namespace = %tenant.namespace,
            dropped,
            unindexed,
            "Deprovisioned tenant"
        );
        Ok(())
    }

    /// Quota-gated agent creation that keeps the contact index current.
    pub async fn register_agent(&self, tenant_id: &str, agent: Agent) -> Result<QuotaCheck> {
        let tenant = self.active_tenant(tenant_id).await?;
        let quota = self.check_quota(tenant_id, agent.role).await?;
        if !quota.allowed {
            return Err(AppError::QuotaExceeded {
                tenant_id: tenant_id.to_string(),
                role: agent.role,
                current: quota.current,
                limit: quota.limit,
            }
            .into());
        }

        if !self.store.insert_agent(&tenant.namespace, &agent).await? {
            return Err(AppError::DuplicateAgent {
                tenant_id: tenant_id.to_string(),
                address: agent.contact_address,
            }
            .into());
        }
        self.store
            .index_contact(&agent.contact_address, tenant_id)
            .await?;
        info!(
            tenant_id,
            agent = %agent.contact_address,
            role = %agent.role,
            "Registered agent"
        );
        Ok(QuotaCheck::evaluate(quota.current + 1, quota.limit))
    }

    /// Move a tenant to `status`.
    pub async fn set_status(&self, tenant_id: &str, status: TenantStatus) -> Result<Tenant> {
        let mut tenant = self.require_tenant(tenant_id).await?;
        if tenant.status == status {
            return Ok(tenant);
        }
        let previous = tenant.status;
        tenant.status = status;
        tenant.updated_at = Utc::now();
        self.store.put_tenant(&tenant).await?;
        info!(tenant_id, from = %previous, to = %status, "Tenant status changed");
        Ok(tenant)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
