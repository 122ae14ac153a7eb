use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rota_core::{Agent, Cursor, Lead, Namespace, Tenant};

/// Collections every tenant namespace carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Agents,
    Leads,
    Cursors,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Agents, Collection::Leads, Collection::Cursors];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agents => "agents",
            Self::Leads => "leads",
            Self::Cursors => "cursors",
        }
    }
}

/// Declared index on a namespace collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub collection: String,
    pub field: String,
    #[serde(default)]
    pub unique: bool,
}

impl IndexSpec {
    pub fn unique(collection: Collection, field: &str) -> Self {
        Self {
            collection: collection.as_str().to_string(),
            field: field.to_string(),
            unique: true,
        }
    }

    pub fn lookup(collection: Collection, field: &str) -> Self {
        Self {
            collection: collection.as_str().to_string(),
            field: field.to_string(),
            unique: false,
        }
    }
}

/// Storage operations used by the registry and the distribution engine.
///
/// Registry-level methods operate on the tenant records and the
/// contact-address index. Namespace-level methods take the namespace handle
/// of one tenant and never touch another tenant's data.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Verify the store is reachable and writable.
    async fn ping(&self) -> Result<()>;

    async fn list_tenants(&self) -> Result<Vec<Tenant>>;
    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>>;
    async fn find_tenant_by_admin(&self, address: &str) -> Result<Option<Tenant>>;
    /// Insert or replace by `tenant_id`.
    async fn put_tenant(&self, tenant: &Tenant) -> Result<()>;
    async fn remove_tenant(&self, tenant_id: &str) -> Result<bool>;

    /// Contact address -> tenant id.
    async fn lookup_contact(&self, address: &str) -> Result<Option<String>>;
    async fn index_contact(&self, address: &str, tenant_id: &str) -> Result<()>;
    /// Remove every index entry pointing at `tenant_id`; returns how many.
    async fn unindex_tenant(&self, tenant_id: &str) -> Result<usize>;

    /// Create an empty collection; `false` if it already existed.
    async fn create_collection(&self, ns: &Namespace, collection: Collection) -> Result<bool>;
    /// Record index declarations, skipping ones already present.
    async fn declare_indexes(&self, ns: &Namespace, indexes: &[IndexSpec]) -> Result<()>;
    async fn list_indexes(&self, ns: &Namespace) -> Result<Vec<IndexSpec>>;
    /// Drop the namespace and everything in it; `false` if it did not exist.
    async fn drop_namespace(&self, ns: &Namespace) -> Result<bool>;

    async fn list_agents(&self, ns: &Namespace) -> Result<Vec<Agent>>;
    /// Insert unless the contact address exists; `false` on duplicate.
    async fn insert_agent(&self, ns: &Namespace, agent: &Agent) -> Result<bool>;
    /// Update presence flags; `false` if the agent does not exist.
    async fn set_agent_presence(
        &self,
        ns: &Namespace,
        address: &str,
        online: Option<bool>,
        verified: Option<bool>,
    ) -> Result<bool>;

    async fn list_leads(&self, ns: &Namespace) -> Result<Vec<Lead>>;
    /// Insert unless the id exists; `false` on duplicate.
    async fn insert_lead(&self, ns: &Namespace, lead: &Lead) -> Result<bool>;
    /// Set `assigned_to`/`assigned_at` only if the lead is still unassigned.
    ///
    /// Returns `false` when the lead is missing or was assigned by someone
    /// else since it was read.
    async fn assign_lead(
        &self,
        ns: &Namespace,
        lead_id: &str,
        agent: &str,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    async fn load_cursor(&self, ns: &Namespace, key: &str) -> Result<Option<Cursor>>;
    async fn save_cursor(&self, ns: &Namespace, key: &str, cursor: &Cursor) -> Result<()>;
    /// Write the cursor only if none exists; `false` if one was already there.
    async fn seed_cursor(&self, ns: &Namespace, key: &str, cursor: &Cursor) -> Result<bool>;

    /// Unassigned leads in stable order: `created_at`, then `id`.
    async fn unassigned_leads(&self, ns: &Namespace) -> Result<Vec<Lead>> {
        let mut leads: Vec<Lead> = self
            .list_leads(ns)
            .await?
            .into_iter()
            .filter(Lead::is_unassigned)
            .collect();
        leads.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(leads)
    }
}
