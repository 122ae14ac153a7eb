//! Record shapes read and written by the registry and the distribution engine.
//!
//! Every record serializes with camelCase field names so the on-disk
//! documents match the field-level contract shared with the ingestion
//! connectors and the UI layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AgentRole, LeadStatus, TenantStatus};

/// Fixed key of the rotation cursor singleton inside a namespace.
pub const CURSOR_KEY: &str = "lead_assignment";

/// Handle to one tenant's isolated storage namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    /// Build the namespace name for a freshly allocated tenant id.
    pub fn for_tenant(tenant_id: &str) -> Self {
        Self(format!("tenant_{}", tenant_id.to_ascii_lowercase()))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One customer organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    /// Stable external key (ULID).
    pub tenant_id: String,
    pub display_name: String,
    pub namespace: Namespace,
    pub status: TenantStatus,
    pub admin_contact: String,
    /// Limit on standard agents.
    pub max_agents: u32,
    /// Limit on admin agents.
    pub max_admins: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Configured limit for the given role.
    pub fn quota_for(&self, role: AgentRole) -> u32 {
        match role {
            AgentRole::Admin => self.max_admins,
            AgentRole::Standard => self.max_agents,
        }
    }
}

/// A user account scoped to one tenant's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Unique within the namespace.
    pub contact_address: String,
    pub role: AgentRole,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub verified: bool,
}

impl Agent {
    /// Online and verified at the time a run begins.
    pub fn is_eligible(&self) -> bool {
        self.online && self.verified
    }
}

/// A unit of inbound work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    /// Fresh unassigned lead as written by ingestion.
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            assigned_to: None,
            assigned_at: None,
            status: LeadStatus::New,
            created_at,
        }
    }

    /// Empty strings count as unassigned; connectors are not consistent about nulls.
    pub fn is_unassigned(&self) -> bool {
        self.assigned_to.as_deref().is_none_or(|a| a.trim().is_empty())
    }
}

/// Rotation state carried between distribution runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    /// Index into the sorted eligible set; -1 means never run.
    pub last_assigned_index: i64,
    #[serde(default)]
    pub last_assigned_agent: Option<String>,
    pub last_assigned_at: DateTime<Utc>,
}

impl Cursor {
    pub fn neutral(at: DateTime<Utc>) -> Self {
        Self {
            last_assigned_index: -1,
            last_assigned_agent: None,
            last_assigned_at: at,
        }
    }
}

/// Result of a per-role quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaCheck {
    pub allowed: bool,
    pub current: u32,
    pub limit: u32,
}

impl QuotaCheck {
    pub fn evaluate(current: u32, limit: u32) -> Self {
        Self {
            allowed: current < limit,
            current,
            limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_for_tenant_is_lowercase() {
        let ns = Namespace::for_tenant("01HZX3Q7B0ABCDEF");
        assert_eq!(ns.as_str(), "tenant_01hzx3q7b0abcdef");
    }

    #[test]
    fn test_lead_unassigned_treats_blank_as_empty() {
        let mut lead = Lead::new("l1", Utc::now());
        assert!(lead.is_unassigned());
        lead.assigned_to = Some("  ".to_string());
        assert!(lead.is_unassigned());
        lead.assigned_to = Some("a@x.io".to_string());
        assert!(!lead.is_unassigned());
    }

    #[test]
    fn test_lead_missing_fields_deserialize_as_unassigned() {
        let lead: Lead =
            serde_json::from_str(r#"{"id":"l9","createdAt":"2026-01-01T00:00:00Z"}"#).unwrap();
        assert!(lead.is_unassigned());
        assert_eq!(lead.status, LeadStatus::New);
    }

    #[test]
    fn test_agent_eligibility_requires_both_flags() {
        let mut agent = Agent {
            contact_address: "a@x.io".to_string(),
            role: AgentRole::Standard,
            online: true,
            verified: false,
        };
        assert!(!agent.is_eligible());
        agent.verified = true;
        assert!(agent.is_eligible());
        agent.online = false;
        assert!(!agent.is_eligible());
    }

    #[test]
    fn test_cursor_neutral_value() {
        let cursor = Cursor::neutral(Utc::now());
        assert_eq!(cursor.last_assigned_index, -1);
        assert!(cursor.last_assigned_agent.is_none());
    }

    #[test]
    fn test_cursor_toml_uses_camel_case_keys() {
        let cursor = Cursor::neutral(Utc::now());
        let text = toml::to_string(&cursor).unwrap();
        assert!(text.contains("lastAssignedIndex = -1"));
    }

    #[test]
    fn test_quota_check_at_limit_is_refused() {
        assert!(QuotaCheck::evaluate(2, 3).allowed);
        assert!(!QuotaCheck::evaluate(3, 3).allowed);
        assert!(!QuotaCheck::evaluate(0, 0).allowed);
    }

    #[test]
    fn test_tenant_quota_for_role() {
        let now = Utc::now();
        let tenant = Tenant {
            tenant_id: "T1".to_string(),
            display_name: "Acme".to_string(),
            namespace: Namespace::for_tenant("T1"),
            status: TenantStatus::Active,
            admin_contact: "boss@acme.io".to_string(),
            max_agents: 10,
            max_admins: 2,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(tenant.quota_for(AgentRole::Standard), 10);
        assert_eq!(tenant.quota_for(AgentRole::Admin), 2);
    }
}
