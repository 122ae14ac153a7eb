use crate::types::{AgentRole, TenantStatus};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Tenant '{0}' not found")]
    TenantNotFound(String),

    #[error("Tenant '{tenant_id}' is {status}, not active")]
    TenantInactive {
        tenant_id: String,
        status: TenantStatus,
    },

    #[error("No tenant owns contact address '{0}'")]
    ContactNotFound(String),

    #[error("Agent '{address}' already exists in tenant '{tenant_id}'")]
    DuplicateAgent { tenant_id: String, address: String },

    #[error("Quota exceeded for {role} agents in tenant '{tenant_id}' ({current}/{limit})")]
    QuotaExceeded {
        tenant_id: String,
        role: AgentRole,
        current: u32,
        limit: u32,
    },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Distribution for tenant '{tenant_id}' exceeded {timeout_secs}s deadline")]
    TenantTimedOut { tenant_id: String, timeout_secs: u64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_tenant_not_found() {
        let err = AppError::TenantNotFound("01ARZ".into());
        assert_eq!(err.to_string(), "Tenant '01ARZ' not found");
    }

    #[test]
    fn test_display_tenant_inactive() {
        let err = AppError::TenantInactive {
            tenant_id: "01ARZ".into(),
            status: TenantStatus::Suspended,
        };
        assert_eq!(err.to_string(), "Tenant '01ARZ' is suspended, not active");
    }

    #[test]
    fn test_display_quota_exceeded() {
        let err = AppError::QuotaExceeded {
            tenant_id: "T1".into(),
            role: AgentRole::Admin,
            current: 2,
            limit: 2,
        };
        assert_eq!(
            err.to_string(),
            "Quota exceeded for admin agents in tenant 'T1' (2/2)"
        );
    }

    #[test]
    fn test_display_tenant_timed_out() {
        let err = AppError::TenantTimedOut {
            tenant_id: "T1".into(),
            timeout_secs: 120,
        };
        assert_eq!(
            err.to_string(),
            "Distribution for tenant 'T1' exceeded 120s deadline"
        );
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: Box<dyn std::error::Error + Send + Sync> =
            Box::new(AppError::ContactNotFound("x@y.io".into()));
        let app = err.downcast_ref::<AppError>();
        assert!(matches!(app, Some(AppError::ContactNotFound(_))));
    }
}
