//! User-facing hints for common CLI failures.
//!
//! Match on the typed error first, then fall back to the message chain, and
//! return a concrete command that gets the operator unstuck.

use anyhow::Error;
use rota_core::AppError;

const HINT_TENANT_NOT_FOUND: &str = "hint: list tenants with 'rota tenant list --all'";
const HINT_TENANT_INACTIVE: &str =
    "hint: reactivate with 'rota tenant status <TENANT_ID> active'";
const HINT_CONTACT_NOT_FOUND: &str =
    "hint: register the address with 'rota agent add <TENANT_ID> <ADDRESS>'";
const HINT_QUOTA_EXCEEDED: &str =
    "hint: check usage with 'rota tenant quota <TENANT_ID> --role <ROLE>'";
const HINT_DUPLICATE_AGENT: &str = "hint: list agents with 'rota agent list <TENANT_ID>'";
const HINT_STORAGE: &str =
    "hint: check [storage] data_dir with 'rota config show' and its permissions";
const HINT_CONFIG_ERROR: &str =
    "hint: compare with the template from 'rota config init --path /tmp/rota.toml'";

pub fn suggest_fix(err: &Error) -> Option<String> {
    for cause in err.chain() {
        if let Some(app_err) = cause.downcast_ref::<AppError>() {
            let hint = match app_err {
                AppError::TenantNotFound(_) => HINT_TENANT_NOT_FOUND,
                AppError::TenantInactive { .. } => HINT_TENANT_INACTIVE,
                AppError::ContactNotFound(_) => HINT_CONTACT_NOT_FOUND,
                AppError::QuotaExceeded { .. } => HINT_QUOTA_EXCEEDED,
                AppError::DuplicateAgent { .. } => HINT_DUPLICATE_AGENT,
                AppError::StorageUnavailable(_) => HINT_STORAGE,
                AppError::InvalidConfig(_) => HINT_CONFIG_ERROR,
                AppError::TenantTimedOut { .. } => continue,
            };
            return Some(hint.to_string());
        }
    }

    let chain_text = err
        .chain()
        .map(|cause| cause.to_string().to_lowercase())
        .collect::<Vec<_>>()
        .join(" | ");

    if chain_text.contains("config")
        && (chain_text.contains("invalid")
            || chain_text.contains("missing")
            || chain_text.contains("parse"))
    {
        return Some(HINT_CONFIG_ERROR.to_string());
    }

    if chain_text.contains("namespace") && chain_text.contains("does not exist") {
        return Some(HINT_STORAGE.to_string());
    }

    None
}
