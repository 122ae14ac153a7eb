//! Shared record types and error taxonomy for the lead rotation workspace.

pub mod error;
pub mod records;
pub mod types;

pub use error::AppError;
pub use records::{Agent, Cursor, CURSOR_KEY, Lead, Namespace, QuotaCheck, Tenant};
pub use types::{AgentRole, LeadStatus, OutputFormat, TenantStatus};
