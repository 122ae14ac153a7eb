//! Tenant registry: namespace resolution, quotas, provisioning.

pub mod registry;

pub use registry::{ProvisionRequest, TenantRegistry};
