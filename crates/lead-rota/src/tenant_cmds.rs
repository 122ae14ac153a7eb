use anyhow::{Result, bail};
use serde_json::json;

use rota_core::{AgentRole, OutputFormat, Tenant, TenantStatus};
use rota_registry::{ProvisionRequest, TenantRegistry};

use crate::app::App;
use crate::output::print_json;

fn print_tenant(tenant: &Tenant) {
    println!(
        "{}  {:<9}  {:<24}  {}  (agents {}, admins {})",
        tenant.tenant_id,
        tenant.status.as_str(),
        tenant.display_name,
        tenant.admin_contact,
        tenant.max_agents,
        tenant.max_admins
    );
}

pub(crate) async fn handle_provision(
    registry: &TenantRegistry,
    name: String,
    admin: String,
    max_agents: u32,
    max_admins: u32,
    format: OutputFormat,
) -> Result<()> {
    let tenant = registry
        .provision(ProvisionRequest {
            display_name: name,
            admin_contact: admin,
            max_agents,
            max_admins,
        })
        .await?;

    match format {
        OutputFormat::Json => print_json(&tenant)?,
        OutputFormat::Text => {
            println!("Provisioned tenant {}", tenant.tenant_id);
            println!("Namespace: {}", tenant.namespace);
        }
    }
    Ok(())
}

pub(crate) async fn handle_deprovision(app: &App, tenant_id: String, yes: bool) -> Result<()> {
    if !yes {
        bail!("Refusing to drop tenant {tenant_id} without --yes");
    }
    app.engine
        .deprovision_tenant(&app.registry, &tenant_id)
        .await?;
    eprintln!("Deprovisioned tenant {tenant_id}");
    Ok(())
}

pub(crate) async fn handle_list(
    registry: &TenantRegistry,
    all: bool,
    format: OutputFormat,
) -> Result<()> {
    let tenants = if all {
        registry.list_tenants().await?
    } else {
        registry.list_active_tenants().await?
    };

    match format {
        OutputFormat::Json => print_json(&tenants)?,
        OutputFormat::Text => {
            if tenants.is_empty() {
                eprintln!("No tenants found.");
            }
            for tenant in &tenants {
                print_tenant(tenant);
            }
        }
    }
    Ok(())
}

pub(crate) async fn handle_status(
    registry: &TenantRegistry,
    tenant_id: String,
    status: TenantStatus,
    format: OutputFormat,
) -> Result<()> {
    let tenant = registry.set_status(&tenant_id, status).await?;
    match format {
        OutputFormat::Json => print_json(&tenant)?,
        OutputFormat::Text => print_tenant(&tenant),
    }
    Ok(())
}

pub(crate) async fn handle_quota(
    registry: &TenantRegistry,
    tenant_id: String,
    role: AgentRole,
    format: OutputFormat,
) -> Result<()> {
    let quota = registry.check_quota(&tenant_id, role).await?;
    match format {
        OutputFormat::Json => print_json(&quota)?,
        OutputFormat::Text => println!(
            "{role}: {}/{} ({})",
            quota.current,
            quota.limit,
            if quota.allowed { "room left" } else { "full" }
        ),
    }
    Ok(())
}

pub(crate) async fn handle_resolve(
    registry: &TenantRegistry,
    address: String,
    format: OutputFormat,
) -> Result<()> {
    let (namespace, tenant) = registry.resolve_by_contact_address(&address).await?;
    match format {
        OutputFormat::Json => print_json(&json!({
            "address": address,
            "tenantId": tenant.tenant_id,
            "namespace": namespace,
            "status": tenant.status,
        }))?,
        OutputFormat::Text => println!("{address} -> {} ({namespace})", tenant.tenant_id),
    }
    Ok(())
}
