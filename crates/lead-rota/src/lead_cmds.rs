use anyhow::{Result, bail};
use chrono::Utc;

use rota_core::{Lead, OutputFormat};
use rota_registry::TenantRegistry;

use crate::output::print_json;

/// Stand-in for an ingestion connector: writes one unassigned lead.
pub(crate) async fn handle_add(
    registry: &TenantRegistry,
    tenant_id: String,
    id: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let namespace = registry.resolve_by_tenant_id(&tenant_id).await?;
    let id = id.unwrap_or_else(|| ulid::Ulid::new().to_string());
    let lead = Lead::new(id, Utc::now());
    if !registry.store().insert_lead(&namespace, &lead).await? {
        bail!("Lead {} already exists in tenant {tenant_id}", lead.id);
    }
    match format {
        OutputFormat::Json => print_json(&lead)?,
        OutputFormat::Text => println!("Added lead {}", lead.id),
    }
    Ok(())
}

pub(crate) async fn handle_list(
    registry: &TenantRegistry,
    tenant_id: String,
    unassigned: bool,
    format: OutputFormat,
) -> Result<()> {
    let namespace = registry.resolve_by_tenant_id(&tenant_id).await?;
    let store = registry.store();
    let leads = if unassigned {
        store.unassigned_leads(&namespace).await?
    } else {
        store.list_leads(&namespace).await?
    };

    match format {
        OutputFormat::Json => print_json(&leads)?,
        OutputFormat::Text => {
            for lead in &leads {
                println!(
                    "{}  {}  {}",
                    lead.id,
                    lead.created_at.format("%Y-%m-%d %H:%M:%S"),
                    lead.assigned_to.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}
