use anyhow::{Result, bail};

use rota_core::{Agent, OutputFormat};
use rota_registry::TenantRegistry;

use crate::output::print_json;

pub(crate) async fn handle_add(
    registry: &TenantRegistry,
    tenant_id: String,
    agent: Agent,
    format: OutputFormat,
) -> Result<()> {
    let address = agent.contact_address.clone();
    let role = agent.role;
    let quota = registry.register_agent(&tenant_id, agent).await?;
    match format {
        OutputFormat::Json => print_json(&quota)?,
        OutputFormat::Text => println!(
            "Registered {address} as {role} ({}/{} used)",
            quota.current, quota.limit
        ),
    }
    Ok(())
}

pub(crate) async fn handle_set(
    registry: &TenantRegistry,
    tenant_id: String,
    address: String,
    online: Option<bool>,
    verified: Option<bool>,
) -> Result<()> {
    if online.is_none() && verified.is_none() {
        bail!("Nothing to change: pass --online and/or --verified");
    }
    let namespace = registry.resolve_by_tenant_id(&tenant_id).await?;
    let found = registry
        .store()
        .set_agent_presence(&namespace, &address, online, verified)
        .await?;
    if !found {
        bail!("Agent {address} not found in tenant {tenant_id}");
    }
    eprintln!("Updated {address}");
    Ok(())
}

pub(crate) async fn handle_list(
    registry: &TenantRegistry,
    tenant_id: String,
    format: OutputFormat,
) -> Result<()> {
    let namespace = registry.resolve_by_tenant_id(&tenant_id).await?;
    let mut agents = registry.store().list_agents(&namespace).await?;
    agents.sort_by(|a, b| a.contact_address.cmp(&b.contact_address));

    match format {
        OutputFormat::Json => print_json(&agents)?,
        OutputFormat::Text => {
            for agent in &agents {
                println!(
                    "{:<32} {:<8} {}",
                    agent.contact_address,
                    agent.role.as_str(),
                    if agent.is_eligible() {
                        "eligible"
                    } else if agent.online {
                        "unverified"
                    } else {
                        "offline"
                    }
                );
            }
        }
    }
    Ok(())
}
