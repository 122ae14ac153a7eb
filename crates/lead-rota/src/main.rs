use anyhow::Result;
use clap::Parser;

mod agent_cmds;
mod app;
mod cli;
mod config_cmds;
mod dispatch_cmd;
mod error_hints;
mod lead_cmds;
mod logging;
mod output;
mod serve_cmd;
mod tenant_cmds;

use app::App;
use cli::{AgentCommands, Cli, Commands, ConfigCommands, LeadCommands, TenantCommands};
use rota_core::Agent;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Daemon mode logs progress by default; one-shot commands stay quiet.
    let (default_directive, log_dir) = match &cli.command {
        Commands::Serve { log_dir } => ("info", log_dir.as_deref()),
        _ => ("warn", None),
    };
    let _log_guard = match logging::init(default_directive, log_dir) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        if let Some(hint) = error_hints::suggest_fix(&err) {
            eprintln!("{hint}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let format = cli.format;

    // `config init` must work even when the existing config is broken.
    if let Commands::Config {
        cmd: ConfigCommands::Init { path },
    } = &cli.command
    {
        return config_cmds::handle_config_init(path.clone());
    }

    let app = App::load(cli.config.as_deref())?;
    let registry = &app.registry;

    match cli.command {
        Commands::Serve { .. } => serve_cmd::handle_serve(&app).await?,
        Commands::Dispatch { tenant } => dispatch_cmd::handle_dispatch(&app, tenant, format).await?,
        Commands::Tenant { cmd } => match cmd {
            TenantCommands::Provision {
                name,
                admin,
                max_agents,
                max_admins,
            } => {
                tenant_cmds::handle_provision(registry, name, admin, max_agents, max_admins, format)
                    .await?;
            }
            TenantCommands::Deprovision { tenant_id, yes } => {
                tenant_cmds::handle_deprovision(&app, tenant_id, yes).await?;
            }
            TenantCommands::List { all } => tenant_cmds::handle_list(registry, all, format).await?,
            TenantCommands::Status { tenant_id, status } => {
                tenant_cmds::handle_status(registry, tenant_id, status, format).await?;
            }
            TenantCommands::Quota { tenant_id, role } => {
                tenant_cmds::handle_quota(registry, tenant_id, role, format).await?;
            }
            TenantCommands::Resolve { address } => {
                tenant_cmds::handle_resolve(registry, address, format).await?;
            }
        },
        Commands::Agent { cmd } => match cmd {
            AgentCommands::Add {
                tenant_id,
                address,
                role,
                online,
                verified,
            } => {
                let agent = Agent {
                    contact_address: address,
                    role,
                    online,
                    verified,
                };
                agent_cmds::handle_add(registry, tenant_id, agent, format).await?;
            }
            AgentCommands::Set {
                tenant_id,
                address,
                online,
                verified,
            } => {
                agent_cmds::handle_set(registry, tenant_id, address, online, verified).await?;
            }
            AgentCommands::List { tenant_id } => {
                agent_cmds::handle_list(registry, tenant_id, format).await?;
            }
        },
        Commands::Lead { cmd } => match cmd {
            LeadCommands::Add { tenant_id, id } => {
                lead_cmds::handle_add(registry, tenant_id, id, format).await?;
            }
            LeadCommands::List {
                tenant_id,
                unassigned,
            } => {
                lead_cmds::handle_list(registry, tenant_id, unassigned, format).await?;
            }
        },
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Show => config_cmds::handle_config_show(&app.config, format)?,
            ConfigCommands::Init { .. } => {}
        },
    }

    Ok(())
}
