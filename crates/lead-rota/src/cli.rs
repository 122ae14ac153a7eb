use clap::{Parser, Subcommand};
use rota_core::{AgentRole, OutputFormat, TenantStatus};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rota")]
#[command(about = "Lead Rota: multi-tenant lead distribution scheduler")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Config file (defaults to ~/.config/lead-rota/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the schedule trigger until interrupted
    Serve {
        /// Also write logs to a file in this directory
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },

    /// Distribute leads now, ignoring cadence and window
    Dispatch {
        /// Only this tenant (defaults to every active tenant)
        #[arg(long)]
        tenant: Option<String>,
    },

    /// Manage tenants
    Tenant {
        #[command(subcommand)]
        cmd: TenantCommands,
    },

    /// Manage agents within a tenant
    Agent {
        #[command(subcommand)]
        cmd: AgentCommands,
    },

    /// Manage leads within a tenant
    Lead {
        #[command(subcommand)]
        cmd: LeadCommands,
    },

    /// Show/manage configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum TenantCommands {
    /// Create a tenant with its own namespace
    Provision {
        /// Display name
        name: String,

        /// Admin contact address
        #[arg(long)]
        admin: String,

        /// Maximum standard agents
        #[arg(long, default_value_t = 10)]
        max_agents: u32,

        /// Maximum admin agents
        #[arg(long, default_value_t = 2)]
        max_admins: u32,
    },

    /// Drop a tenant and all of its data
    Deprovision {
        tenant_id: String,

        /// Confirm the irreversible drop
        #[arg(long)]
        yes: bool,
    },

    /// List tenants
    List {
        /// Include inactive and suspended tenants
        #[arg(long)]
        all: bool,
    },

    /// Change a tenant's status
    Status {
        tenant_id: String,

        #[arg(value_enum)]
        status: TenantStatus,
    },

    /// Show quota usage for a role
    Quota {
        tenant_id: String,

        #[arg(long, value_enum, default_value = "standard")]
        role: AgentRole,
    },

    /// Find the tenant that owns a contact address
    Resolve { address: String },
}

#[derive(Subcommand)]
pub enum AgentCommands {
    /// Register an agent (quota-checked)
    Add {
        tenant_id: String,
        address: String,

        #[arg(long, value_enum, default_value = "standard")]
        role: AgentRole,

        /// Mark the agent online
        #[arg(long)]
        online: bool,

        /// Mark the agent verified
        #[arg(long)]
        verified: bool,
    },

    /// Update an agent's presence flags
    Set {
        tenant_id: String,
        address: String,

        #[arg(long)]
        online: Option<bool>,

        #[arg(long)]
        verified: Option<bool>,
    },

    /// List a tenant's agents
    List { tenant_id: String },
}

#[derive(Subcommand)]
pub enum LeadCommands {
    /// Insert an unassigned lead
    Add {
        tenant_id: String,

        /// Lead id (defaults to a new ULID)
        #[arg(long)]
        id: Option<String>,
    },

    /// List a tenant's leads
    List {
        tenant_id: String,

        /// Only leads still waiting for an agent
        #[arg(long)]
        unassigned: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write a commented config template
    Init {
        /// Target path (defaults to the standard location)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}
