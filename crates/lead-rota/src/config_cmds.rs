use anyhow::{Context, Result};
use std::path::PathBuf;

use rota_config::RotaConfig;
use rota_core::OutputFormat;

use crate::output::print_json;

pub(crate) fn handle_config_show(config: &RotaConfig, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(config)?,
        OutputFormat::Text => {
            print!("{}", toml::to_string_pretty(config)?);
            println!();
            println!("# data_dir  = {}", config.data_dir().display());
            println!("# lease_dir = {}", config.lease_dir().display());
        }
    }
    Ok(())
}

pub(crate) fn handle_config_init(path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(p) => p,
        None => RotaConfig::config_path()
            .context("Cannot determine config directory; pass --path")?,
    };
    RotaConfig::save_default_template(&path)?;
    eprintln!("Generated config template at: {}", path.display());
    Ok(())
}
