use anyhow::{Context, Result};
use caredesk_core::config::{ensure_config_dir, global_config_path, CaredeskConfig, LOCAL_CONFIG_FILE};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a default ~/.caredesk/config.toml
    Init(InitArgs),
    /// Show config file paths
    Path,
    /// Print the effective config (files, then environment)
    Show,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Force overwrite existing config
    #[arg(long, short)]
    pub force: bool,
}

pub fn run_config(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Init(args) => run_init(args),
        ConfigCommands::Path => run_path(),
        ConfigCommands::Show => run_show(),
    }
}

fn run_init(args: InitArgs) -> Result<()> {
    let config_path = global_config_path().context("Could not determine home directory")?;

    if config_path.exists() && !args.force {
        return Err(anyhow::anyhow!(
            "Config already exists at {}\n\nUse --force to overwrite",
            config_path.display()
        ));
    }

    ensure_config_dir()?;
    let content = CaredeskConfig::default().to_toml_string()?;
    std::fs::write(&config_path, content)
        .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

    println!("✅ Created config at: {}", config_path.display());
    println!("\nNext steps:");
    println!("  1. Edit the config: $EDITOR {}", config_path.display());
    println!("  2. Point [api] base_url at your backend");
    Ok(())
}

fn run_path() -> Result<()> {
    let global = global_config_path().context("Could not determine home directory")?;
    println!("global: {}", global.display());
    println!("local:  ./{LOCAL_CONFIG_FILE}");
    Ok(())
}

fn run_show() -> Result<()> {
    print!("{}", CaredeskConfig::load().to_toml_string()?);
    Ok(())
}
