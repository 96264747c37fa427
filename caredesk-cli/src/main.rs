//! caredesk CLI - back-office tab views over the insurance REST store
//!
//! - Paged, filtered, sorted listing of every managed entity (`list`)
//! - Record create/update/delete with per-field validation
//! - Bulk import from CSV or JSON (`import`)
//! - The bundled in-memory REST store (`serve`, with `server` feature)

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use caredesk_core::config::{load_dotenv, CaredeskConfig};
use caredesk_core::entity::{Entity, EntityKind};
use caredesk_core::with_entity;
use clap::{ArgAction, CommandFactory, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod context;
mod render;
mod ui;

use context::AppContext;

#[derive(Parser, Debug)]
#[command(
    name = "caredesk",
    author,
    version,
    about = "Back-office desk for insurance reference data",
    long_about = "List, filter, edit and import cities, streets, addresses, contracts, \
                  insured persons, policies, provider codes and crosswalks."
)]
struct Cli {
    /// More logging (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress progress spinners (for script consumption)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// REST API base URL (overrides config)
    #[arg(long, env = "CAREDESK_API_URL", global = true)]
    api_url: Option<String>,

    /// Directory for saved view state (overrides config)
    #[arg(long, global = true, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show one page of an entity tab view
    List(commands::list::ListArgs),
    /// Print one record as JSON
    Show(commands::records::ShowArgs),
    /// Create a record from --set FIELD=VALUE assignments
    Create(commands::records::CreateArgs),
    /// Edit fields of an existing record
    Update(commands::records::UpdateArgs),
    /// Delete one or more records
    Delete(commands::records::DeleteArgs),
    /// Bulk import records from CSV or JSON
    Import(commands::import::ImportArgs),
    /// Forget saved filters, sort and view settings for an entity
    Reset(commands::reset::ResetArgs),
    /// List the managed entities and their columns
    Entities,
    /// Manage caredesk configuration (init, path, show)
    Config(config::ConfigArgs),
    /// Generate shell completion scripts
    Completions(CompletionsArgs),
    /// Run the in-memory REST store
    #[cfg(feature = "server")]
    Serve(commands::serve::ServeArgs),
}

#[derive(Parser, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: Shell,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)] // PowerShell is a proper noun, not a suffix
enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

fn init_tracing(verbosity: u8, fallback: &str) -> Result<()> {
    let level = match verbosity {
        0 => fallback,
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv().ok();
    let cli = Cli::parse();

    // Logging level comes from config, so tracing starts after load
    let cfg = CaredeskConfig::load();
    init_tracing(cli.verbose, &cfg.logging.level).ok();
    ui::init_quiet_mode(cli.quiet);

    let context = || AppContext::new(cfg.clone(), cli.api_url.clone(), cli.state_dir.clone());

    match cli.command {
        Commands::List(args) => commands::run_list(&context()?, args).await,
        Commands::Show(args) => commands::run_show(&context()?, args).await,
        Commands::Create(args) => commands::run_create(&context()?, args).await,
        Commands::Update(args) => commands::run_update(&context()?, args).await,
        Commands::Delete(args) => commands::run_delete(&context()?, args).await,
        Commands::Import(args) => commands::run_import(&context()?, args).await,
        Commands::Reset(args) => commands::run_reset(&context()?, args).await,
        Commands::Entities => run_entities(),
        Commands::Config(args) => config::run_config(args),
        Commands::Completions(args) => run_completions(args),
        #[cfg(feature = "server")]
        Commands::Serve(args) => commands::run_serve(args).await,
    }
}

fn run_entities() -> Result<()> {
    for kind in EntityKind::ALL {
        let (label, columns) = with_entity!(kind, E => (E::LABEL, E::COLUMNS));
        println!("{:<24} {:<24} {}", kind.key(), label, columns.join(", "));
    }
    Ok(())
}

fn run_completions(args: CompletionsArgs) -> Result<()> {
    use clap_complete::{generate, Shell as CompletionShell};
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    let shell = match args.shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    };
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
    Ok(())
}
