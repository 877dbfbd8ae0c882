mod config;
mod plan_cmd;
mod serve_cmd;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use config::{BuddyConfig, CliOverrides};

#[derive(Parser)]
#[command(name = "buddy", about = "Weekly study plans that always give you one next step")]
struct Cli {
    /// Assignment fixture file (overrides BUDDY_FIXTURE_PATH env var)
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,

    /// Per-call upstream timeout in seconds (overrides BUDDY_UPSTREAM_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter buddy config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Build this week's plan and print it
    Plan {
        /// User id for the Classroom tier (omit for fixture/stub only)
        #[arg(long)]
        user: Option<String>,
        /// Plan as of this date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        today: Option<String>,
        /// Print the plan, provenance and best next action as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the single best next action with a coaching line
    Next {
        /// User id for the Classroom tier
        #[arg(long)]
        user: Option<String>,
        /// Plan as of this date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        today: Option<String>,
    },
    /// Serve the plan and chat API over HTTP
    Serve {
        /// Address to bind (default 127.0.0.1)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (default 8000)
        #[arg(long)]
        port: Option<u16>,
    },
}

/// Execute the `buddy init` command: write a config file with the default
/// sources filled in.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        sources: config::SourcesSection {
            fixture_path: Some(PathBuf::from(
                buddy_core::config::PipelineConfig::DEFAULT_FIXTURE_PATH,
            )),
            upstream_timeout_secs: Some(
                buddy_core::config::PipelineConfig::DEFAULT_UPSTREAM_TIMEOUT.as_secs(),
            ),
        },
        server: config::ServerSection {
            bind: Some(config::DEFAULT_BIND.to_owned()),
            port: Some(config::DEFAULT_PORT),
        },
        ..config::ConfigFile::default()
    };

    config::save_config_to(&cfg, &path)?;

    println!("Config written to {}", path.display());
    println!();
    println!("Add [openai] api_key to enable generated plans,");
    println!("and [classroom] access_token to read Google Classroom coursework.");

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut overrides = CliOverrides {
        fixture: cli.fixture,
        timeout_secs: cli.timeout,
        ..CliOverrides::default()
    };

    match cli.command {
        Commands::Init { force } => {
            cmd_init(force)?;
        }
        Commands::Plan { user, today, json } => {
            let resolved = BuddyConfig::resolve(&overrides)?;
            let today = plan_cmd::resolve_today(today.as_deref())?;
            plan_cmd::run_plan(&resolved.orchestrator(), user.as_deref(), today, json).await?;
        }
        Commands::Next { user, today } => {
            let resolved = BuddyConfig::resolve(&overrides)?;
            let today = plan_cmd::resolve_today(today.as_deref())?;
            plan_cmd::run_next(&resolved.orchestrator(), user.as_deref(), today).await?;
        }
        Commands::Serve { bind, port } => {
            overrides.bind = bind;
            overrides.port = port;
            let resolved = BuddyConfig::resolve(&overrides)?;
            let state = serve_cmd::AppState::new(resolved.orchestrator());
            serve_cmd::run_serve(state, &resolved.bind, resolved.port).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod test_util {
    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Serialize tests that read or mutate process environment variables.
    pub fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
