//! vfox-plugin
//!
//! Loads a plugin directory and runs its hooks from the command line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use vfox::{Config, RuntimeEnv, Wrapper};

/// Plugin runtime diagnostics
#[derive(Parser, Debug)]
#[command(name = "vfox-plugin")]
#[command(about = "Load a vfox plugin and run its hooks", long_about = None)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Runtime version reported to plugins
    #[arg(long, default_value = env!("CARGO_PKG_VERSION"))]
    runtime_version: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print plugin metadata and the hooks it defines
    Info {
        /// Plugin directory
        dir: PathBuf,
    },
    /// List the versions the plugin can install
    Available {
        /// Plugin directory
        dir: PathBuf,
        /// Arguments passed to the Available hook
        args: Vec<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vfox=info")))
        .with(args.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!args.log_json).then(tracing_subscriber::fmt::layer))
        .init();

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    let env = RuntimeEnv::new(args.runtime_version, config);

    match args.command {
        Command::Info { dir } => {
            let wrapper = open(&dir, &env)?;
            let metadata = serde_json::to_string_pretty(wrapper.metadata())?;
            println!("{metadata}");

            let hooks: Vec<_> = wrapper.hooks().iter().map(|hook| hook.name()).collect();
            println!("hooks: {}", hooks.join(", "));
            wrapper.close();
        }
        Command::Available { dir, args } => {
            let wrapper = open(&dir, &env)?;
            let packages = wrapper
                .available(&args)
                .with_context(|| format!("Failed to list versions of {}", wrapper.name()))?;
            if packages.is_empty() {
                info!("No versions available");
            }
            for package in &packages {
                let mut line = package.main.version.clone();
                if !package.main.note.is_empty() {
                    line.push_str(&format!(" ({})", package.main.note));
                }
                for addition in &package.additions {
                    line.push_str(&format!(" +{}", addition.label()));
                }
                println!("{line}");
            }
            wrapper.close();
        }
    }

    Ok(())
}

fn open(dir: &Path, env: &RuntimeEnv) -> Result<Wrapper> {
    info!("Loading plugin from: {}", dir.display());
    Wrapper::create(dir, env).with_context(|| format!("Failed to load plugin at {}", dir.display()))
}
