//! modcache command line
//!
//! Validates cache configuration files and runs one-off expiry sweeps over
//! filesystem cache directories.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use modcache::cache::Janitor;
use modcache::{BackendRegistry, CacheSettings};

// =============================================================================
// CLI Arguments
// =============================================================================

/// modcache - modular function result cache
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a configuration file and build every configured backend
    Check {
        /// Path to the YAML configuration
        #[arg(long, short, env = "MODCACHE_CONFIG")]
        config: PathBuf,
    },

    /// Delete expired files from a filesystem cache directory once
    Sweep {
        /// Cache directory
        #[arg(long)]
        dir: PathBuf,

        /// Seconds since last access after which a file expires
        #[arg(long, default_value = "0")]
        expiration_delay: u64,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);
    info!("modcache v{}", modcache::VERSION);

    match args.command {
        Command::Check { config } => check(config),
        Command::Sweep {
            dir,
            expiration_delay,
            json,
        } => sweep(dir, Duration::from_secs(expiration_delay), json),
    }
}

fn check(config: PathBuf) -> Result<()> {
    info!("Checking cache configuration {}", config.display());

    let settings = CacheSettings::from_file(&config)
        .with_context(|| format!("failed to load {}", config.display()))?;
    let registry = BackendRegistry::from_settings(&settings)
        .with_context(|| format!("invalid cache configuration in {}", config.display()))?;

    for selector in registry.selectors() {
        if let Some(backend) = registry.lookup(&selector) {
            println!("{}\t{}", selector, backend.module());
        }
    }

    registry.stop_all();
    info!("Configuration valid: {} backend(s)", registry.len());
    Ok(())
}

fn sweep(dir: PathBuf, expiration_delay: Duration, json: bool) -> Result<()> {
    anyhow::ensure!(dir.is_dir(), "{} is not a directory", dir.display());

    let janitor = Janitor::new(&dir, expiration_delay);
    let report = janitor
        .sweep(SystemTime::now())
        .with_context(|| format!("sweep of {} failed", dir.display()))?;

    if json {
        println!("{}", serde_json::to_string(&report)?);
        return Ok(());
    }

    println!(
        "{}: scanned {}, removed {} at {}",
        dir.display(),
        report.scanned,
        report.removed,
        report.swept_at.to_rfc3339()
    );
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_sweep() {
        let args = Args::parse_from([
            "modcache",
            "sweep",
            "--dir",
            "/tmp/cache",
            "--expiration-delay",
            "30",
        ]);
        match args.command {
            Command::Sweep {
                dir,
                expiration_delay,
                json,
            } => {
                assert_eq!(dir, PathBuf::from("/tmp/cache"));
                assert_eq!(expiration_delay, 30);
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
