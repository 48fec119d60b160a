//! CLI entry point for gpio-export
//!
//! Exports the lines declared in a TOML hardware description and keeps them
//! exported until the process is asked to stop.
//!
//! # Usage
//!
//! Export for real and hold until Ctrl-C:
//! ```bash
//! gpio-exportd run --config /etc/gpio-export.toml
//! ```
//!
//! Dry run against in-memory collaborators:
//! ```bash
//! gpio-exportd run --config board.toml --mock
//! ```
//!
//! Validate a description without touching hardware:
//! ```bash
//! gpio-exportd check --config board.toml
//! ```
//!
//! A retryable setup failure (a controller not registered yet) exits with 75 so
//! a supervisor can start the daemon again later.

#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gpio_export::{load_config, ExportConfig, ExportGroup};
use gpio_export_core::{LineProvider, NamespacePublisher};
use gpio_export_mock::{MockLineProvider, MockNamespace};
use gpio_export_sysfs::{SysfsLineProvider, SysfsNamespace};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// EX_TEMPFAIL from sysexits.h
const EXIT_RETRY: u8 = 75;

#[derive(Parser)]
#[command(name = "gpio-exportd")]
#[command(about = "Export declared GPIO lines under a stable namespace", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the declared lines and hold them until Ctrl-C
    Run {
        /// Hardware description (TOML format)
        #[arg(long)]
        config: PathBuf,

        /// Use in-memory collaborators instead of sysfs
        #[arg(long)]
        mock: bool,
    },

    /// Decode the declarations and report what would be exported
    Check {
        /// Hardware description (TOML format)
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let result = match cli.command {
        Commands::Run { config, mock } => run(config, mock).await,
        Commands::Check { config } => check(config),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config_path: PathBuf, mock: bool) -> Result<ExitCode> {
    let config = load_config(&config_path)?;
    let (provider, publisher) = collaborators(&config, mock);
    info!(provider = provider.name(), "Exporting lines");

    let exporter = config.exporter(provider, publisher);
    let specs = config.specification_set();
    let mut group = match exporter.setup(specs, config.export.alias.as_deref()) {
        Ok(group) => group,
        Err(e) if e.is_retryable() => {
            error!(error = %e, "Setup deferred");
            eprintln!("Setup deferred, retry later: {}", e);
            return Ok(ExitCode::from(EXIT_RETRY));
        }
        Err(e) => return Err(e.into()),
    };

    report(&group);
    println!("Press Ctrl-C to release the lines");

    signal::ctrl_c().await?;
    info!("Shutdown requested");
    group.teardown();
    Ok(ExitCode::SUCCESS)
}

fn check(config_path: PathBuf) -> Result<ExitCode> {
    let config = load_config(&config_path)?;
    let set = config.specification_set();

    println!("{} of {} declaration(s) accepted", set.len(), set.declared());
    for spec in set.specs() {
        println!(
            "  {:<16} {:<16} {}{}",
            spec.name(),
            spec.source(),
            spec.direction(),
            if spec.direction_mutable() { " (mutable)" } else { "" }
        );
    }
    for rejected in set.rejected() {
        println!(
            "  rejected #{} {}: {}",
            rejected.index,
            rejected.label.as_deref().unwrap_or("<unnamed>"),
            rejected.error
        );
    }

    Ok(if set.is_empty() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn report(group: &ExportGroup) {
    println!("{} GPIO(s) exported under '{}'", group.len(), group.alias_name());
    for line in group.lines() {
        println!(
            "  {:<16} line {:<5} {}",
            line.name(),
            line.line_id(),
            line.direction()
        );
    }
    for skipped in group.skipped() {
        println!(
            "  skipped {}: {}",
            skipped.name.as_deref().unwrap_or("<unnamed>"),
            skipped.error
        );
    }
}

fn collaborators(
    config: &ExportConfig,
    mock: bool,
) -> (Arc<dyn LineProvider>, Arc<dyn NamespacePublisher>) {
    if !mock {
        return (
            Arc::new(SysfsLineProvider::new(&config.sysfs.root)),
            Arc::new(SysfsNamespace::new(&config.sysfs.namespace, &config.sysfs.root)),
        );
    }

    // One mock controller per chip named in the description, sized to fit.
    let mut chips: BTreeMap<&str, u32> = BTreeMap::new();
    for source in config.lines.iter().filter_map(|l| l.gpios.as_ref()) {
        let ngpio = chips.entry(source.chip.as_str()).or_insert(0);
        *ngpio = (*ngpio).max(source.offset.saturating_add(1));
    }

    let mut builder = MockLineProvider::builder();
    let mut base: u32 = 0;
    for (label, ngpio) in chips {
        let Some(next) = base.checked_add(ngpio) else {
            warn!(chip = label, "Line numbers exhausted, mock controller not created");
            continue;
        };
        builder = builder.chip(label, base, ngpio);
        base = next;
    }
    (Arc::new(builder.build()), Arc::new(MockNamespace::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpio_export_core::{LineId, SourceRef};

    #[test]
    fn test_mock_chips_do_not_overflow() {
        let config = ExportConfig::from_toml_str(
            r#"
            [[lines]]
            label = "a"
            gpios = { chip = "gpiochip0", offset = 4294967294 }

            [[lines]]
            label = "b"
            gpios = { chip = "gpiochip1", offset = 3 }
            "#,
        )
        .unwrap();

        let (provider, _publisher) = collaborators(&config, true);
        assert_eq!(
            provider.resolve(&SourceRef::new("gpiochip0", 4294967294)).unwrap(),
            LineId(4294967294)
        );
        assert!(provider.resolve(&SourceRef::new("gpiochip1", 3)).is_err());
    }

    #[test]
    fn test_mock_chips_are_laid_out_in_order() {
        let config = ExportConfig::from_toml_str(
            r#"
            [[lines]]
            label = "a"
            gpios = { chip = "gpiochip0", offset = 7 }

            [[lines]]
            label = "b"
            gpios = { chip = "gpiochip1", offset = 2 }
            "#,
        )
        .unwrap();

        let (provider, _publisher) = collaborators(&config, true);
        assert_eq!(
            provider.resolve(&SourceRef::new("gpiochip1", 2)).unwrap(),
            LineId(10)
        );
    }
}
