//! hostscan agent - host inventory from the command line
//!
//! - `scan` runs every enabled collector and records the results per device
//! - `services`, `enable`, `disable`, `set` manage which collectors run and how
//! - `devices`, `show`, `forget`, `clear` inspect or prune the device store
//! - `check` reports catalog and configuration inconsistencies

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hostscan_agent::app::App;
use hostscan_kernel::{ScanReport, ScanRequest, Settings};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hostscan-agent")]
#[command(version, about = "Host inventory agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every enabled collector once
    Scan {
        /// Upload the results with the configured exporter
        #[arg(long)]
        export: bool,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List known collectors with their effective options
    Services,

    /// Check the catalog and the configuration
    Check,

    /// Enable a collector, optionally overriding options
    Enable {
        name: String,

        /// Option override, repeatable
        #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,
    },

    /// Disable a collector
    Disable { name: String },

    /// Override one option of a collector
    Set {
        name: String,
        option: String,
        value: String,
    },

    /// List known devices
    Devices,

    /// Show a device record (this machine by default)
    Show { id: Option<String> },

    /// Remove a device record
    Forget { id: String },

    /// Remove every device record
    Clear,
}

fn setup_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(settings.log_filter()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if settings.environment.is_production() {
        builder.compact().with_target(false).init();
    } else {
        builder.with_file(true).with_line_number(true).init();
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to render JSON")?);
    Ok(())
}

fn print_report(report: &ScanReport) {
    if report.is_empty() {
        println!("No collector enabled. Use `hostscan-agent enable <NAME>`.");
        return;
    }

    for (name, run) in &report.results {
        if run.success {
            println!(
                "  ok    {:<10} {:>7.2}s  {} device(s)",
                name, run.duration_secs, run.devices_recorded
            );
        } else {
            println!(
                "  FAIL  {:<10} {:>7.2}s  {}",
                name,
                run.duration_secs,
                run.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    println!("{}/{} collectors succeeded", report.succeeded(), report.results.len());

    if let Some(export) = &report.export {
        let status = if export.success { "done" } else { "FAILED" };
        println!("Export via {}: {} ({} files)", export.exporter, status, export.files.len());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let (settings, warnings) = Settings::load();
    setup_tracing(&settings);
    for warning in &warnings {
        warn!("{}", warning);
    }

    let cli = Cli::parse();
    let app = App::bootstrap(settings)
        .await
        .context("Failed to initialise hostscan")?;

    match cli.command {
        Commands::Scan { export, json } => {
            let export = export || app.settings.scan.export;
            let orchestrator = app.orchestrator();
            if export && !orchestrator.has_exporter() {
                warn!("Export requested but no exporter is configured (GITHUB_* variables)");
            }

            let report = orchestrator.run(ScanRequest { export }).await;
            if json {
                print_json(&report)?;
            } else {
                print_report(&report);
            }
            if !report.is_empty() && report.succeeded() == 0 {
                bail!("every collector failed");
            }
        }
        Commands::Services => {
            for service in app.services() {
                let state = if service.enabled { "enabled" } else { "-" };
                let origin = if service.origin.is_some() { "" } else { " (no implementation)" };
                println!(
                    "{:<10} {:<8} {}{}",
                    service.name,
                    state,
                    service.description.as_deref().unwrap_or(""),
                    origin
                );
                println!("           {}", service.options);
            }
        }
        Commands::Check => {
            let issues = app.check();
            if issues.is_empty() {
                println!("Catalog and configuration are consistent");
            } else {
                for issue in &issues {
                    println!("  - {}", issue);
                }
                bail!("{} issue(s) found", issues.len());
            }
        }
        Commands::Enable { name, options } => {
            let name = app.enable(&name, &options)?;
            info!("{} enabled", name);
            println!("{} enabled", name);
        }
        Commands::Disable { name } => {
            if app.disable(&name) {
                println!("{} disabled", name.to_uppercase());
            } else {
                println!("{} was not enabled", name.to_uppercase());
            }
        }
        Commands::Set { name, option, value } => {
            app.set_option(&name, &option, &value)?;
            println!("{}.{} = {}", name.to_uppercase(), option, value);
        }
        Commands::Devices => {
            let current = app.devices.current_device_id();
            for id in app.devices.list_computers() {
                let marker = if current.as_deref() == Some(id.as_str()) { " (this machine)" } else { "" };
                let collectors = app.devices.get_computer(&id).map(|r| r.len()).unwrap_or(0);
                println!("{}  {} collector(s){}", id, collectors, marker);
            }
        }
        Commands::Show { id } => {
            let record = app.devices.get_machine_info(id.as_deref());
            if record.is_empty() {
                bail!("no data for {}", id.as_deref().unwrap_or("this machine"));
            }
            print_json(&record)?;
        }
        Commands::Forget { id } => {
            if !app.devices.remove_computer(&id) {
                bail!("unknown device {}", id);
            }
            println!("{} removed", id);
        }
        Commands::Clear => {
            app.devices.clear_all();
            println!("Device store cleared");
        }
    }

    Ok(())
}
