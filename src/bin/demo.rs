//! In-App Updater Demo - entry point
//!
//! The CLI rendition of the demo screen: current version display plus the
//! two update triggers (`flexible` and `immediate`), backed by the scripted
//! store. Failures bubble up here and nowhere else.

use clap::Parser;
use inapp_updater_lib::cli::{formatter, Cli, Commands, OutputFormat};
use inapp_updater_lib::updater::coordinator::{UpdateCoordinator, UpdateOutcome};
use inapp_updater_lib::updater::manager::{HostWindow, UpdateManager, UpdateType};
use inapp_updater_lib::updater::sim::{Scenario, SimUpdateManager};
use tracing::error;

/// Monotonic build counter shown next to the version name.
const VERSION_CODE: u64 = 1;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        formatter::error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let json = cli.format == OutputFormat::Json;

    let (overrides, update_type) = match &cli.command {
        Commands::Check { overrides } => (overrides.clone(), None),
        Commands::Flexible { overrides } => (overrides.clone(), Some(UpdateType::Flexible)),
        Commands::Immediate { overrides } => (overrides.clone(), Some(UpdateType::Immediate)),
    };

    let mut scenario = match &cli.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::default(),
    };
    overrides.apply(&mut scenario);

    let host = if overrides.background {
        HostWindow::background("demo-screen")
    } else {
        HostWindow::foreground("demo-screen")
    };

    match update_type {
        None => cmd_check(scenario, json).await,
        Some(update_type) => cmd_update(scenario, update_type, &host, json).await,
    }
}

async fn cmd_check(scenario: Scenario, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let manager = SimUpdateManager::new(scenario);
    let info = manager.update_info().into_stream().first().await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "version_name": env!("CARGO_PKG_VERSION"),
                "version_code": VERSION_CODE,
                "update": info,
            })
        );
    } else {
        print_version();
        formatter::kv("Update availability", &info.availability.to_string());
        if let Some(code) = info.available_version_code {
            formatter::kv("Offered version code", &code.to_string());
        }
    }

    Ok(())
}

async fn cmd_update(
    scenario: Scenario,
    update_type: UpdateType,
    host: &HostWindow,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = UpdateCoordinator::new(SimUpdateManager::new(scenario));

    if !json {
        print_version();
    }

    match coordinator.request_update(update_type, host).await {
        Ok(UpdateOutcome::NotAvailable(availability)) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "requested": update_type,
                        "outcome": "not_available",
                        "availability": availability,
                    })
                );
            } else {
                formatter::info(&format!("no update to apply ({availability})"));
            }
            Ok(())
        }
        Ok(UpdateOutcome::FlowFinished(result)) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "requested": update_type,
                        "outcome": "flow_finished",
                        "result": result,
                    })
                );
            } else {
                let version = result
                    .version_code
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                formatter::success(&format!(
                    "{update_type} update flow finished (version code {version})"
                ));
            }
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "update request failed");
            Err(e.into())
        }
    }
}

fn print_version() {
    formatter::kv("Current version name", env!("CARGO_PKG_VERSION"));
    formatter::kv("Current version code", &VERSION_CODE.to_string());
}
