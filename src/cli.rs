//! Command-Line Interface
//! Argument definitions for the in-app update demo binary

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::updater::manager::UpdateAvailability;
use crate::updater::sim::{FlowScript, Scenario};

pub mod formatter;

#[derive(Parser, Debug)]
#[command(name = "inapp-updater-demo")]
#[command(author = "InAppUpdater Team")]
#[command(version)]
#[command(about = "In-app update demo: flexible and immediate update flows", long_about = None)]
pub struct Cli {
    /// Scenario file describing how the scripted store behaves
    #[arg(short, long, global = true)]
    pub scenario: Option<PathBuf>,

    /// Output format (json for scripting)
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check update availability without starting a flow
    Check {
        #[command(flatten)]
        overrides: ScenarioOverrides,
    },

    /// Request an update with the flexible (background download) flow
    Flexible {
        #[command(flatten)]
        overrides: ScenarioOverrides,
    },

    /// Request an update with the immediate (blocking UI) flow
    Immediate {
        #[command(flatten)]
        overrides: ScenarioOverrides,
    },
}

/// Inline scenario tweaks layered over the loaded scenario file.
#[derive(clap::Args, Debug, Clone)]
pub struct ScenarioOverrides {
    /// Availability the scripted store reports
    #[arg(long, value_enum)]
    pub availability: Option<AvailabilityArg>,

    /// Version code the scripted store offers
    #[arg(long)]
    pub version_code: Option<u64>,

    /// What the scripted store does when the flow starts
    #[arg(long, value_enum)]
    pub flow: Option<FlowArg>,

    /// Artificial latency for each store step, in milliseconds
    #[arg(long)]
    pub latency_ms: Option<u64>,

    /// Run with the host window in the background
    #[arg(long)]
    pub background: bool,
}

impl ScenarioOverrides {
    pub fn apply(&self, scenario: &mut Scenario) {
        if let Some(availability) = self.availability {
            scenario.availability = availability.into();
        }
        if let Some(version_code) = self.version_code {
            scenario.version_code = Some(version_code);
        }
        if let Some(flow) = self.flow {
            scenario.flow = flow.into();
        }
        if let Some(latency_ms) = self.latency_ms {
            scenario.latency_ms = latency_ms;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AvailabilityArg {
    Unknown,
    NotAvailable,
    Available,
    InProgress,
}

impl From<AvailabilityArg> for UpdateAvailability {
    fn from(arg: AvailabilityArg) -> Self {
        match arg {
            AvailabilityArg::Unknown => Self::Unknown,
            AvailabilityArg::NotAvailable => Self::NotAvailable,
            AvailabilityArg::Available => Self::Available,
            AvailabilityArg::InProgress => Self::InProgress,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FlowArg {
    Accept,
    Cancel,
    Fail,
    Abandon,
}

impl From<FlowArg> for FlowScript {
    fn from(arg: FlowArg) -> Self {
        match arg {
            FlowArg::Accept => Self::Accept,
            FlowArg::Cancel => Self::Cancel,
            FlowArg::Fail => Self::Fail,
            FlowArg::Abandon => Self::Abandon,
        }
    }
}
