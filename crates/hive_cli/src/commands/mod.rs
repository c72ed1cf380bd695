//! CLI command definitions.
//!
//! Each subcommand maps to one group of client operations. Commands share a
//! [`Context`] built from the global flags.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

use hive_client::{AppState, ClientConfig};

pub mod health;
pub mod normalize;
pub mod prefs;
pub mod send;
pub mod sessions;

/// AgentHive - multi-agent chat sessions from the terminal
#[derive(Parser)]
#[command(name = "hive")]
#[command(version, about = "AgentHive - multi-agent chat sessions from the terminal")]
#[command(long_about = r#"
Command-line client for an AgentHive backend. Lists and edits chat sessions,
sends messages to agents, watches backend health and manages layout
preferences.

COMMANDS:
  sessions   → List, create, show, rename, pin and delete sessions
  send       → Send a message to the active or a given session
  health     → Check backend health once or continuously
  normalize  → Normalize a dump of backend messages
  prefs      → Show or change layout preferences

CONFIGURATION:
  .agenthive/settings.json, AGENTHIVE_API_BASE_URL, AGENTHIVE_AUTH_ENABLED

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Connection error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Backend base URL (overrides settings and environment)
    #[arg(long, global = true, env = "AGENTHIVE_API_BASE_URL")]
    pub api_url: Option<String>,

    /// Use an in-process backend instead of the network
    #[arg(long, global = true)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage chat sessions
    Sessions(sessions::SessionsArgs),

    /// Send a message to an agent
    Send(send::SendArgs),

    /// Check backend health
    Health(health::HealthArgs),

    /// Normalize a JSON file of backend messages
    Normalize(normalize::NormalizeArgs),

    /// Show or change layout preferences
    Prefs(prefs::PrefsArgs),
}

/// Settings shared by every command
pub struct Context {
    pub quiet: bool,
    pub api_url: Option<String>,
    pub offline: bool,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            quiet: cli.quiet,
            api_url: cli.api_url.clone(),
            offline: cli.offline,
        }
    }

    pub fn workspace_root(&self) -> Result<PathBuf> {
        std::env::current_dir().context("Failed to determine current directory")
    }

    /// Client configuration with the `--api-url` flag applied last.
    pub fn config(&self) -> Result<ClientConfig> {
        let root = self.workspace_root()?;
        let config = ClientConfig::load(&root).context("Failed to load client configuration")?;
        match &self.api_url {
            Some(url) => Ok(config.with_api_base_url(url.clone()).validate()?),
            None => Ok(config),
        }
    }

    pub fn state(&self) -> Result<AppState> {
        self.state_from(self.config()?)
    }

    pub fn state_from(&self, config: ClientConfig) -> Result<AppState> {
        if self.offline {
            return Ok(AppState::offline(config));
        }
        Ok(AppState::connect(config)?)
    }

    /// Print unless `--quiet` was given.
    pub fn say(&self, line: impl std::fmt::Display) {
        if !self.quiet {
            println!("{}", line);
        }
    }
}
