//! Sessions command - List and edit chat sessions.

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use tracing::info;

use hive_core::{ChatSession, Sender};

use super::Context;

#[derive(Args)]
pub struct SessionsArgs {
    #[command(subcommand)]
    command: SessionsCommand,
}

#[derive(Subcommand)]
enum SessionsCommand {
    /// List sessions, most recently updated first
    List {
        /// Maximum number of sessions to fetch
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Create a new session
    Create {
        /// Session title
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Show a session with its messages
    Show {
        /// Session ID
        id: String,
    },

    /// Rename a session
    Rename {
        /// Session ID
        id: String,
        /// New title
        title: String,
    },

    /// Pin a session to the top of the list
    Pin {
        /// Session ID
        id: String,
    },

    /// Unpin a session
    Unpin {
        /// Session ID
        id: String,
    },

    /// Delete a session
    Delete {
        /// Session ID
        id: String,
    },
}

pub async fn execute(args: SessionsArgs, ctx: &Context) -> Result<()> {
    match args.command {
        SessionsCommand::List { limit } => list(limit, ctx).await,
        SessionsCommand::Create { title } => {
            let state = ctx.state()?;
            let id = state
                .sync()
                .create_session(title)
                .await
                .context("Failed to create session")?;
            ctx.say(format!("✅ Created session {}", id));
            state.teardown().await;
            Ok(())
        }
        SessionsCommand::Show { id } => {
            let state = ctx.state()?;
            let view = state
                .sync()
                .open_session(&id)
                .await
                .with_context(|| format!("Failed to load session {}", id))?;
            print_session(&view);
            state.teardown().await;
            Ok(())
        }
        SessionsCommand::Rename { id, title } => {
            let state = ctx.state()?;
            state
                .sync()
                .rename_session(&id, title.clone())
                .await
                .with_context(|| format!("Failed to rename session {}", id))?;
            ctx.say(format!("✅ Renamed {} to \"{}\"", id, title));
            state.teardown().await;
            Ok(())
        }
        SessionsCommand::Pin { id } => set_pinned(&id, true, ctx).await,
        SessionsCommand::Unpin { id } => set_pinned(&id, false, ctx).await,
        SessionsCommand::Delete { id } => {
            let state = ctx.state()?;
            state
                .sync()
                .delete_session(&id)
                .await
                .with_context(|| format!("Failed to delete session {}", id))?;
            ctx.say(format!("🗑️  Deleted session {}", id));
            state.teardown().await;
            Ok(())
        }
    }
}

async fn list(limit: Option<usize>, ctx: &Context) -> Result<()> {
    let mut config = ctx.config()?;
    if let Some(limit) = limit {
        if limit == 0 {
            anyhow::bail!("Invalid argument: --limit must be at least 1");
        }
        config.session_list_limit = limit;
    }
    let state = ctx.state_from(config)?;

    let count = state
        .sync()
        .refresh_sessions()
        .await
        .context("Failed to list sessions")?;
    info!("Fetched {} sessions", count);

    let store = state.store().read().await;
    if store.session_count() == 0 {
        ctx.say("No sessions yet.");
    }
    // Pinned first; within each group the store keeps most recent first.
    let (pinned, rest): (Vec<_>, Vec<_>) = store.sessions().partition(|s| s.pinned);
    for session in pinned.into_iter().chain(rest) {
        println!(
            "{} {:<36}  {:<40}  {}",
            if session.pinned { "📌" } else { "  " },
            session.id,
            session.display_title(),
            session.updated_at.format("%Y-%m-%d %H:%M"),
        );
    }
    drop(store);
    state.teardown().await;
    Ok(())
}

async fn set_pinned(id: &str, pinned: bool, ctx: &Context) -> Result<()> {
    let state = ctx.state()?;
    state
        .sync()
        .set_pinned(id, pinned)
        .await
        .with_context(|| format!("Failed to update session {}", id))?;
    ctx.say(format!(
        "✅ {} session {}",
        if pinned { "Pinned" } else { "Unpinned" },
        id
    ));
    state.teardown().await;
    Ok(())
}

pub(crate) fn print_session(view: &ChatSession) {
    println!(
        "📋 {} ({})",
        view.title.as_deref().unwrap_or(hive_core::UNTITLED_SESSION),
        view.id
    );
    if let Some(agent) = &view.active_agent {
        println!("   Active agent: {}", agent);
    }
    println!();
    for message in &view.messages {
        println!(
            "[{}] {}: {}",
            message.timestamp.format("%H:%M:%S"),
            sender_label(message.sender, message.agent.as_deref()),
            message.text
        );
    }
}

pub(crate) fn sender_label(sender: Sender, agent: Option<&str>) -> String {
    match (sender, agent) {
        (Sender::User, _) => "you".to_string(),
        (Sender::Assistant, Some(agent)) => agent.to_string(),
        (Sender::Assistant, None) => "assistant".to_string(),
        (Sender::System, _) => "system".to_string(),
    }
}
