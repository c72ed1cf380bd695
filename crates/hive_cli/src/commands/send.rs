//! Send command - Send a message to an agent.

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::{debug, info};

use hive_core::{AddOutcome, Sender};

use super::sessions::sender_label;
use super::Context;

#[derive(Args)]
pub struct SendArgs {
    /// Message text
    text: String,

    /// Session to send to (a new session is created when omitted)
    #[arg(short, long)]
    session: Option<String>,

    /// Address a specific agent instead of letting the backend route
    #[arg(short, long)]
    agent: Option<String>,
}

pub async fn execute(args: SendArgs, ctx: &Context) -> Result<()> {
    if args.text.trim().is_empty() {
        anyhow::bail!("Invalid argument: message text is empty");
    }

    let state = ctx.state()?;
    let sync = state.sync();

    if let Some(id) = &args.session {
        sync.open_session(id)
            .await
            .with_context(|| format!("Failed to open session {}", id))?;
    }

    let outcome = sync
        .send_message(&args.text, args.agent.clone())
        .await
        .context("Failed to send message")?;

    let session_id = outcome.session_id().to_string();
    match &outcome {
        AddOutcome::Duplicate { existing_id, .. } => {
            ctx.say(format!(
                "⚠️  Same message was just sent ({}), not sending again",
                existing_id
            ));
        }
        AddOutcome::Added { session, .. } => {
            if session.is_new() {
                info!("Started session {}", session_id);
            }
            ctx.say(format!("✅ Sent to session {}", session_id));
        }
    }

    // Replies are streamed by the backend; show whatever has arrived already.
    match sync.open_session(&session_id).await {
        Ok(view) => {
            let replies = view
                .messages
                .iter()
                .rev()
                .take_while(|m| m.sender != Sender::User)
                .collect::<Vec<_>>();
            for reply in replies.into_iter().rev() {
                println!(
                    "{}: {}",
                    sender_label(reply.sender, reply.agent.as_deref()),
                    reply.text
                );
            }
        }
        Err(e) => debug!("Could not refresh session after send: {}", e),
    }

    state.teardown().await;
    Ok(())
}
