//! Health command - Check backend health.

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::info;

use hive_client::{classify_latency, probe, HealthReport};

use super::Context;

#[derive(Args)]
pub struct HealthArgs {
    /// Keep polling and print every report until interrupted
    #[arg(short, long)]
    watch: bool,
}

pub async fn execute(args: HealthArgs, ctx: &Context) -> Result<()> {
    let state = ctx.state()?;

    if !args.watch {
        let timeout = state.config().health_timeout;
        let latency = probe(state.api().as_ref(), timeout)
            .await
            .with_context(|| format!("Health check against {} failed", state.config().api_base_url))?;
        println!(
            "🟢 {} ({} ms)",
            classify_latency(latency),
            latency.as_millis()
        );
        state.teardown().await;
        return Ok(());
    }

    let state = state.with_health_monitor();
    let mut reports = match state.health() {
        Some(monitor) => monitor.subscribe(),
        None => anyhow::bail!("Health monitor did not start"),
    };
    info!("Watching {} (Ctrl+C to stop)", state.config().api_base_url);

    loop {
        tokio::select! {
            changed = reports.changed() => {
                if changed.is_err() {
                    break;
                }
                let report = reports.borrow_and_update().clone();
                println!("{}", format_report(&report));
            }
            _ = tokio::signal::ctrl_c() => {
                ctx.say("Stopping health watch");
                break;
            }
        }
    }

    state.teardown().await;
    Ok(())
}

fn format_report(report: &HealthReport) -> String {
    let at = report
        .checked_at
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());
    match (&report.latency, &report.error) {
        (Some(latency), _) => format!(
            "[{}] 🟢 {} ({} ms)",
            at,
            report.quality,
            latency.as_millis()
        ),
        (None, Some(error)) => format!(
            "[{}] 🔴 offline, {} consecutive failures: {}",
            at, report.consecutive_failures, error
        ),
        (None, None) => format!("[{}] ⚪ {}", at, report.quality),
    }
}
