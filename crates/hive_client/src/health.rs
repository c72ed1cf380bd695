//! Backend health monitoring.
//!
//! A [`HealthMonitor`] runs in its own task and probes `GET /health` on a
//! fixed interval. Each probe is bounded by a timeout and its result is
//! classified into a [`ConnectionQuality`] and published on a watch channel.
//! After a failed probe the next one is scheduled by the reconnect backoff;
//! once the backoff is exhausted the monitor idles until
//! [`HealthMonitor::check_now`] is called.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::SessionApi;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::reconnect::ReconnectPolicy;

const EXCELLENT_BELOW: Duration = Duration::from_millis(100);
const GOOD_BELOW: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Poor,
    Offline,
}

impl ConnectionQuality {
    pub fn is_online(&self) -> bool {
        !matches!(self, Self::Offline)
    }
}

impl fmt::Display for ConnectionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Excellent => write!(f, "excellent"),
            Self::Good => write!(f, "good"),
            Self::Poor => write!(f, "poor"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Quality of a successful probe by its round-trip time.
pub fn classify_latency(latency: Duration) -> ConnectionQuality {
    if latency < EXCELLENT_BELOW {
        ConnectionQuality::Excellent
    } else if latency < GOOD_BELOW {
        ConnectionQuality::Good
    } else {
        ConnectionQuality::Poor
    }
}

/// Outcome of the most recent health probe
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub quality: ConnectionQuality,
    pub latency: Option<Duration>,
    /// `None` until the first probe has finished
    pub checked_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub error: Option<String>,
}

impl HealthReport {
    fn unchecked() -> Self {
        Self {
            quality: ConnectionQuality::Offline,
            latency: None,
            checked_at: None,
            consecutive_failures: 0,
            error: None,
        }
    }

    fn from_probe(result: &ClientResult<Duration>, consecutive_failures: u32) -> Self {
        match result {
            Ok(latency) => Self {
                quality: classify_latency(*latency),
                latency: Some(*latency),
                checked_at: Some(Utc::now()),
                consecutive_failures: 0,
                error: None,
            },
            Err(e) => Self {
                quality: ConnectionQuality::Offline,
                latency: None,
                checked_at: Some(Utc::now()),
                consecutive_failures,
                error: Some(e.to_string()),
            },
        }
    }

    pub fn is_online(&self) -> bool {
        self.quality.is_online()
    }
}

/// Run one health check bounded by `timeout`, returning the round-trip time.
pub async fn probe<A: SessionApi + ?Sized>(api: &A, timeout: Duration) -> ClientResult<Duration> {
    let started = Instant::now();
    match tokio::time::timeout(timeout, api.health()).await {
        Ok(Ok(())) => Ok(started.elapsed()),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(ClientError::Timeout(timeout)),
    }
}

#[derive(Debug, Clone, Copy)]
struct MonitorSettings {
    interval: Duration,
    timeout: Duration,
    reconnect: ReconnectPolicy,
}

/// Background health poller
pub struct HealthMonitor {
    reports: watch::Receiver<HealthReport>,
    trigger: Arc<Notify>,
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl HealthMonitor {
    /// Start polling `api` with the intervals from `config`.
    pub fn spawn<A>(api: Arc<A>, config: &ClientConfig) -> Self
    where
        A: SessionApi + ?Sized + 'static,
    {
        let settings = MonitorSettings {
            interval: config.health_interval,
            timeout: config.health_timeout,
            reconnect: config.reconnect,
        };
        let (report_tx, reports) = watch::channel(HealthReport::unchecked());
        let (stop, stop_rx) = watch::channel(false);
        let trigger = Arc::new(Notify::new());

        let handle = tokio::spawn(run(
            api,
            settings,
            report_tx,
            Arc::clone(&trigger),
            stop_rx,
        ));
        info!(interval = ?settings.interval, timeout = ?settings.timeout, "Health monitor started");

        Self {
            reports,
            trigger,
            stop,
            handle,
        }
    }

    /// A receiver that observes every published report.
    pub fn subscribe(&self) -> watch::Receiver<HealthReport> {
        self.reports.clone()
    }

    pub fn latest(&self) -> HealthReport {
        self.reports.borrow().clone()
    }

    /// Check immediately, cancelling any check in flight, and reset the
    /// reconnect backoff. Resolves with the next published report.
    pub async fn check_now(&self) -> ClientResult<HealthReport> {
        let mut reports = self.reports.clone();
        reports.borrow_and_update();
        self.trigger.notify_one();
        reports
            .changed()
            .await
            .map_err(|_| ClientError::Unavailable("health monitor stopped".to_string()))?;
        let report = reports.borrow().clone();
        Ok(report)
    }

    /// Stop the polling task and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Health monitor task ended abnormally");
        }
        debug!("Health monitor stopped");
    }
}

async fn run<A>(
    api: Arc<A>,
    settings: MonitorSettings,
    reports: watch::Sender<HealthReport>,
    trigger: Arc<Notify>,
    mut stop: watch::Receiver<bool>,
) where
    A: SessionApi + ?Sized,
{
    let mut backoff = settings.reconnect.backoff();
    let mut failures = 0u32;

    loop {
        let result = tokio::select! {
            result = probe(api.as_ref(), settings.timeout) => result,
            _ = trigger.notified() => {
                debug!("Manual health check supersedes the one in flight");
                backoff.reset();
                continue;
            }
            _ = stop.changed() => break,
        };

        let wait = match &result {
            Ok(latency) => {
                if failures > 0 {
                    info!(after = failures, "Backend reachable again");
                }
                failures = 0;
                backoff.reset();
                debug!(?latency, "Health check ok");
                Some(settings.interval)
            }
            Err(e) => {
                failures += 1;
                warn!(error = %e, failures, "Health check failed");
                backoff.next_delay()
            }
        };
        reports.send_replace(HealthReport::from_probe(&result, failures));

        match wait {
            Some(delay) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = trigger.notified() => backoff.reset(),
                    _ = stop.changed() => break,
                }
            }
            None => {
                warn!(failures, "Reconnect attempts exhausted, waiting for manual check");
                tokio::select! {
                    _ = trigger.notified() => backoff.reset(),
                    _ = stop.changed() => break,
                }
            }
        }
    }
}
