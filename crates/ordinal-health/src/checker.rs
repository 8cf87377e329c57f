//! Probe primitives: one HTTP check, and a tracker that turns a stream of
//! check results into a health verdict.

use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use http::{StatusCode, header};
use http_body_util::Empty;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

use crate::settings::HealthSettings;

const USER_AGENT: &str = "ordinal-health/0.1";
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Result of a single health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// The health endpoint returned 2xx.
    Healthy,
    /// The health endpoint returned non-2xx.
    Unhealthy,
    /// The probe could not be executed (connection error or timeout).
    Failed,
}

/// Verdict after a run of probe results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Neither threshold reached yet.
    Unknown,
    Healthy,
    Unhealthy,
}

/// Counts consecutive round results for one checkpoint.
///
/// Every failed round doubles the wait before the next one, up to a minute;
/// a healthy round resets it.
#[derive(Debug)]
pub struct HealthTracker {
    status: HealthStatus,
    successes: u32,
    failures: u32,
    healthy_threshold: u32,
    unhealthy_threshold: u32,
    interval: Duration,
    backoff: Duration,
}

impl HealthTracker {
    pub fn new(settings: &HealthSettings) -> Self {
        Self::with_thresholds(
            settings.unhealthy_threshold,
            settings.healthy_threshold,
            settings.interval,
        )
    }

    /// Zero thresholds are treated as one.
    pub fn with_thresholds(
        unhealthy_threshold: u32,
        healthy_threshold: u32,
        interval: Duration,
    ) -> Self {
        Self {
            status: HealthStatus::Unknown,
            successes: 0,
            failures: 0,
            healthy_threshold: healthy_threshold.max(1),
            unhealthy_threshold: unhealthy_threshold.max(1),
            interval,
            backoff: interval,
        }
    }

    /// Record a probe result and return the new verdict.
    pub fn record(&mut self, result: ProbeResult) -> HealthStatus {
        if result == ProbeResult::Healthy {
            self.on_success();
        } else {
            self.on_failure();
        }
        self.status
    }

    fn on_success(&mut self) {
        self.failures = 0;
        self.successes += 1;
        self.backoff = self.interval;
        if self.successes < self.healthy_threshold || self.status == HealthStatus::Healthy {
            return;
        }
        debug!(successes = self.successes, "cluster healthy");
        self.status = HealthStatus::Healthy;
    }

    fn on_failure(&mut self) {
        self.successes = 0;
        self.failures += 1;
        self.backoff = (self.backoff * 2).min(MAX_BACKOFF);
        if self.failures < self.unhealthy_threshold || self.status == HealthStatus::Unhealthy {
            return;
        }
        warn!(
            failures = self.failures,
            threshold = self.unhealthy_threshold,
            "cluster marked unhealthy"
        );
        self.status = HealthStatus::Unhealthy;
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    pub fn consecutive_successes(&self) -> u32 {
        self.successes
    }

    /// Wait before the next round.
    pub fn next_interval(&self) -> Duration {
        self.backoff
    }
}

/// `GET http://{address}{path}` with a deadline.
///
/// 2xx is `Healthy`, any other status `Unhealthy`; connection errors and
/// timeouts are `Failed`.
pub async fn http_probe(address: &str, path: &str, timeout: Duration) -> ProbeResult {
    let uri = format!("http://{address}{path}");
    match tokio::time::timeout(timeout, fetch_status(address, &uri)).await {
        Ok(Ok(status)) if status.is_success() => ProbeResult::Healthy,
        Ok(Ok(status)) => {
            debug!(%status, %uri, "replica answered non-2xx");
            ProbeResult::Unhealthy
        }
        Ok(Err(e)) => {
            debug!(error = %format!("{e:#}"), %uri, "health probe failed");
            ProbeResult::Failed
        }
        Err(_) => {
            debug!(%uri, ?timeout, "health probe timed out");
            ProbeResult::Failed
        }
    }
}

async fn fetch_status(address: &str, uri: &str) -> anyhow::Result<StatusCode> {
    let stream = TcpStream::connect(address).await.context("connect")?;
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .context("http handshake")?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            trace!(error = %e, "probe connection closed with error");
        }
    });

    let request = http::Request::get(uri)
        .header(header::HOST, address)
        .header(header::USER_AGENT, USER_AGENT)
        .body(Empty::<Bytes>::new())
        .context("building request")?;
    let response = sender.send_request(request).await.context("sending request")?;
    Ok(response.status())
}
