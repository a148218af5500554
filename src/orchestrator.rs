//! Probe orchestration: run the enabled probes in order, one at a time,
//! under progress reporting, and collect a [`ResultSet`].
//!
//! Per probe: not scheduled -> running -> completed | error. A failing probe
//! is recorded and the run moves on; only a malformed plan aborts the run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::AppConfig;
use crate::error::{ProbeError, StoreError};
use crate::notify::{self, DesktopNotifier, Notifier};
use crate::probes::{
    BandwidthMeter, CommandRunner, HttpBandwidthMeter, HttpIpLookup, ProbeAction, ProbeCommand,
    ProbeDefinition, PublicIpLookup, SystemRunner,
};
use crate::progress::{PhasedProgress, ProgressReporter, ProgressSink};
use crate::results::{Outcome, Payload, ProbeResult, ResultSet};

/// Fixed progress increments for the bandwidth probe's phases.
pub const DISCOVERY_STEP: u8 = 10;
pub const DOWNLOAD_STEP: u8 = 45;
pub const UPLOAD_STEP: u8 = 45;

pub struct Orchestrator {
    runner: Arc<dyn CommandRunner>,
    ip_lookup: Arc<dyn PublicIpLookup>,
    meter: Arc<dyn BandwidthMeter>,
    notifier: Arc<dyn Notifier>,
    progress: ProgressReporter,
}

impl Orchestrator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        ip_lookup: Arc<dyn PublicIpLookup>,
        meter: Arc<dyn BandwidthMeter>,
        notifier: Arc<dyn Notifier>,
        progress: ProgressReporter,
    ) -> Self {
        Self {
            runner,
            ip_lookup,
            meter,
            notifier,
            progress,
        }
    }

    /// Wire up the real OS runner, HTTP clients and desktop notifier.
    pub fn system(cfg: &AppConfig, sink: ProgressSink) -> Result<Self> {
        let ip_lookup = HttpIpLookup::new(cfg.probes.public_ip_url.clone(), cfg.probes.http_timeout())?;
        let meter = HttpBandwidthMeter::new(cfg.speedtest.clone())?;
        Ok(Self::new(
            Arc::new(SystemRunner),
            Arc::new(ip_lookup),
            Arc::new(meter),
            Arc::new(DesktopNotifier),
            ProgressReporter::new(sink, cfg.probes.tick_interval()),
        ))
    }

    /// Run every enabled probe of `plan` in order.
    ///
    /// Disabled entries are skipped. The returned set holds exactly one
    /// entry per enabled probe, in plan order. If it is non-empty it is
    /// handed to the notifier before returning.
    pub async fn run(
        &self,
        plan: &[ProbeDefinition],
        notifications_enabled: bool,
    ) -> Result<ResultSet, StoreError> {
        let enabled: Vec<&ProbeDefinition> = plan.iter().filter(|d| d.enabled).collect();

        let mut seen = HashSet::new();
        for def in &enabled {
            if !seen.insert(def.name()) {
                return Err(StoreError::DuplicateProbe(def.name().to_string()));
            }
        }

        let mut results = ResultSet::new();
        let span = info_span!("run", run_id = %results.run_id(), probes = enabled.len());

        async {
            info!("starting network diagnostics");
            for (task, def) in enabled.iter().enumerate() {
                let result = self.run_probe(task, def).await;
                results.insert(result)?;
            }

            if !results.is_empty() {
                notify::notify_completion(self.notifier.as_ref(), &results, notifications_enabled)
                    .await;
            }
            info!(count = results.len(), "network diagnostics completed");
            Ok::<(), StoreError>(())
        }
        .instrument(span)
        .await?;

        Ok(results)
    }

    async fn run_probe(&self, task: usize, def: &ProbeDefinition) -> ProbeResult {
        let kind = def.kind;
        self.progress.sink().start(task, kind.progress_label());
        let started = Instant::now();

        let (outcome, payload) = match &def.action {
            ProbeAction::Command(command) => self.run_command(task, command).await,
            ProbeAction::PublicIp { .. } => self.run_public_ip(task).await,
            ProbeAction::Bandwidth => {
                return self.run_bandwidth(task, def).await;
            }
        };

        let result = ProbeResult::new(kind, outcome, started.elapsed(), payload);
        log_result(&result);
        result
    }

    async fn run_command(&self, task: usize, command: &ProbeCommand) -> (Outcome, Payload) {
        let runner = Arc::clone(&self.runner);
        let owned = command.clone();

        info!(command = %command, "starting command");
        let res = self
            .progress
            .track(task, async move { runner.run(&owned).await })
            .await
            .and_then(|inner| inner);
        info!(command = %command, "command completed");

        match res {
            Ok(out) if out.success() => (Outcome::Passed, Payload::None),
            Ok(out) => {
                warn!(command = %command, exit_code = ?out.exit_code, "command failed");
                (Outcome::Failed, Payload::None)
            }
            Err(e) => error_outcome(e),
        }
    }

    async fn run_public_ip(&self, task: usize) -> (Outcome, Payload) {
        let lookup = Arc::clone(&self.ip_lookup);
        let res = self
            .progress
            .track(task, async move { lookup.lookup().await })
            .await
            .and_then(|inner| inner);

        match res {
            Ok(ip) => (Outcome::Completed, Payload::PublicIp { ip }),
            Err(e) => error_outcome(e),
        }
    }

    /// Discovery, download, upload; progress moves 10/45/45 as each phase
    /// finishes. Timing starts once a server has been picked.
    async fn run_bandwidth(&self, task: usize, def: &ProbeDefinition) -> ProbeResult {
        let sink = self.progress.sink();
        let mut phased = PhasedProgress::new(sink, task);
        let probe_start = Instant::now();

        let measured = async {
            let server = self.meter.discover_server().await?;
            phased.advance(DISCOVERY_STEP, "Preparing Speedtest...");
            let timed_from = Instant::now();

            let download_mbps = self.meter.download().await?;
            phased.advance(DOWNLOAD_STEP, "Running Speedtest: Download");

            let upload_mbps = self.meter.upload().await?;
            phased.advance(UPLOAD_STEP, "Running Speedtest: Upload");

            Ok::<_, ProbeError>((
                timed_from.elapsed(),
                Payload::Bandwidth {
                    download_mbps,
                    upload_mbps,
                    ping_ms: server.latency_ms,
                },
            ))
        }
        .await;

        let result = match measured {
            Ok((duration, payload)) => {
                phased.complete("Speedtest completed");
                ProbeResult::new(def.kind, Outcome::Completed, duration, payload)
            }
            Err(e) => {
                phased.complete("Speedtest failed");
                let (outcome, payload) = error_outcome(e);
                ProbeResult::new(def.kind, outcome, probe_start.elapsed(), payload)
            }
        };
        log_result(&result);
        result
    }
}

fn error_outcome(e: ProbeError) -> (Outcome, Payload) {
    (
        Outcome::Error,
        Payload::Error {
            message: e.to_string(),
        },
    )
}

fn log_result(result: &ProbeResult) {
    if result.outcome.is_success() {
        info!(probe = %result.name, outcome = %result.outcome, duration = ?result.duration, "probe completed successfully");
    } else {
        error!(probe = %result.name, outcome = %result.outcome, payload = ?result.payload, "probe failed");
    }
}
