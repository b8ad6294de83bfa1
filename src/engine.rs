use anyhow::Result;
use chrono::{Local, Utc};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::{MonitorConfig, Target};
use crate::context::ContextProbe;
use crate::models::{CategoryResults, Snapshot, SnapshotStore, Status, Verdict};
use crate::outage::OutageLogger;

/// One TCP connect attempt. Every failure mode (refused, timeout,
/// unreachable) collapses to `Down`; nothing propagates.
pub async fn probe(host: &str, port: u16, timeout: Duration) -> Status {
    let addr = format!("{}:{}", host, port);
    match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(_)) => Status::Up,
        Ok(Err(_)) | Err(_) => Status::Down,
    }
}

/// Probe every target against `host` with at most `workers` connects in
/// flight. Verdict `i` always corresponds to target `i`.
pub async fn run_batch(
    host: &str,
    targets: &[Target],
    workers: usize,
    timeout: Duration,
) -> Vec<Verdict> {
    let limiter = Arc::new(Semaphore::new(workers.max(1)));
    let handles: Vec<_> = targets
        .iter()
        .map(|target| {
            let limiter = Arc::clone(&limiter);
            let host = host.to_string();
            let service = target.service.clone();
            let port = target.port;
            tokio::spawn(async move {
                let _permit = limiter.acquire_owned().await.ok();
                let status = probe(&host, port, timeout).await;
                Verdict { service, port, status }
            })
        })
        .collect();

    // A probe task that died still owes its target a verdict.
    join_all(handles)
        .await
        .into_iter()
        .zip(targets)
        .map(|(joined, target)| {
            joined.unwrap_or_else(|_| Verdict {
                service: target.service.clone(),
                port: target.port,
                status: Status::Down,
            })
        })
        .collect()
}

/// Counters from one completed cycle.
pub struct CycleReport {
    pub groups: usize,
    pub checks: usize,
    pub down: usize,
    pub next_interval: Duration,
}

/// Owns the repeating health-check cycle and publishes one [`Snapshot`]
/// per completed pass.
pub struct Monitor {
    config_path: PathBuf,
    store: Arc<SnapshotStore>,
    context: Arc<dyn ContextProbe>,
    fallback_interval: Duration,
}

impl Monitor {
    pub fn new(
        config_path: PathBuf,
        startup: &MonitorConfig,
        store: Arc<SnapshotStore>,
        context: Arc<dyn ContextProbe>,
    ) -> Self {
        Self {
            config_path,
            store,
            context,
            fallback_interval: Duration::from_secs(startup.check_interval),
        }
    }

    /// Run one full cycle: fresh config read, probe every group, route DOWN
    /// verdicts to the outage log, publish the snapshot.
    ///
    /// A config read/parse failure aborts the whole cycle and leaves the
    /// previous snapshot in place. A defective group only skips that group.
    pub async fn execute_cycle(&self) -> Result<CycleReport> {
        let config = MonitorConfig::load(&self.config_path)?;
        let logger = OutageLogger::new(config.log_directory.clone());
        let timeout = Duration::from_millis(config.probe_timeout_ms);

        let mut groups: BTreeMap<String, CategoryResults> = BTreeMap::new();
        let mut checks = 0usize;
        let mut down = 0usize;

        for (name, parsed) in config.service_groups() {
            let group = match parsed {
                Ok(group) => group,
                Err(err) => {
                    warn!("Skipping service-group '{}': {}", name, err);
                    continue;
                }
            };
            let host = match group.host_for(self.context.context()) {
                Ok(host) => host.to_string(),
                Err(err) => {
                    warn!("Skipping service-group '{}': {}", name, err);
                    continue;
                }
            };

            let mut results = CategoryResults::new();
            for (category, targets) in &group.categories {
                let verdicts = run_batch(&host, targets, config.max_workers, timeout).await;
                checks += verdicts.len();
                for verdict in &verdicts {
                    debug!(
                        "{}/{}: {} port {} is {}",
                        name, category, verdict.service, verdict.port, verdict.status
                    );
                    if verdict.status.is_down() {
                        down += 1;
                        warn!("{}: {} port {} is DOWN", name, verdict.service, verdict.port);
                        if let Err(err) = logger.record(name, verdict, Local::now()).await {
                            warn!("Failed to write outage log for '{}': {:#}", name, err);
                        }
                    }
                }
                results.insert(category.clone(), verdicts);
            }
            groups.insert(name.to_string(), results);
        }

        let group_count = groups.len();
        self.store
            .publish(Snapshot {
                groups,
                completed_at: Utc::now(),
            })
            .await;

        Ok(CycleReport {
            groups: group_count,
            checks,
            down,
            next_interval: Duration::from_secs(config.check_interval),
        })
    }

    /// Cycle until `shutdown` fires. An aborted cycle keeps the scheduler
    /// alive; it retries on the next tick.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        loop {
            let started = Instant::now();
            let wait = match self.execute_cycle().await {
                Ok(report) => {
                    info!(
                        "Cycle completed: {} groups, {} checks, {} down in {:.2}s. Next check in {}s.",
                        report.groups,
                        report.checks,
                        report.down,
                        started.elapsed().as_secs_f64(),
                        report.next_interval.as_secs()
                    );
                    report.next_interval
                }
                Err(err) => {
                    error!("Cycle aborted, keeping previous snapshot: {:#}", err);
                    self.fallback_interval
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => {
                    info!("Health-check scheduler stopped");
                    return Ok(());
                }
            }
        }
    }
}
