use std::{
    any::Any,
    future::Future,
    panic::AssertUnwindSafe,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures_util::{stream, FutureExt, StreamExt};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;

use crate::{
    adapters::{adapter_for, build_client, Adapter, AdapterError, ErrorClass, FetchContext},
    app_state::AppState,
    config::{Config, CycleConfig, UpstreamConfig},
    logging::{error_chain, logger},
    model::{NowPlaying, StationRecord},
    one_liner::compose,
    registry::{Registry, StationConfig},
    render::render_page,
    report::{build_notifier, write_error_log, ErrorReport, Notifier, StationFailure},
    snapshot::{EncodedSnapshot, Snapshot, SnapshotStore},
    status::classify,
};

/// Resolves a station name to its adapter.
pub type AdapterLookup = fn(&str) -> Option<Arc<dyn Adapter>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub stations: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timeouts: usize,
    pub decode_errors: usize,
    pub other_errors: usize,
}

pub struct CycleOutcome {
    pub snapshot: Snapshot,
    pub report: ErrorReport,
    pub summary: CycleSummary,
}

/// Polls every registered station once and merges the results over the
/// previous snapshot.
pub struct Aggregator {
    registry: Registry,
    client: Client,
    upstream: Arc<UpstreamConfig>,
    cycle: CycleConfig,
    lookup: AdapterLookup,
}

impl Aggregator {
    pub fn new(
        registry: Registry,
        upstream: UpstreamConfig,
        cycle: CycleConfig,
    ) -> anyhow::Result<Self> {
        let client = build_client(&upstream).context("failed to build http client")?;
        Ok(Self {
            registry,
            client,
            upstream: Arc::new(upstream),
            cycle,
            lookup: adapter_for,
        })
    }

    pub fn with_adapters(mut self, lookup: AdapterLookup) -> Self {
        self.lookup = lookup;
        self
    }

    pub async fn run_cycle(&self, previous: &Snapshot) -> CycleOutcome {
        let started_at = Utc::now();
        let clock = Instant::now();
        let ctx = FetchContext::new(self.client.clone(), self.upstream.clone(), started_at);
        let stations = self.registry.stations();

        logger().info(
            "cycle.started",
            json!({
                "stations": stations.len(),
                "concurrency": self.cycle.concurrency,
            }),
        );

        let mut results = stream::iter(stations.iter().enumerate())
            .map(|(index, station)| {
                let ctx = &ctx;
                let prior = previous
                    .get(&station.name)
                    .map(|record| record.to_now_playing(station));
                async move { (index, self.poll(ctx, station, prior.as_ref()).await) }
            })
            .buffer_unordered(self.cycle.concurrency.max(1))
            .collect::<Vec<_>>()
            .await;
        results.sort_by_key(|(index, _)| *index);

        let mut snapshot = Snapshot::new();
        let mut report = ErrorReport::default();
        for ((_, result), station) in results.into_iter().zip(stations) {
            let record = match result {
                Ok(record) => StationRecord::from_now_playing(station, &record),
                Err(error) => {
                    report.push(StationFailure::new(&station.name, &error, Utc::now()));
                    previous
                        .get(&station.name)
                        .cloned()
                        .unwrap_or_else(|| StationRecord::initial(station))
                }
            };
            snapshot.insert(station.name.clone(), record);
        }

        let finished_at = Utc::now();
        let summary = CycleSummary {
            started_at,
            finished_at,
            duration_ms: clock.elapsed().as_millis() as u64,
            stations: stations.len(),
            succeeded: stations.len() - report.len(),
            failed: report.len(),
            timeouts: report.count(ErrorClass::Timeout),
            decode_errors: report.count(ErrorClass::Decode),
            other_errors: report.count(ErrorClass::Other),
        };
        logger().info("cycle.completed", &summary);

        CycleOutcome {
            snapshot,
            report,
            summary,
        }
    }

    async fn poll(
        &self,
        ctx: &FetchContext,
        station: &StationConfig,
        previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        let started = Instant::now();
        let result = match (self.lookup)(&station.name) {
            Some(adapter) => {
                let deadline = self.cycle.adapter_timeout();
                let fetch =
                    AssertUnwindSafe(adapter.fetch(ctx, station, previous)).catch_unwind();
                match tokio::time::timeout(deadline, fetch).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(panic)) => Err(AdapterError::Panicked(panic_message(panic.as_ref()))),
                    Err(_) => Err(AdapterError::Timeout(deadline)),
                }
            }
            None => Err(AdapterError::Unsupported),
        };
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(record) => {
                let record = finalize(record, station, Utc::now());
                logger().debug(
                    "adapter.completed",
                    json!({
                        "station": station.name,
                        "status": record.status,
                        "durationMs": duration_ms,
                    }),
                );
                Ok(record)
            }
            Err(error) => {
                logger().warn(
                    "adapter.failed",
                    json!({
                        "station": station.name,
                        "class": error.class(),
                        "error": error_chain(&error),
                        "durationMs": duration_ms,
                    }),
                );
                Err(error)
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// Stamps a fresh adapter record and derives its one-liner and final status.
pub fn finalize(mut record: NowPlaying, station: &StationConfig, now: DateTime<Utc>) -> NowPlaying {
    record.last_updated_at = Some(now);
    let line = compose(&record);
    record.one_liner = (!line.is_empty()).then_some(line);
    record.status = classify(&record, &station.name, now.date_naive());
    record
}

/// Owns the snapshot between cycles and fans each result out to disk, the
/// page, the error log, the notifier and the HTTP state.
pub struct Coordinator {
    aggregator: Aggregator,
    store: SnapshotStore,
    error_log_path: PathBuf,
    index_html_path: Option<PathBuf>,
    notifier: Arc<dyn Notifier>,
    state: AppState,
    interval: Duration,
    current: Snapshot,
}

impl Coordinator {
    pub fn new(
        aggregator: Aggregator,
        store: SnapshotStore,
        notifier: Arc<dyn Notifier>,
        state: AppState,
        config: &Config,
        current: Snapshot,
    ) -> Self {
        Self {
            aggregator,
            store,
            error_log_path: config.error_log_path.clone(),
            index_html_path: config.index_html_path.clone(),
            notifier,
            state,
            interval: config.cycle.interval(),
            current,
        }
    }

    /// Wires everything from the configuration, starting from `initial`.
    pub fn from_config(
        config: &Config,
        registry: Registry,
        state: AppState,
        initial: Snapshot,
    ) -> anyhow::Result<Self> {
        let aggregator = Aggregator::new(registry, config.upstream.clone(), config.cycle.clone())?;
        let notifier =
            build_notifier(config.notifier.as_ref()).context("failed to configure notifier")?;
        Ok(Self::new(
            aggregator,
            SnapshotStore::new(&config.snapshot_path),
            notifier,
            state,
            config,
            initial,
        ))
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.current
    }

    /// Runs one full cycle. Only encoding the snapshot can fail; every later
    /// step logs its own failure and the cycle carries on.
    pub async fn run_once(&mut self) -> anyhow::Result<CycleSummary> {
        let outcome = self.aggregator.run_cycle(&self.current).await;
        let encoded =
            EncodedSnapshot::new(&outcome.snapshot).context("failed to encode snapshot")?;

        if let Err(err) = self.store.save(&encoded).await {
            log_step_failure("snapshot.save_failed", &err);
        }
        if let Some(path) = &self.index_html_path {
            if let Err(err) = render_page(path, &outcome.snapshot).await {
                log_step_failure("render.failed", &err);
            }
        }
        if let Err(err) = write_error_log(&self.error_log_path, &outcome.report).await {
            log_step_failure("error_log.write_failed", &err);
        }
        if outcome.report.needs_notification() {
            if let Err(err) = self.notifier.notify(&outcome.report).await {
                log_step_failure("notifier.failed", &err);
            }
        }

        self.state
            .publish(outcome.snapshot.clone(), encoded, outcome.summary.clone())
            .await;
        self.current = outcome.snapshot;
        Ok(outcome.summary)
    }

    /// Cycles until `shutdown` resolves. A running cycle always completes.
    pub async fn run_forever<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            if let Err(err) = self.run_once().await {
                logger().error(
                    "cycle.failed",
                    json!({ "error": format!("{err:#}") }),
                );
            }
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        logger().info("cycle.stopped", json!({}));
    }
}

fn log_step_failure(event: &str, error: &(dyn std::error::Error + 'static)) {
    logger().error(event, json!({ "error": error_chain(error) }));
}
