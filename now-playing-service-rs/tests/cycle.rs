use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use mockito::Matcher;
use now_playing_service::{
    adapters::{adapter_for, Adapter, AdapterError, ErrorClass, FetchContext},
    app_state::AppState,
    config::{Config, CycleConfig, UpstreamConfig},
    cycle::{finalize, Aggregator, Coordinator},
    model::{NowPlaying, StationRecord, Status},
    registry::{Registry, StationConfig},
    report::{ErrorReport, NotifyError, Notifier},
    snapshot::{encode, etag, Snapshot, SnapshotStore},
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

const LOGO_BASE: &str = "https://internetradioprotocol.org/";

fn registry(stations: Value) -> Registry {
    Registry::from_json(&stations.to_string(), LOGO_BASE).unwrap()
}

fn aggregator(registry: Registry) -> Aggregator {
    Aggregator::new(registry, UpstreamConfig::default(), CycleConfig::default()).unwrap()
}

#[tokio::test]
async fn decode_error_keeps_previous_record_byte_identical() {
    let mut server = mockito::Server::new_async().await;
    let ipr = server
        .mock("GET", "/ipr")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"nowplaying": "Morning Mix"}).to_string())
        .create_async()
        .await;
    let mutant = server
        .mock("GET", "/mutant")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html>maintenance</html>")
        .create_async()
        .await;

    let registry = registry(json!([
        {"name": "Internet Public Radio", "logo": "logos/internet.png", "infoLink": format!("{}/ipr", server.url())},
        {"name": "Mutant Radio", "logo": "logos/mutant.jpg", "infoLink": format!("{}/mutant", server.url())}
    ]));
    let mutant_station = registry.get("Mutant Radio").unwrap().clone();
    let earlier = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
    let prior = finalize(
        NowPlaying::for_station(&mutant_station).with_title(Some("Old Show".into())),
        &mutant_station,
        earlier,
    );
    let mut previous = Snapshot::new();
    previous.insert(
        "Mutant Radio".into(),
        StationRecord::from_now_playing(&mutant_station, &prior),
    );
    let before = encode(&previous["Mutant Radio"]).unwrap();

    let outcome = aggregator(registry).run_cycle(&previous).await;

    assert_eq!(encode(&outcome.snapshot["Mutant Radio"]).unwrap(), before);
    let failures = outcome.report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].station, "Mutant Radio");
    assert_eq!(failures[0].class, ErrorClass::Decode);

    let fresh = &outcome.snapshot["Internet Public Radio"];
    assert_eq!(fresh.now_playing.as_deref(), Some("Morning Mix"));
    assert_eq!(fresh.one_liner.as_deref(), Some("Morning Mix"));
    assert_eq!(fresh.status, Some(Status::Live));
    assert_eq!(
        fresh.logo.as_deref(),
        Some("https://internetradioprotocol.org/logos/internet.png")
    );
    assert!(fresh.last_updated.is_some());

    assert_eq!(outcome.summary.succeeded, 1);
    assert_eq!(outcome.summary.decode_errors, 1);
    ipr.assert_async().await;
    mutant.assert_async().await;
}

#[tokio::test]
async fn failing_new_station_gets_blank_record() {
    let mut server = mockito::Server::new_async().await;
    let _down = server
        .mock("GET", "/soma")
        .with_status(503)
        .create_async()
        .await;

    let registry = registry(json!([
        {"name": "SomaFM Live", "logo": "logos/soma.png", "infoLink": format!("{}/soma", server.url()), "location": "San Francisco"}
    ]));
    let outcome = aggregator(registry).run_cycle(&Snapshot::new()).await;

    let record = &outcome.snapshot["SomaFM Live"];
    assert_eq!(record.status, None);
    assert_eq!(record.now_playing, None);
    assert_eq!(record.location.as_deref(), Some("San Francisco"));
    assert_eq!(outcome.report.failures()[0].class, ErrorClass::Decode);
}

#[tokio::test]
async fn stations_dropped_from_registry_leave_the_snapshot() {
    let registry = registry(json!([{"name": "Radio Plato", "logo": "logos/plato.png"}]));
    let gone: StationConfig =
        serde_json::from_value(json!({"name": "Closed FM", "logo": "x.png"})).unwrap();
    let mut previous = Snapshot::new();
    previous.insert("Closed FM".into(), StationRecord::initial(&gone));

    let outcome = aggregator(registry).run_cycle(&previous).await;
    assert_eq!(
        outcome.snapshot.keys().collect::<Vec<_>>(),
        vec!["Radio Plato"]
    );
    assert_eq!(outcome.snapshot["Radio Plato"].status, Some(Status::Live));
}

#[tokio::test]
async fn calendar_station_uses_first_running_event() {
    let mut server = mockito::Server::new_async().await;
    let now = Utc::now();
    let window = |from: i64, to: i64| {
        json!({
            "start": {"dateTime": (now + ChronoDuration::minutes(from)).to_rfc3339()},
            "end": {"dateTime": (now + ChronoDuration::minutes(to)).to_rfc3339()}
        })
    };
    let mut current = window(-30, 30);
    current["summary"] = json!("Sunday Session");
    let mut later = window(120, 180);
    later["summary"] = json!("Late Show");

    let calendar = server
        .mock(
            "GET",
            Matcher::Regex(r"^/calendars/nopal(%40|@)group\.calendar\.google\.com/events".into()),
        )
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("key".into(), "test-key".into()),
            Matcher::UrlEncoded("maxResults".into(), "3".into()),
            Matcher::UrlEncoded("singleEvents".into(), "true".into()),
            Matcher::UrlEncoded("orderBy".into(), "startTime".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"items": [current, later]}).to_string())
        .create_async()
        .await;

    let registry = registry(json!([
        {"name": "Radio Nopal", "logo": "logos/nopal.png", "infoLink": "nopal@group.calendar.google.com"}
    ]));
    let upstream = UpstreamConfig {
        calendar_base_url: server.url(),
        calendar_api_key: Some("test-key".into()),
        ..UpstreamConfig::default()
    };
    let aggregator = Aggregator::new(registry, upstream, CycleConfig::default()).unwrap();
    let outcome = aggregator.run_cycle(&Snapshot::new()).await;

    assert!(outcome.report.is_empty());
    let record = &outcome.snapshot["Radio Nopal"];
    assert_eq!(record.now_playing.as_deref(), Some("Sunday Session"));
    assert_eq!(record.status, Some(Status::Live));
    calendar.assert_async().await;
}

#[tokio::test]
async fn calendar_without_api_key_is_reported() {
    let registry = registry(json!([
        {"name": "Fault Radio", "logo": "logos/fault.png", "infoLink": "fault@group.calendar.google.com"}
    ]));
    let outcome = aggregator(registry).run_cycle(&Snapshot::new()).await;
    let failure = &outcome.report.failures()[0];
    assert_eq!(failure.class, ErrorClass::Other);
    assert_eq!(failure.chain, vec!["GOOGLE_CALENDAR_API_KEY is not configured"]);
}

struct Stalled;

#[async_trait]
impl Adapter for Stalled {
    async fn fetch(
        &self,
        _ctx: &FetchContext,
        station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(NowPlaying::for_station(station))
    }
}

fn stalled_only(name: &str) -> Option<Arc<dyn Adapter>> {
    (name == "Stuck FM").then(|| Arc::new(Stalled) as Arc<dyn Adapter>)
}

#[tokio::test]
async fn slow_and_unknown_stations_fail_alone() {
    let registry = registry(json!([
        {"name": "Stuck FM", "logo": "x.png"},
        {"name": "Nowhere FM", "logo": "y.png"}
    ]));
    let cycle = CycleConfig {
        adapter_timeout_ms: 50,
        ..CycleConfig::default()
    };
    let aggregator = Aggregator::new(registry, UpstreamConfig::default(), cycle)
        .unwrap()
        .with_adapters(stalled_only);

    let outcome = aggregator.run_cycle(&Snapshot::new()).await;
    let classes: Vec<_> = outcome
        .report
        .failures()
        .iter()
        .map(|failure| (failure.station.as_str(), failure.class))
        .collect();
    assert_eq!(
        classes,
        vec![("Stuck FM", ErrorClass::Timeout), ("Nowhere FM", ErrorClass::Other)]
    );
    assert_eq!(outcome.snapshot.len(), 2);
}

struct Exploding;

#[async_trait]
impl Adapter for Exploding {
    async fn fetch(
        &self,
        _ctx: &FetchContext,
        _station: &StationConfig,
        _previous: Option<&NowPlaying>,
    ) -> Result<NowPlaying, AdapterError> {
        panic!("upstream sent nonsense")
    }
}

fn exploding_for_boom(name: &str) -> Option<Arc<dyn Adapter>> {
    if name == "Boom FM" {
        Some(Arc::new(Exploding))
    } else {
        adapter_for(name)
    }
}

#[tokio::test]
async fn panicking_adapter_fails_alone() {
    let registry = registry(json!([
        {"name": "Boom FM", "logo": "x.png"},
        {"name": "Radio Plato", "logo": "logos/plato.png"}
    ]));
    let aggregator = aggregator(registry).with_adapters(exploding_for_boom);

    let outcome = aggregator.run_cycle(&Snapshot::new()).await;
    let failure = &outcome.report.failures()[0];
    assert_eq!(outcome.report.len(), 1);
    assert_eq!(failure.station, "Boom FM");
    assert_eq!(failure.class, ErrorClass::Other);
    assert_eq!(failure.chain, vec!["adapter panicked: upstream sent nonsense"]);
    assert_eq!(outcome.snapshot["Boom FM"].status, None);
    assert_eq!(outcome.snapshot["Radio Plato"].status, Some(Status::Live));
}

#[tokio::test]
async fn rinse_episode_with_absurd_length_does_not_disturb_neighbours() {
    let mut server = mockito::Server::new_async().await;
    let now = Utc::now();
    let _rinse = server
        .mock("GET", "/rinse")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"episodes": [{
                "channel": [{"slug": "uk"}],
                "title": "Endless",
                "episodeTime": now.to_rfc3339(),
                "episodeDate": now.to_rfc3339(),
                "episodeLength": 100_000_000_000_000_000_i64
            }]})
            .to_string(),
        )
        .create_async()
        .await;
    let _ipr = server
        .mock("GET", "/ipr")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"nowplaying": "Morning Mix"}).to_string())
        .create_async()
        .await;

    let registry = registry(json!([
        {"name": "Rinse UK", "logo": "logos/rinse.png", "infoLink": format!("{}/rinse", server.url())},
        {"name": "Internet Public Radio", "logo": "logos/internet.png", "infoLink": format!("{}/ipr", server.url())}
    ]));
    let outcome = aggregator(registry).run_cycle(&Snapshot::new()).await;

    assert!(outcome.report.is_empty());
    assert_eq!(outcome.snapshot["Rinse UK"].now_playing, None);
    assert_eq!(
        outcome.snapshot["Internet Public Radio"].now_playing.as_deref(),
        Some("Morning Mix")
    );
}

#[derive(Default)]
struct RecordingNotifier {
    reports: Mutex<Vec<ErrorReport>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, report: &ErrorReport) -> Result<(), NotifyError> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

#[tokio::test]
async fn coordinator_fans_out_one_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("index.html");
    std::fs::write(&index, "<html><head><title>IRP</title></head><body></body></html>").unwrap();

    let mut server = mockito::Server::new_async().await;
    let _soma = server
        .mock("GET", "/soma")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"songs": []}).to_string())
        .create_async()
        .await;
    let registry = registry(json!([
        {"name": "SomaFM Live", "logo": "logos/soma.png", "infoLink": format!("{}/soma", server.url())},
        {"name": "Radio Plato", "logo": "logos/plato.png"}
    ]));

    let config = Config {
        port: 0,
        snapshot_path: dir.path().join("info.json"),
        stations_file: None,
        error_log_path: dir.path().join("errorlog.txt"),
        index_html_path: Some(index.clone()),
        logo_base_url: LOGO_BASE.into(),
        cycle: CycleConfig::default(),
        upstream: UpstreamConfig::default(),
        notifier: None,
    };
    let state = AppState::new(Snapshot::new()).unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let mut coordinator = Coordinator::new(
        aggregator(registry),
        SnapshotStore::new(&config.snapshot_path),
        notifier.clone(),
        state.clone(),
        &config,
        Snapshot::new(),
    );

    let summary = coordinator.run_once().await.unwrap();
    assert_eq!(summary.other_errors, 1);
    assert_eq!(state.last_cycle().await, Some(summary));

    let stored = std::fs::read(&config.snapshot_path).unwrap();
    assert_eq!(state.encoded().await.etag, etag(&stored));
    assert_eq!(
        SnapshotStore::new(&config.snapshot_path).read().await.unwrap().as_ref(),
        Some(coordinator.snapshot())
    );

    let log = std::fs::read_to_string(&config.error_log_path).unwrap();
    assert!(log.contains("Error updating SomaFM Live (other):"));

    let page = std::fs::read_to_string(&index).unwrap();
    assert!(page.contains("<script>window.STATION_DATA = {\"Radio Plato\":"));

    let reports = notifier.reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].failures()[0].station, "SomaFM Live");
}
