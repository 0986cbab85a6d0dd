//! Metrics runtime lifecycle and Prometheus exposition.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serial_test::serial;

use opmeter::config::{Config, RuntimeConfig};
use opmeter::utils::bootstrap::boot;
use opmeter::{LifecycleState, MetricsRuntime, OperationSet, Telemetry, TelemetryError};

struct AlbumStore;

impl OperationSet for AlbumStore {
    const NAME: &'static str = "AlbumRepository";
    const OPERATIONS: &'static [&'static str] = &["getAll"];
}

impl AlbumStore {
    async fn get_all(&self) -> Result<Vec<String>, std::io::Error> {
        Ok(vec!["holiday".to_string()])
    }
}

fn local() -> RuntimeConfig {
    Config::for_test().runtime
}

async fn scrape(addr: SocketAddr) -> String {
    reqwest::get(format!("http://{addr}/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap()
}

/// Scrape until `needle` shows up or a second has passed.
async fn scrape_until(addr: SocketAddr, needle: &str) -> String {
    let mut body = String::new();
    for _ in 0..50 {
        body = scrape(addr).await;
        if body.contains(needle) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    body
}

#[tokio::test]
#[serial]
async fn test_start_twice_fails() {
    let mut runtime = MetricsRuntime::new(local());

    let addr = runtime.start(0).await.unwrap();
    assert!(addr.is_some());
    assert_eq!(runtime.state(), LifecycleState::Started);

    let second = runtime.start(0).await;
    assert!(matches!(second, Err(TelemetryError::AlreadyStarted)));
    // The first endpoint keeps running.
    assert_eq!(runtime.local_addr(), addr);

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_shutdown_twice_is_noop() {
    let mut runtime = MetricsRuntime::new(local());
    runtime.start(0).await.unwrap();

    runtime.shutdown().await.unwrap();
    assert_eq!(runtime.state(), LifecycleState::Shutdown);
    assert!(runtime.local_addr().is_none());

    runtime.shutdown().await.unwrap();
    assert_eq!(runtime.state(), LifecycleState::Shutdown);
}

#[tokio::test]
#[serial]
async fn test_restart_after_shutdown() {
    let mut runtime = MetricsRuntime::new(local());
    runtime.start(0).await.unwrap();
    runtime.shutdown().await.unwrap();

    assert!(runtime.start(0).await.unwrap().is_some());
    assert_eq!(runtime.state(), LifecycleState::Started);
    runtime.shutdown().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_bind_failure_leaves_runtime_uninitialized() {
    let mut first = MetricsRuntime::new(local());
    let addr = first.start(0).await.unwrap().unwrap();

    let mut second = MetricsRuntime::new(local());
    let result = second.start(addr.port()).await;
    assert!(matches!(result, Err(TelemetryError::Io(_))));
    assert_eq!(second.state(), LifecycleState::Uninitialized);

    first.shutdown().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_endpoint_serves_operation_durations() {
    let mut runtime = MetricsRuntime::new(local());
    let addr = runtime.start(0).await.unwrap().unwrap();
    let backend = runtime.backend().unwrap();

    let telemetry = Telemetry::new(&Config::for_test().telemetry, backend);
    telemetry.setup(&[AlbumStore::descriptor()]).unwrap();
    let albums = telemetry.wrap(AlbumStore);

    let all = albums
        .measure_async("getAll", |store| store.get_all())
        .await
        .unwrap();
    assert_eq!(all, vec!["holiday".to_string()]);

    let body = scrape_until(addr, "album_get_all_duration").await;
    assert!(body.contains("album_get_all_duration"), "{body}");
    // Millisecond buckets, not the SDK defaults.
    assert!(body.contains("le=\"0.1\""), "{body}");
    assert!(body.contains("le=\"7.5\""), "{body}");

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_endpoint_serves_metric_group_values() {
    let mut runtime = MetricsRuntime::new(local());
    let addr = runtime.start(0).await.unwrap().unwrap();
    let backend = runtime.backend().unwrap();

    let telemetry = Telemetry::new(&Config::for_test().telemetry, backend);
    telemetry
        .jobs()
        .add_to_counter("jobs.thumbnail.completed", 3.0, None)
        .unwrap();
    telemetry
        .host()
        .add_to_gauge("host.connections", -2.0, None)
        .unwrap();

    let body = scrape_until(addr, "jobs_thumbnail_completed").await;
    assert!(body.contains("jobs_thumbnail_completed"), "{body}");
    assert!(body.contains("host_connections"), "{body}");

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_boot_runs_full_sequence() {
    let config = Config::for_test();
    let (mut runtime, telemetry) = boot(&config, &[AlbumStore::descriptor()])
        .await
        .unwrap();

    assert_eq!(runtime.state(), LifecycleState::Started);
    assert!(telemetry.instrumentor().is_set_up());
    assert!(telemetry.wrap(AlbumStore).is_timed());

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_boot_with_kill_switch_exports_nothing() {
    let mut config = Config::for_test();
    config.telemetry.sdk_disabled = true;

    let (mut runtime, telemetry) = boot(&config, &[AlbumStore::descriptor()])
        .await
        .unwrap();

    assert_eq!(runtime.state(), LifecycleState::Started);
    assert!(runtime.local_addr().is_none());
    assert!(!telemetry.wrap(AlbumStore).is_timed());

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_backend_is_shared_while_running() {
    let mut runtime = MetricsRuntime::new(local());
    runtime.start(0).await.unwrap();

    let first = runtime.backend().unwrap();
    let second = runtime.backend().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    runtime.shutdown().await.unwrap();
    assert!(runtime.backend().is_none());
}
