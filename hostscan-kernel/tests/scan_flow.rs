//! End-to-end scan runs over scripted collectors and on-disk stores

use devkit::{RecordingExporter, Script, TestWorkspace};
use hostscan_kernel::collectors::ExternalManifest;
use hostscan_kernel::devices::DEFAULT_DEVICE_FILE;
use hostscan_kernel::{DeviceStore, ScanRequest, ScanStage};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const DEVICE: &str = "a1:b2:c3:d4:e5:f6";

#[tokio::test]
async fn test_failing_collector_does_not_abort_the_run() {
    let mut ws = TestWorkspace::new().unwrap();
    ws.register("CPU", Script::device(DEVICE, json!({"cores": 8})))
        .register("DISK", Script::Fail("disk read error".into()))
        .enable("CPU", json!({}))
        .enable("DISK", json!({}));

    let report = ws.orchestrator(None).run(ScanRequest::default()).await;

    let cpu = report.get("CPU").unwrap();
    assert!(cpu.success);
    assert_eq!(cpu.payload.as_ref().unwrap()[DEVICE]["cores"], json!(8));
    assert_eq!(cpu.devices_recorded, 1);

    let disk = report.get("DISK").unwrap();
    assert!(!disk.success);
    assert_eq!(disk.failed_stage, Some(ScanStage::Executing));
    assert!(disk.error.as_ref().unwrap().contains("disk read error"));

    let entry = ws.devices.get_service_data(DEVICE, "CPU").unwrap();
    assert_eq!(entry["cores"], json!(8));
    assert_eq!(entry["service"], json!("CPU"));
    assert!(entry["last_scan"].as_str().unwrap().ends_with('Z'));
    assert!(ws.devices.get_service_data(DEVICE, "DISK").is_none());
    assert_eq!(report.success_ratio(), 0.5);
}

#[tokio::test]
async fn test_no_enabled_collector_yields_empty_report() {
    let mut ws = TestWorkspace::new().unwrap();
    ws.register("CPU", Script::device(DEVICE, json!({})));

    let report = ws.orchestrator(None).run(ScanRequest { export: true }).await;

    assert!(report.is_empty());
    assert!(report.services.is_empty());
    assert!(ws.devices.list_computers().is_empty());
    assert!(!ws.path().join(DEFAULT_DEVICE_FILE).exists());
}

#[tokio::test]
async fn test_slow_collector_times_out_alone() {
    let mut ws = TestWorkspace::new().unwrap();
    ws.register("SLOW", Script::Sleep(Duration::from_secs(5), json!({DEVICE: {"late": true}})))
        .register("OS", Script::device(DEVICE, json!({"name": "Linux"})))
        .enable("SLOW", json!({}))
        .enable("OS", json!({}))
        .with_timeout(Duration::from_secs(1));

    let report = ws.orchestrator(None).run(ScanRequest::default()).await;

    let slow = report.get("SLOW").unwrap();
    assert!(!slow.success);
    assert!(slow.error.as_ref().unwrap().contains("timed out"));
    assert!(report.get("OS").unwrap().success);
    assert!(ws.devices.get_service_data(DEVICE, "SLOW").is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn test_timed_out_external_collector_is_killed() {
    let mut ws = TestWorkspace::new().unwrap();
    let marker = ws.path().join("late-write");
    ws.register_external(ExternalManifest {
        name: "hang".to_string(),
        binary: "/bin/sh".into(),
        args: vec!["-c".to_string(), format!("sleep 3; touch '{}'", marker.display())],
        description: None,
        env: None,
    })
    .enable("HANG", json!({}))
    .with_timeout(Duration::from_secs(1));

    let report = ws.orchestrator(None).run(ScanRequest::default()).await;

    let hang = report.get("HANG").unwrap();
    assert!(!hang.success);
    assert!(hang.error.as_ref().unwrap().contains("timed out"));

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(!marker.exists());
}

#[tokio::test]
async fn test_panicking_collector_is_contained() {
    let mut ws = TestWorkspace::new().unwrap();
    ws.register("RAM", Script::Panic("kaboom".into()))
        .register("OS", Script::device(DEVICE, json!({})))
        .enable("RAM", json!({}))
        .enable("OS", json!({}));

    let report = ws.orchestrator(None).run(ScanRequest::default()).await;

    let ram = report.get("RAM").unwrap();
    assert!(!ram.success);
    assert_eq!(ram.error.as_deref(), Some("collector panicked: kaboom"));
    assert!(report.get("OS").unwrap().success);
}

#[tokio::test]
async fn test_loading_failures() {
    let mut ws = TestWorkspace::new().unwrap();
    ws.register("NETWORK", Script::RejectOptions("no such interface".into()))
        .enable("GPU", json!({}))
        .enable("NETWORK", json!({}));

    let report = ws.orchestrator(None).run(ScanRequest::default()).await;

    assert_eq!(report.services, vec!["GPU", "NETWORK"]);
    let gpu = report.get("GPU").unwrap();
    assert_eq!(gpu.failed_stage, Some(ScanStage::Loading));
    assert!(gpu.error.as_ref().unwrap().contains("no collector implementation"));

    let network = report.get("NETWORK").unwrap();
    assert_eq!(network.failed_stage, Some(ScanStage::Loading));
    assert!(network.error.as_ref().unwrap().contains("no such interface"));
    assert_eq!(report.succeeded(), 0);
}

#[tokio::test]
async fn test_registry_defaults_merge_with_overrides() {
    let mut ws = TestWorkspace::new().unwrap();
    ws.register("RAM", Script::device(DEVICE, json!({"total": 16})))
        .enable("RAM", json!({"unit": "GB", "show_swap": "maybe"}));

    let report = ws.orchestrator(None).run(ScanRequest::default()).await;

    let seen = ws.options_seen("RAM");
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].text("unit"), Some("GB"));
    assert_eq!(seen[0].flag("show_swap"), Some(false));

    let ram = report.get("RAM").unwrap();
    assert_eq!(ram.rejected_options.len(), 1);
    assert_eq!(ram.rejected_options[0].option, "show_swap");
}

#[tokio::test]
async fn test_device_record_accumulates_collectors() {
    let mut ws = TestWorkspace::new().unwrap();
    ws.devices.add_computer(DEVICE, json!({"NOTE": {"owner": "lab"}}).as_object().cloned().unwrap());
    ws.register("CPU", Script::device(DEVICE, json!({"cores": 4})))
        .register("OS", Script::device(DEVICE, "Linux".into()))
        .enable("CPU", json!({}))
        .enable("OS", json!({}))
        .with_workers(1);

    ws.orchestrator(None).run(ScanRequest::default()).await;

    let reloaded = DeviceStore::load(ws.path().join(DEFAULT_DEVICE_FILE));
    let record = reloaded.get_computer(DEVICE).unwrap();
    assert_eq!(record["NOTE"], json!({"owner": "lab"}));
    assert_eq!(record["CPU"]["cores"], json!(4));
    assert_eq!(record["OS"]["value"], json!("Linux"));
}

#[tokio::test]
async fn test_bounded_pool_runs_every_collector() {
    let mut ws = TestWorkspace::new().unwrap();
    for name in ["A", "B", "C", "D", "E"] {
        ws.register(name, Script::Sleep(Duration::from_millis(100), json!({DEVICE: {"n": name}})))
            .enable(name, json!({}));
    }
    ws.with_workers(2);

    let report = ws.orchestrator(None).run(ScanRequest::default()).await;

    assert_eq!(report.succeeded(), 5);
    assert_eq!(report.results.keys().collect::<Vec<_>>(), vec!["A", "B", "C", "D", "E"]);
    assert_eq!(ws.devices.get_computer(DEVICE).unwrap().len(), 5);
}

#[tokio::test]
async fn test_export_batch_contents() {
    let mut ws = TestWorkspace::new().unwrap();
    ws.register("CPU", Script::device(DEVICE, json!({"cores": 2})))
        .register("DISK", Script::Fail("unplugged".into()))
        .enable("CPU", json!({}))
        .enable("DISK", json!({}));
    let exporter = RecordingExporter::new();

    let report = ws
        .orchestrator(Some(Arc::new(exporter.clone())))
        .run(ScanRequest { export: true })
        .await;

    let batch = exporter.last_batch().unwrap();
    assert_eq!(exporter.batches().len(), 1);
    assert_eq!(batch.len(), 2);

    let tag = report.timestamp_tag();
    let consolidated = &batch[&format!("scan_{}.json", tag)];
    assert_eq!(consolidated["services"], json!(["CPU", "DISK"]));
    assert_eq!(consolidated["results"]["DISK"]["success"], json!(false));
    assert_eq!(batch[&format!("CPU_{}.json", tag)][DEVICE]["cores"], json!(2));

    let summary = report.export.unwrap();
    assert!(summary.success);
    assert_eq!(summary.files.len(), 2);
}

#[tokio::test]
async fn test_export_not_requested_is_skipped() {
    let mut ws = TestWorkspace::new().unwrap();
    ws.register("CPU", Script::device(DEVICE, json!({}))).enable("CPU", json!({}));
    let exporter = RecordingExporter::new();

    let report = ws
        .orchestrator(Some(Arc::new(exporter.clone())))
        .run(ScanRequest::default())
        .await;

    assert!(report.export.is_none());
    assert!(exporter.batches().is_empty());
}

#[tokio::test]
async fn test_failed_export_keeps_device_writes() {
    let mut ws = TestWorkspace::new().unwrap();
    ws.register("CPU", Script::device(DEVICE, json!({"cores": 2}))).enable("CPU", json!({}));

    let report = ws
        .orchestrator(Some(Arc::new(RecordingExporter::answering(false))))
        .run(ScanRequest { export: true })
        .await;

    assert!(!report.export.as_ref().unwrap().success);
    assert!(report.get("CPU").unwrap().success);
    assert!(ws.devices.get_service_data(DEVICE, "CPU").is_some());
}
