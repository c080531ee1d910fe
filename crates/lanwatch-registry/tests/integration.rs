//! Persistence contract tests for lanwatch-registry against a temp dir.

use std::collections::BTreeSet;
use std::fs;

use chrono::Utc;
use lanwatch_core::{ChangeType, DataQuality, FusedDevice, Source};
use lanwatch_registry::{store, DeviceFilter, Registry, RegistryError, SCHEMA_VERSION};

const MAC_A: &str = "3C:22:FB:AA:BB:CC";
const MAC_B: &str = "B8:27:EB:00:11:22";

fn fused(mac: &str, ip: &str, hostname: Option<&str>) -> FusedDevice {
    FusedDevice {
        mac: mac.to_string(),
        ip: Some(ip.to_string()),
        alternate_ips: vec![],
        hostname: hostname.map(String::from),
        vendor: Some("Apple".to_string()),
        os_guess: None,
        is_online: true,
        response_time_ms: Some(1.2),
        is_vpn_connected: false,
        vpn_ip: None,
        sources: BTreeSet::from([Source::Nmap, Source::Arp]),
        confidence_score: 0.8,
        data_quality: DataQuality::Medium,
        last_observed: Utc::now(),
    }
}

fn kinds(changes: &[lanwatch_core::ChangeEvent]) -> Vec<ChangeType> {
    changes.iter().map(|c| c.change_type).collect()
}

#[tokio::test]
async fn test_new_devices_then_idempotent_reapply() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::open(dir.path().join("registry.json")).unwrap();
    let scan = vec![
        fused(MAC_A, "192.168.1.10", Some("tito")),
        fused(MAC_B, "192.168.1.20", None),
    ];

    let first = registry.update_from_scan(&scan).await;
    assert_eq!(first.new, 2);
    assert_eq!(first.updated, 0);
    assert_eq!(kinds(&first.changes), vec![ChangeType::NewDevice; 2]);
    assert!(first.persisted);

    let again = registry.update_from_scan(&scan).await;
    assert_eq!(again.new, 0);
    assert_eq!(again.updated, 0);
    assert!(again.changes.is_empty());

    let record = registry.get_device(MAC_A).await.unwrap();
    assert_eq!(record.total_detections, 2);
    assert_eq!(record.ip_history.len(), 1);
    assert_eq!(record.ip_history[0].occurrence_count, 2);
}

#[tokio::test]
async fn test_mac_casing_is_one_device() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::open(dir.path().join("registry.json")).unwrap();

    registry
        .update_from_scan(&[fused("3c:22:fb:aa:bb:cc", "192.168.1.10", None)])
        .await;
    let second = registry
        .update_from_scan(&[fused("3C-22-FB-AA-BB-CC", "192.168.1.10", None)])
        .await;

    assert_eq!(second.new, 0);
    assert_eq!(registry.get_statistics().await.total, 1);
    assert!(registry.get_device("3c-22-fb-aa-bb-cc").await.is_ok());
}

#[tokio::test]
async fn test_ip_change_updates_history() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::open(dir.path().join("registry.json")).unwrap();

    registry
        .update_from_scan(&[fused(MAC_A, "192.168.1.10", None)])
        .await;
    let outcome = registry
        .update_from_scan(&[fused(MAC_A, "192.168.1.15", None)])
        .await;

    assert_eq!(outcome.updated, 1);
    assert_eq!(kinds(&outcome.changes), vec![ChangeType::IpChanged]);
    assert_eq!(outcome.changes[0].old_value.as_deref(), Some("192.168.1.10"));
    assert_eq!(outcome.changes[0].new_value.as_deref(), Some("192.168.1.15"));

    let record = registry.get_device(MAC_A).await.unwrap();
    assert_eq!(record.current_ip.as_deref(), Some("192.168.1.15"));
    assert_eq!(
        record.ip_history.last().map(|e| e.value.as_str()),
        Some("192.168.1.15")
    );
    assert!(record.is_dhcp_dynamic());
    assert_eq!(registry.get_statistics().await.dhcp_dynamic, 1);
}

#[tokio::test]
async fn test_absent_device_goes_offline_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::open(dir.path().join("registry.json")).unwrap();

    registry
        .update_from_scan(&[
            fused(MAC_A, "192.168.1.10", None),
            fused(MAC_B, "192.168.1.20", None),
        ])
        .await;

    let n1 = registry
        .update_from_scan(&[fused(MAC_A, "192.168.1.10", None)])
        .await;
    assert_eq!(kinds(&n1.changes), vec![ChangeType::DeviceOffline]);
    assert_eq!(n1.changes[0].mac, MAC_B);
    assert_eq!(n1.updated, 1);

    let n2 = registry
        .update_from_scan(&[fused(MAC_A, "192.168.1.10", None)])
        .await;
    assert!(n2.changes.is_empty());
    assert!(!registry.get_device(MAC_B).await.unwrap().is_online);

    let back = registry
        .update_from_scan(&[
            fused(MAC_A, "192.168.1.10", None),
            fused(MAC_B, "192.168.1.20", None),
        ])
        .await;
    assert_eq!(kinds(&back.changes), vec![ChangeType::DeviceOnline]);
}

#[tokio::test]
async fn test_subnet_scan_only_marks_its_own_devices_offline() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::open(dir.path().join("registry.json")).unwrap();

    registry
        .update_from_scan(&[
            fused(MAC_A, "192.168.1.10", None),
            fused(MAC_B, "10.0.0.20", None),
        ])
        .await;

    let subnet = "192.168.1.0/24".parse().unwrap();
    let outcome = registry.update_from_subnet_scan(&subnet, &[]).await;

    assert_eq!(kinds(&outcome.changes), vec![ChangeType::DeviceOffline]);
    assert_eq!(outcome.changes[0].mac, MAC_A);
    assert!(registry.get_device(MAC_B).await.unwrap().is_online);
}

#[tokio::test]
async fn test_round_trip_reproduces_device_map() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.json");

    let registry = Registry::open(&path).unwrap();
    registry
        .update_from_scan(&[fused(MAC_A, "192.168.1.10", Some("tito"))])
        .await;
    registry
        .update_from_scan(&[fused(MAC_A, "192.168.1.15", Some("tito-mbp"))])
        .await;
    registry.mark_as_managed(MAC_A, true).await.unwrap();
    let before = registry.snapshot().await;

    let reopened = Registry::open(&path).unwrap();
    let after = reopened.snapshot().await;

    assert_eq!(after.version, SCHEMA_VERSION);
    assert_eq!(after.devices, before.devices);
    let record = &after.devices[MAC_A];
    assert_eq!(record.hostname_history.len(), 2);
    assert!(record.is_managed);
}

#[tokio::test]
async fn test_filters_and_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::open(dir.path().join("registry.json")).unwrap();
    registry
        .update_from_scan(&[
            fused(MAC_A, "192.168.1.10", None),
            fused(MAC_B, "192.168.1.20", None),
        ])
        .await;
    registry.mark_as_managed(MAC_B, true).await.unwrap();

    let managed = DeviceFilter {
        managed_only: true,
        ..Default::default()
    };
    let devices = registry.get_all_devices(&managed).await;
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].mac, MAC_B);

    let limited = DeviceFilter {
        limit: Some(1),
        ..Default::default()
    };
    assert_eq!(registry.get_all_devices(&limited).await.len(), 1);

    assert!(matches!(
        registry.get_device("00:00:00:00:00:01").await,
        Err(RegistryError::NotFound { .. })
    ));
    assert!(matches!(
        registry.mark_as_managed("00:00:00:00:00:01", true).await,
        Err(RegistryError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_vendor_enrichment_emits_vendor_updated() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::open(dir.path().join("registry.json")).unwrap();
    let mut device = fused(MAC_A, "192.168.1.10", None);
    device.vendor = None;
    registry.update_from_scan(&[device]).await;
    assert_eq!(registry.pending_vendor_lookups().await, vec![MAC_A.to_string()]);

    let events = registry
        .apply_vendors(&[(MAC_A.to_lowercase(), "Apple, Inc.".to_string())])
        .await
        .unwrap();
    assert_eq!(kinds(&events), vec![ChangeType::VendorUpdated]);
    assert!(registry.pending_vendor_lookups().await.is_empty());

    let repeat = registry
        .apply_vendors(&[(MAC_A.to_string(), "Apple, Inc.".to_string())])
        .await
        .unwrap();
    assert!(repeat.is_empty());
}

#[tokio::test]
async fn test_v1_document_is_migrated_with_backup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.json");
    let legacy = r#"{
        "last_updated": "2025-06-01T10:00:00Z",
        "devices": {
            "3c-22-fb-aa-bb-cc": {
                "ip": "192.168.1.15",
                "hostname": "tito",
                "vendor": "Apple",
                "is_online": true,
                "ip_history": ["192.168.1.10", "192.168.1.15"],
                "hostname_history": ["tito"],
                "first_seen": "2025-05-01T10:00:00Z",
                "last_seen": "2025-06-01T10:00:00Z",
                "total_detections": 12
            },
            "not-a-mac": { "ip": "192.168.1.99" }
        }
    }"#;
    fs::write(&path, legacy).unwrap();

    let registry = Registry::open(&path).unwrap();

    let backup = store::backup_path(&path);
    assert_eq!(fs::read_to_string(&backup).unwrap(), legacy);

    let record = registry.get_device(MAC_A).await.unwrap();
    assert_eq!(record.current_ip.as_deref(), Some("192.168.1.15"));
    assert_eq!(record.ip_history.len(), 2);
    assert_eq!(record.ip_history[1].value, "192.168.1.15");
    assert_eq!(record.total_detections, 12);
    assert_eq!(registry.get_statistics().await.total, 1);

    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk["version"], SCHEMA_VERSION);
}

#[tokio::test]
async fn test_failed_persist_keeps_old_snapshot_and_retries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.json");
    let registry = Registry::open(&path).unwrap();
    registry
        .update_from_scan(&[fused(MAC_A, "192.168.1.10", None)])
        .await;
    let on_disk_before = fs::read_to_string(&path).unwrap();

    // A directory where the temp file should go makes the write fail.
    let blocker = dir.path().join("registry.json.tmp");
    fs::create_dir(&blocker).unwrap();

    let failed = registry
        .update_from_scan(&[
            fused(MAC_A, "192.168.1.10", None),
            fused(MAC_B, "192.168.1.20", None),
        ])
        .await;
    assert!(!failed.persisted);
    assert!(failed.persist_warning.is_some());
    assert_eq!(failed.new, 1);
    assert!(registry.has_pending_writes().await);
    assert_eq!(fs::read_to_string(&path).unwrap(), on_disk_before);
    assert!(matches!(
        registry.get_device(MAC_B).await,
        Err(RegistryError::NotFound { .. })
    ));

    fs::remove_dir(&blocker).unwrap();
    registry.flush().await.unwrap();

    assert!(!registry.has_pending_writes().await);
    assert!(registry.get_device(MAC_B).await.is_ok());
    let reopened = Registry::open(&path).unwrap();
    assert_eq!(reopened.get_statistics().await.total, 2);
}

#[tokio::test]
async fn test_classifier_sets_device_type() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::open(dir.path().join("registry.json")).unwrap();
    registry
        .update_from_scan(&[fused(MAC_A, "192.168.1.10", Some("Tito-iPhone"))])
        .await;

    let record = registry.get_device(MAC_A).await.unwrap();
    assert_eq!(record.device_type.as_deref(), Some("phone"));
    assert!(record.confidence_score > 0.8);
    assert!(record.confidence_score <= 1.0);
}

struct PrinterClassifier;

impl lanwatch_fusion::Classifier for PrinterClassifier {
    fn classify(&self, _record: &lanwatch_core::DeviceRecord) -> lanwatch_fusion::Classification {
        lanwatch_fusion::Classification {
            device_type: Some("printer".to_string()),
            os_guess: None,
            confidence_contribution: 0.0,
        }
    }
}

#[tokio::test]
async fn test_custom_classifier_replaces_default() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::open(dir.path().join("registry.json"))
        .unwrap()
        .with_classifier(std::sync::Arc::new(PrinterClassifier));
    registry
        .update_from_scan(&[fused(MAC_A, "192.168.1.10", Some("Tito-iPhone"))])
        .await;

    let record = registry.get_device(MAC_A).await.unwrap();
    assert_eq!(record.device_type.as_deref(), Some("printer"));
    assert_eq!(record.confidence_score, 0.8);
}

#[tokio::test]
async fn test_notes_survive_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.json");
    let registry = Registry::open(&path).unwrap();
    registry
        .update_from_scan(&[fused(MAC_A, "192.168.1.10", None)])
        .await;

    let record = registry
        .set_notes("3c:22:fb:aa:bb:cc", Some("office printer shelf".to_string()))
        .await
        .unwrap();
    assert_eq!(record.notes.as_deref(), Some("office printer shelf"));

    let reopened = Registry::open(&path).unwrap();
    let record = reopened.get_device(MAC_A).await.unwrap();
    assert_eq!(record.notes.as_deref(), Some("office printer shelf"));

    assert!(matches!(
        registry.set_notes("00:00:5E:00:53:01", None).await,
        Err(RegistryError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_failed_manage_is_rolled_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.json");
    let registry = Registry::open(&path).unwrap();
    registry
        .update_from_scan(&[fused(MAC_A, "192.168.1.10", None)])
        .await;

    let blocker = dir.path().join("registry.json.tmp");
    fs::create_dir(&blocker).unwrap();

    assert!(matches!(
        registry.mark_as_managed(MAC_A, true).await,
        Err(RegistryError::Persist { .. })
    ));
    assert!(!registry.has_pending_writes().await);
    assert!(!registry.get_device(MAC_A).await.unwrap().is_managed);

    fs::remove_dir(&blocker).unwrap();
    let next = registry
        .update_from_scan(&[fused(MAC_A, "192.168.1.10", None)])
        .await;
    assert!(next.persisted);

    assert!(!registry.get_device(MAC_A).await.unwrap().is_managed);
    let reopened = Registry::open(&path).unwrap();
    assert!(!reopened.get_device(MAC_A).await.unwrap().is_managed);
}

#[tokio::test]
async fn test_failed_manage_keeps_earlier_pending_scan() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.json");
    let registry = Registry::open(&path).unwrap();
    registry
        .update_from_scan(&[fused(MAC_A, "192.168.1.10", None)])
        .await;

    let blocker = dir.path().join("registry.json.tmp");
    fs::create_dir(&blocker).unwrap();

    let scan = registry
        .update_from_scan(&[
            fused(MAC_A, "192.168.1.10", None),
            fused(MAC_B, "192.168.1.20", None),
        ])
        .await;
    assert!(!scan.persisted);
    assert!(registry.mark_as_managed(MAC_A, true).await.is_err());
    assert!(registry.has_pending_writes().await);

    fs::remove_dir(&blocker).unwrap();
    registry.flush().await.unwrap();

    let reopened = Registry::open(&path).unwrap();
    assert_eq!(reopened.get_statistics().await.total, 2);
    assert!(!reopened.get_device(MAC_A).await.unwrap().is_managed);
}
