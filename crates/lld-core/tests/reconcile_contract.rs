//! Contract Test: Registry Reconciliation
//!
//! This test verifies the destructive-upsert policy.
//!
//! Constraints verified:
//! - An existing group is reused unless `recreate_group` is set
//! - With `recreate_group` the group is deleted and created once per run
//! - An existing host is deleted before it is created again
//! - Host names are `{sysName}_{suffix}` with a hostname fallback
//! - The created host carries the SNMPv3 interface and the script macro
//!
//! If this test fails, the registry may end up with duplicate or stale hosts.

mod common;

use chrono::Utc;
use common::*;
use lld_core::reconcile::SCRIPT_NAME_MACRO;
use lld_core::{DiscoveryConfig, Error, HostFacts, HostReconciler};
use std::collections::BTreeMap;
use std::sync::Arc;

fn facts(sys_name: Option<&str>) -> HostFacts {
    HostFacts {
        target: "10.0.0.5:161".to_string(),
        sys_name: sys_name.map(str::to_string),
        sys_location: None,
        sys_descr: None,
        up_time: None,
        disks: BTreeMap::new(),
        rams: BTreeMap::new(),
        agent_answered: true,
        collected_at: Utc::now(),
    }
}

fn reconciler(registry: &RecordingRegistry) -> HostReconciler {
    HostReconciler::new(Arc::new(registry.clone()), &DiscoveryConfig::new("Discovered", "snmp"))
}

#[tokio::test]
async fn creates_group_and_host_on_empty_registry() {
    let registry = RecordingRegistry::new();
    let host = v3_host("10.0.0.5");
    let protocol = host.validate().unwrap();

    let outcome = reconciler(&registry)
        .reconcile(&host, &protocol, &facts(Some("db1")))
        .await
        .unwrap();

    assert_eq!(outcome.host_name, "db1_snmp");
    assert!(outcome.group_created);
    assert!(!outcome.host_replaced);
    assert_eq!(
        registry.calls(),
        vec![
            "hostgroup.get Discovered",
            "hostgroup.create Discovered",
            "host.get db1_snmp",
            "host.create db1_snmp",
        ]
    );

    let (_, spec) = registry.host("db1_snmp").unwrap();
    assert_eq!(spec.group_id, outcome.group_id);
    assert_eq!(spec.interface.ip, "10.0.0.5");
    assert_eq!(spec.interface.dns, "10.0.0.5.example.net");
    assert_eq!(spec.interface.port, 161);
    assert!(spec.interface.details.bulk);
    assert_eq!(spec.interface.details.version, 3);
    assert_eq!(spec.interface.details.security_name, "bootstrap");
    assert_eq!(spec.interface.details.auth_passphrase, "authpass123");
    assert_eq!(spec.interface.details.auth_protocol, 0);
    assert_eq!(spec.interface.details.priv_protocol, 0);
    assert_eq!(spec.macros.len(), 1);
    assert_eq!(spec.macros[0].macro_name, SCRIPT_NAME_MACRO);
}

#[tokio::test]
async fn existing_group_is_reused_and_host_replaced() {
    let registry = RecordingRegistry::new();
    let group_id = registry.seed_group("Discovered");

    let host = v3_host("10.0.0.5");
    let protocol = host.validate().unwrap();
    let reconciler = reconciler(&registry);

    let first = reconciler.reconcile(&host, &protocol, &facts(Some("db1"))).await.unwrap();
    let second = reconciler.reconcile(&host, &protocol, &facts(Some("db1"))).await.unwrap();

    assert_eq!(first.group_id, group_id);
    assert!(!first.group_created);
    assert!(second.host_replaced);
    assert_ne!(first.host_id, second.host_id);
    assert_eq!(registry.group_count(), 1);
    assert_eq!(registry.host_names(), vec!["db1_snmp"]);

    let calls = registry.calls();
    let delete = calls.iter().position(|c| *c == format!("host.delete {}", first.host_id)).unwrap();
    let recreate = calls.iter().rposition(|c| c == "host.create db1_snmp").unwrap();
    assert!(delete < recreate);
    assert!(!calls.iter().any(|c| c.starts_with("hostgroup.create")));
}

#[tokio::test]
async fn recreate_group_replaces_existing_group_once() {
    let registry = RecordingRegistry::new();
    let old_group = registry.seed_group("Discovered");

    let config = DiscoveryConfig::new("Discovered", "snmp").with_recreate_group(true);
    let reconciler = HostReconciler::new(Arc::new(registry.clone()), &config);
    let host = v3_host("10.0.0.5");
    let protocol = host.validate().unwrap();

    let first = reconciler.reconcile(&host, &protocol, &facts(Some("db1"))).await.unwrap();
    let second = reconciler.reconcile(&host, &protocol, &facts(Some("db2"))).await.unwrap();

    assert!(first.group_created);
    assert_ne!(first.group_id, old_group);
    assert!(!second.group_created);
    assert_eq!(second.group_id, first.group_id);
    assert_eq!(registry.group_count(), 1);

    let calls = registry.calls();
    let delete = calls.iter().position(|c| *c == format!("hostgroup.delete {}", old_group)).unwrap();
    let create = calls.iter().position(|c| c == "hostgroup.create Discovered").unwrap();
    assert!(delete < create);
    assert_eq!(calls.iter().filter(|c| c.starts_with("hostgroup.delete")).count(), 1);
}

#[tokio::test]
async fn missing_sys_name_falls_back_to_hostname() {
    let registry = RecordingRegistry::new();
    let host = v3_host("10.0.0.7");
    let protocol = host.validate().unwrap();

    let outcome = reconciler(&registry)
        .reconcile(&host, &protocol, &facts(None))
        .await
        .unwrap();
    assert_eq!(outcome.host_name, "10.0.0.7.example.net_snmp");

    let bare = lld_core::HostConfig::v3("10.0.0.8", "authpass123", "privpass123");
    assert_eq!(reconciler(&registry).host_name(&bare, &facts(Some("  "))), "10.0.0.8_snmp");
}

#[tokio::test]
async fn conflict_is_reported_as_registry_conflict() {
    let registry = RecordingRegistry::new().rejecting_host("db1_snmp");
    let host = v3_host("10.0.0.5");
    let protocol = host.validate().unwrap();

    let err = reconciler(&registry)
        .reconcile(&host, &protocol, &facts(Some("db1")))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RegistryConflict(_)));
    assert!(err.is_registry());
}
