//! Contract Test: Storage Discovery
//!
//! This test verifies how the type and description walks are combined.
//!
//! Constraints verified:
//! - Rows are correlated by index, never by position
//! - Only FixedDisk and Ram rows are kept
//! - The exclusion pattern removes disks but never RAM
//! - Missing system scalars degrade to `None`
//! - An agent that answers nothing is flagged as such
//!
//! If this test fails, disk/RAM counts reported for hosts are wrong.

mod common;

use common::*;
use lld_core::{DiscoveryConfig, OidOrdering, SnmpSession, StorageDiscovery, StorageKind};

fn discovery(filter: &str) -> StorageDiscovery {
    StorageDiscovery::from_config(&DiscoveryConfig::new("Discovered", "snmp").with_filter(filter)).unwrap()
}

#[tokio::test]
async fn excluded_disk_is_dropped_and_ram_kept() {
    let agent = ScriptedAgent::builder("10.0.0.5:161")
        .system("db1")
        .storage(1, "hrStorageFixedDisk", "/proc")
        .storage(2, "hrStorageRam", "physmem")
        .storage(3, "hrStorageFixedDisk", "/data")
        .build();
    let session = SnmpSession::new(Box::new(agent), OidOrdering::Numeric);

    let facts = discovery("^/proc").collect(&session).await.unwrap();

    assert_eq!(facts.disks.keys().copied().collect::<Vec<_>>(), vec![3]);
    assert_eq!(facts.rams.keys().copied().collect::<Vec<_>>(), vec![2]);
    assert_eq!(facts.disks[&3].kind, StorageKind::FixedDisk);
    assert_eq!(facts.disks[&3].description.as_deref(), Some("/data"));
    assert_eq!(facts.sys_name.as_deref(), Some("db1"));
    assert_eq!(facts.sys_location.as_deref(), Some("rack 4"));
    assert!(facts.agent_answered);
}

#[tokio::test]
async fn walks_with_different_row_sets_still_correlate() {
    let agent = ScriptedAgent::builder("10.0.0.5:161")
        .storage_type(1, "hrStorageVirtualMemory")
        .storage_type(6, "hrStorageFixedDisk")
        .storage_type(7, "hrStorageFixedDisk")
        .storage_type(10, "hrStorageRam")
        // descriptions for rows the type walk never returned
        .storage_descr(2, "/sys/fs/cgroup")
        .storage_descr(3, "/run")
        .storage_descr(6, "/run/user/1000")
        .storage_descr(7, "/srv")
        .build();
    let session = SnmpSession::new(Box::new(agent), OidOrdering::Numeric);

    let set = discovery("/(proc|sys|run)").walk_storage(&session).await;

    assert_eq!(set.disks.keys().copied().collect::<Vec<_>>(), vec![7]);
    assert_eq!(set.disks[&7].description.as_deref(), Some("/srv"));
    assert_eq!(set.rams.keys().copied().collect::<Vec<_>>(), vec![10]);
    assert_eq!(set.rams[&10].description, None);
}

#[tokio::test]
async fn description_walk_starts_after_type_walk() {
    let agent = ScriptedAgent::builder("10.0.0.5:161")
        .storage(1, "hrStorageFixedDisk", "/")
        .storage(2, "hrStorageFixedDisk", "/home")
        .build();
    let session = SnmpSession::new(Box::new(agent.clone()), OidOrdering::Numeric);

    discovery("").walk_storage(&session).await;

    let type_column = oid("1.3.6.1.2.1.25.2.3.1.2");
    let descr_column = oid("1.3.6.1.2.1.25.2.3.1.3");
    let requested = agent.requested();

    let first_descr = requested.iter().position(|o| o.arcs().starts_with(descr_column.arcs())).unwrap();
    assert!(requested[..first_descr].iter().all(|o| o.arcs().starts_with(type_column.arcs())));
    assert!(requested[first_descr..].iter().all(|o| o.arcs().starts_with(descr_column.arcs())));
}

#[tokio::test]
async fn silent_agent_yields_empty_facts() {
    let agent = ScriptedAgent::builder("10.0.0.9:161")
        .fail_get_next_after(0, lld_core::ProbeOutcome::Timeout)
        .build();
    let session = SnmpSession::new(Box::new(agent), OidOrdering::Numeric);

    let facts = discovery("^/proc").collect(&session).await.unwrap();

    assert_eq!(facts.sys_name, None);
    assert_eq!(facts.up_time, None);
    assert_eq!(facts.disk_count(), 0);
    assert_eq!(facts.ram_count(), 0);
    assert_eq!(facts.target, "10.0.0.9:161");
    assert!(!facts.agent_answered);
}

#[tokio::test]
async fn agent_without_storage_still_answered() {
    // scalars only: both walks run straight off the end of the view
    let agent = ScriptedAgent::builder("10.0.0.5:161").system("db1").build();
    let session = SnmpSession::new(Box::new(agent), OidOrdering::Numeric);

    let facts = discovery("^/proc").collect(&session).await.unwrap();

    assert_eq!(facts.disk_count(), 0);
    assert!(facts.agent_answered);
}
