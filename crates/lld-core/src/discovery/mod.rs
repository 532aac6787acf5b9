//! Storage discovery
//!
//! One discovery pass per host:
//!
//! 1. Read the `system` group scalars (`sysName`, `sysLocation`, `sysDescr`,
//!    `sysUpTime`)
//! 2. Walk `hrStorageType` and keep the rows typed FixedDisk or Ram
//! 3. Walk `hrStorageDescr`, attach descriptions and drop excluded disks
//!
//! The two walks are joined on the row index. Agents may return the columns
//! with different row sets or in a different order; nothing here assumes the
//! n-th type row and the n-th description row describe the same storage.

use crate::config::DiscoveryConfig;
use crate::error::Result;
use crate::mib;
use crate::oid::OidAddress;
use crate::session::{SnmpSession, StopReason, TableRow, TableWalk};
use crate::traits::SnmpValue;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Storage classification by `hrStorageType`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    FixedDisk,
    Ram,
    Other,
}

/// One storage row kept by the discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    /// `hrStorageIndex`
    pub index: u32,
    pub kind: StorageKind,
    /// `hrStorageDescr`, once the description walk has seen the row
    pub description: Option<String>,
}

impl StorageEntry {
    fn new(index: u32, kind: StorageKind) -> Self {
        Self {
            index,
            kind,
            description: None,
        }
    }
}

/// Index-keyed working set of one discovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageSet {
    pub disks: BTreeMap<u32, StorageEntry>,
    pub rams: BTreeMap<u32, StorageEntry>,
    /// At least one walk got an answer from the agent (rows or end of table)
    pub answered: bool,
}

/// Everything learned about one host in one pass
#[derive(Debug, Clone)]
pub struct HostFacts {
    /// Agent address the facts were collected from
    pub target: String,
    pub sys_name: Option<String>,
    pub sys_location: Option<String>,
    pub sys_descr: Option<String>,
    pub up_time: Option<SnmpValue>,
    pub disks: BTreeMap<u32, StorageEntry>,
    pub rams: BTreeMap<u32, StorageEntry>,
    /// The agent answered at least one request of the pass
    ///
    /// `false` means every scalar and both walks failed, so empty storage
    /// sets say nothing about the host.
    pub agent_answered: bool,
    pub collected_at: DateTime<Utc>,
}

impl HostFacts {
    pub fn disk_count(&self) -> usize {
        self.disks.len()
    }

    pub fn ram_count(&self) -> usize {
        self.rams.len()
    }
}

/// Storage discovery policy: type markers and exclusion pattern
#[derive(Debug, Clone)]
pub struct StorageDiscovery {
    fixed_disk_marker: OidAddress,
    ram_marker: OidAddress,
    type_column: OidAddress,
    descr_column: OidAddress,
    exclusion: Option<Regex>,
}

impl StorageDiscovery {
    /// Create a discovery with an already compiled exclusion pattern
    pub fn new(exclusion: Option<Regex>) -> Result<Self> {
        Ok(Self {
            fixed_disk_marker: mib::resolve("HOST-RESOURCES-TYPES", "hrStorageFixedDisk")?,
            ram_marker: mib::resolve("HOST-RESOURCES-TYPES", "hrStorageRam")?,
            type_column: mib::resolve("HOST-RESOURCES-MIB", "hrStorageType")?,
            descr_column: mib::resolve("HOST-RESOURCES-MIB", "hrStorageDescr")?,
            exclusion,
        })
    }

    /// Create a discovery from the run settings
    pub fn from_config(config: &DiscoveryConfig) -> Result<Self> {
        Self::new(config.exclusion_regex()?)
    }

    /// Classify an `hrStorageType` value
    pub fn classify_type(&self, value: &SnmpValue) -> StorageKind {
        match value.as_oid() {
            Some(oid) if *oid == self.fixed_disk_marker => StorageKind::FixedDisk,
            Some(oid) if *oid == self.ram_marker => StorageKind::Ram,
            _ => StorageKind::Other,
        }
    }

    /// Whether a description matches the exclusion pattern
    pub fn is_excluded(&self, description: &str) -> bool {
        self.exclusion
            .as_ref()
            .is_some_and(|re| re.is_match(description))
    }

    /// Fold one `hrStorageType` row into the working set
    pub fn absorb_type_row(&self, set: &mut StorageSet, row: &TableRow) {
        match self.classify_type(&row.value) {
            StorageKind::FixedDisk => {
                set.disks.insert(row.index, StorageEntry::new(row.index, StorageKind::FixedDisk));
            }
            StorageKind::Ram => {
                set.rams.insert(row.index, StorageEntry::new(row.index, StorageKind::Ram));
            }
            StorageKind::Other => {}
        }
    }

    /// Fold one `hrStorageDescr` row into the working set
    ///
    /// Rows whose index was not kept by the type pass are ignored. RAM
    /// entries are never filtered.
    pub fn absorb_descr_row(&self, set: &mut StorageSet, row: &TableRow) {
        let description = row.value.as_text();

        if set.disks.contains_key(&row.index) && self.is_excluded(&description) {
            debug!("Dropping storage {} ({})", row.index, description);
            set.disks.remove(&row.index);
            return;
        }

        if let Some(entry) = set.disks.get_mut(&row.index) {
            entry.description = Some(description);
        } else if let Some(entry) = set.rams.get_mut(&row.index) {
            entry.description = Some(description);
        }
    }

    /// Run both walks against one session
    ///
    /// The description walk starts only after the type walk is finished.
    pub async fn walk_storage(&self, session: &SnmpSession) -> StorageSet {
        let mut set = StorageSet::default();

        let mut types = session.walk(&self.type_column);
        while let Some(row) = types.next().await {
            self.absorb_type_row(&mut set, &row);
        }

        let mut descrs = session.walk(&self.descr_column);
        while let Some(row) = descrs.next().await {
            self.absorb_descr_row(&mut set, &row);
        }

        set.answered = walk_answered(&types) || walk_answered(&descrs);

        debug!(
            "{}: storage walk done ({} type rows, {} description rows)",
            session.target(),
            types.rows_yielded(),
            descrs.rows_yielded()
        );

        set
    }

    /// Collect the system scalars and the storage set of one host
    pub async fn collect(&self, session: &SnmpSession) -> Result<HostFacts> {
        let sys_name = session.get_named("SNMPv2-MIB", "sysName", &[0]).await?;
        let sys_location = session.get_named("SNMPv2-MIB", "sysLocation", &[0]).await?;
        let sys_descr = session.get_named("SNMPv2-MIB", "sysDescr", &[0]).await?;
        let up_time = session.get_named("SNMPv2-MIB", "sysUpTime", &[0]).await?;

        let render = |value: &Option<SnmpValue>| {
            value
                .as_ref()
                .map(SnmpValue::as_text)
                .unwrap_or_else(|| "?".to_string())
        };
        info!(
            "HOST: {} on {} Uptime: {} {}",
            render(&sys_name),
            render(&sys_location),
            render(&up_time),
            render(&sys_descr)
        );

        let set = self.walk_storage(session).await;
        let agent_answered = set.answered
            || [&sys_name, &sys_location, &sys_descr, &up_time]
                .iter()
                .any(|value| value.is_some());

        Ok(HostFacts {
            target: session.target(),
            sys_name: sys_name.map(|v| v.as_text()),
            sys_location: sys_location.map(|v| v.as_text()),
            sys_descr: sys_descr.map(|v| v.as_text()),
            up_time,
            disks: set.disks,
            rams: set.rams,
            agent_answered,
            collected_at: Utc::now(),
        })
    }
}

/// Rows came back, or the walk ended on the agent's own end-of-table answer
fn walk_answered(walk: &TableWalk<'_>) -> bool {
    walk.rows_yielded() > 0
        || matches!(
            walk.stop_reason(),
            Some(StopReason::EndOfSubtree | StopReason::EndOfMibView | StopReason::NonAdvancing(_))
        )
}
