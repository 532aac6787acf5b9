//! Registry reconciliation
//!
//! Pushes one host's discovery result into the monitoring registry.
//!
//! ## Policy
//!
//! - Group: reused when a group with the configured name exists, created
//!   otherwise. With `recreate_group` an existing group is deleted and
//!   created again, once per reconciler.
//! - Host: deleted when a host with the same technical name exists, then
//!   created from scratch (destructive upsert).
//!
//! Delete-then-create is not atomic. Two runs against the same registry must
//! not overlap; within one run the engine serialises calls to
//! [`HostReconciler::reconcile`].

use crate::config::{DiscoveryConfig, HostConfig, SnmpProtocol};
use crate::discovery::HostFacts;
use crate::error::Result;
use crate::traits::{HostMacro, HostRegistry, HostSpec, InterfaceSpec, SnmpInterfaceDetails};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Macro carrying the name of the tool that created the host
pub const SCRIPT_NAME_MACRO: &str = "{$SCRIPT_NAME}";

/// What a reconciliation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Technical host name written to the registry
    pub host_name: String,
    pub group_id: String,
    pub host_id: String,
    /// The group did not exist and was created
    pub group_created: bool,
    /// A host with the same name existed and was deleted first
    pub host_replaced: bool,
}

/// Destructive upsert of discovered hosts
pub struct HostReconciler {
    registry: Arc<dyn HostRegistry>,
    host_group: String,
    name_suffix: String,
    script_name: String,
    recreate_group: bool,
    /// Set once the group has been re-created in this run
    group_recreated: AtomicBool,
}

impl HostReconciler {
    /// Create a reconciler for the run settings
    pub fn new(registry: Arc<dyn HostRegistry>, config: &DiscoveryConfig) -> Self {
        Self {
            registry,
            host_group: config.host_group.clone(),
            name_suffix: config.name_suffix.clone(),
            script_name: config.script_name.clone(),
            recreate_group: config.recreate_group,
            group_recreated: AtomicBool::new(false),
        }
    }

    /// Technical name for a host: `{sysName}_{suffix}`
    ///
    /// Falls back to the configured hostname (then the IP) when the agent did
    /// not report a usable `sysName`.
    pub fn host_name(&self, host: &HostConfig, facts: &HostFacts) -> String {
        let base = match facts.sys_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.trim(),
            _ => {
                let fallback = if host.hostname.is_empty() { &host.ip } else { &host.hostname };
                warn!("{}: sysName unavailable, naming host after {}", host.ip, fallback);
                fallback.as_str()
            }
        };

        if self.name_suffix.is_empty() {
            base.to_string()
        } else {
            format!("{}_{}", base, self.name_suffix)
        }
    }

    /// Build the host record for the registry
    pub fn host_spec(&self, name: String, host: &HostConfig, protocol: &SnmpProtocol, group_id: String) -> HostSpec {
        let SnmpProtocol::V3(creds) = protocol;

        HostSpec {
            name,
            interface: InterfaceSpec {
                ip: host.ip.clone(),
                dns: host.hostname.clone(),
                port: host.port,
                use_ip: true,
                details: SnmpInterfaceDetails {
                    version: 3,
                    bulk: true,
                    security_name: creds.user.clone(),
                    auth_passphrase: creds.auth_key.clone(),
                    auth_protocol: creds.auth_protocol.registry_code(),
                    priv_passphrase: creds.priv_key.clone(),
                    priv_protocol: creds.priv_protocol.registry_code(),
                },
            },
            group_id,
            macros: vec![HostMacro::new(SCRIPT_NAME_MACRO, self.script_name.clone())],
        }
    }

    /// Look up the configured group, creating it if missing
    pub async fn ensure_group(&self) -> Result<(String, bool)> {
        if let Some(id) = self.registry.group_exists(&self.host_group).await? {
            if !self.recreate_group || self.group_recreated.load(Ordering::SeqCst) {
                debug!("Reusing group {} ({})", self.host_group, id);
                return Ok((id, false));
            }

            info!("Group {} exists ({}), deleting before re-create", self.host_group, id);
            self.registry.delete_group(&id).await?;
            self.group_recreated.store(true, Ordering::SeqCst);
        }

        let id = self.registry.create_group(&self.host_group).await?;
        info!("Created group {} ({}) in {}", self.host_group, id, self.registry.registry_name());
        Ok((id, true))
    }

    /// Reconcile one host's discovery result
    pub async fn reconcile(&self, host: &HostConfig, protocol: &SnmpProtocol, facts: &HostFacts) -> Result<ReconcileOutcome> {
        let (group_id, group_created) = self.ensure_group().await?;
        let host_name = self.host_name(host, facts);

        let host_replaced = match self.registry.host_exists(&host_name).await? {
            Some(existing) => {
                info!("Host {} exists ({}), deleting before re-create", host_name, existing);
                self.registry.delete_host(&existing).await?;
                true
            }
            None => false,
        };

        let spec = self.host_spec(host_name.clone(), host, protocol, group_id.clone());
        let host_id = self.registry.create_host(&spec).await?;

        info!(
            "Registered {} ({}) in group {} via {}",
            host_name,
            host_id,
            group_id,
            self.registry.registry_name()
        );

        Ok(ReconcileOutcome {
            host_name,
            group_id,
            host_id,
            group_created,
            host_replaced,
        })
    }
}

impl std::fmt::Debug for HostReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostReconciler")
            .field("registry", &self.registry.registry_name())
            .field("host_group", &self.host_group)
            .field("name_suffix", &self.name_suffix)
            .field("script_name", &self.script_name)
            .field("recreate_group", &self.recreate_group)
            .finish()
    }
}
