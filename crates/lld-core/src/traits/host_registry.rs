// # Host Registry Trait
//
// Defines the interface to the monitoring system's group/host inventory.
//
// ## Implementations
//
// - Zabbix JSON-RPC API: `lld-registry-zabbix` crate
//
// ## Overwrite Policy
//
// The reconciler, not the registry, decides what happens when a name already
// exists. Registries only expose lookup, create and delete; "upsert" is
// delete-then-create and is NOT safe under concurrent runs against the same
// registry. Callers must serialise runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// SNMPv3 settings attached to a monitored interface
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnmpInterfaceDetails {
    /// SNMP version (always 3)
    pub version: u8,
    /// Whether the monitoring side may use bulk requests
    pub bulk: bool,
    /// USM security name
    pub security_name: String,
    /// USM authentication passphrase
    pub auth_passphrase: String,
    /// Registry code for the authentication protocol
    pub auth_protocol: u8,
    /// USM privacy passphrase
    pub priv_passphrase: String,
    /// Registry code for the privacy protocol
    pub priv_protocol: u8,
}

impl std::fmt::Debug for SnmpInterfaceDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnmpInterfaceDetails")
            .field("version", &self.version)
            .field("bulk", &self.bulk)
            .field("security_name", &self.security_name)
            .field("auth_passphrase", &"<REDACTED>")
            .field("auth_protocol", &self.auth_protocol)
            .field("priv_passphrase", &"<REDACTED>")
            .field("priv_protocol", &self.priv_protocol)
            .finish()
    }
}

/// Monitored SNMP interface of a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSpec {
    /// Agent IP address
    pub ip: String,
    /// Agent DNS name
    pub dns: String,
    /// Agent port
    pub port: u16,
    /// Address the monitoring side by IP rather than DNS
    pub use_ip: bool,
    /// SNMP settings
    pub details: SnmpInterfaceDetails,
}

/// User macro attached to a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostMacro {
    pub macro_name: String,
    pub value: String,
}

impl HostMacro {
    pub fn new(macro_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            macro_name: macro_name.into(),
            value: value.into(),
        }
    }
}

/// Everything needed to create one host record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSpec {
    /// Technical host name (unique in the registry)
    pub name: String,
    /// The host's SNMP interface
    pub interface: InterfaceSpec,
    /// Group the host belongs to
    pub group_id: String,
    /// User macros
    pub macros: Vec<HostMacro>,
}

/// Trait for host/group registry implementations
///
/// # Trust Level: Untrusted
///
/// Registries are external integrations. They must:
/// - Execute one API call per method invocation
/// - Never retry (failures are logged per host by the engine)
/// - Never log credentials
///
/// Lookups return `Ok(None)` when nothing matches; `Err` is reserved for
/// failures talking to the registry.
#[async_trait]
pub trait HostRegistry: Send + Sync {
    /// Look up a group id by exact name
    async fn group_exists(&self, name: &str) -> Result<Option<String>, crate::Error>;

    /// Create a group and return its id
    async fn create_group(&self, name: &str) -> Result<String, crate::Error>;

    /// Delete a group by id
    async fn delete_group(&self, id: &str) -> Result<(), crate::Error>;

    /// Look up a host id by exact technical name
    async fn host_exists(&self, name: &str) -> Result<Option<String>, crate::Error>;

    /// Create a host and return its id
    async fn create_host(&self, spec: &HostSpec) -> Result<String, crate::Error>;

    /// Delete a host by id
    async fn delete_host(&self, id: &str) -> Result<(), crate::Error>;

    /// Registry name (for logging/debugging)
    fn registry_name(&self) -> &'static str;
}
