// # lld-core
//
// Core library for SNMP storage discovery and monitoring-registry reconciliation.
//
// ## Architecture Overview
//
// - **OidAddress**: Numeric OID value type with subtree boundary arithmetic
// - **ProbeOutcome**: Raw request outcome and the shared classification policy
// - **SnmpTransport**: Trait for one SNMP PDU round trip (codec supplied elsewhere)
// - **SnmpSession**: Single-value fetch and bounded subtree walk over one transport
// - **StorageDiscovery**: Index-keyed merge of the storage type/description tables
// - **HostRegistry**: Trait for the monitoring system's group/host inventory
// - **HostReconciler**: Destructive upsert of discovered hosts into the registry
// - **DiscoveryEngine**: One concurrent task per host, awaited jointly
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Discovery logic is separate from wire codecs and registries
// 2. **Fail-Independent**: A failing probe or host never aborts the run
// 3. **No Hidden Retries**: Every transport call is single-shot; retry policy belongs to the operator
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Explicit Configuration**: No process-wide mutable state

pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod mib;
pub mod oid;
pub mod outcome;
pub mod reconcile;
pub mod session;
pub mod traits;

// Re-export core types for convenience
pub use config::{
    AuthAlgorithm, DiscoveryConfig, DnsServerConfig, HostConfig, LldConfig, PrivAlgorithm, ProtocolConfig,
    RegistryConfig, SnmpProtocol, UsmCredentials,
};
pub use discovery::{HostFacts, StorageDiscovery, StorageEntry, StorageKind, StorageSet};
pub use engine::{DiscoveryEngine, EngineEvent, HostReport, RunReport};
pub use reconcile::ReconcileOutcome;
pub use error::{Error, Result};
pub use oid::{OidAddress, OidOrdering};
pub use outcome::{FailureKind, ProbeMode, ProbeOutcome, Verdict};
pub use reconcile::HostReconciler;
pub use session::{SnmpSession, StopReason, TableRow, TableWalk};
pub use traits::{HostRegistry, SnmpTransport, SnmpTransportFactory, SnmpValue, VarBinding};
