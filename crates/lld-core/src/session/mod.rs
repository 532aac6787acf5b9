//! SNMP session over one transport binding
//!
//! A session owns exactly one [`SnmpTransport`] (and through it one set of
//! credentials) for one host. It is never shared between hosts.

mod walk;

pub use walk::{StopReason, TableRow, TableWalk};

use crate::config::{HostConfig, SnmpProtocol};
use crate::error::Result;
use crate::mib;
use crate::oid::{OidAddress, OidOrdering};
use crate::outcome::ProbeMode;
use crate::traits::{SnmpTransport, SnmpTransportFactory, SnmpValue};
use tracing::debug;

/// Authenticated SNMP session for one host
pub struct SnmpSession {
    transport: Box<dyn SnmpTransport>,
    ordering: OidOrdering,
}

impl SnmpSession {
    /// Wrap an already bound transport
    pub fn new(transport: Box<dyn SnmpTransport>, ordering: OidOrdering) -> Self {
        Self { transport, ordering }
    }

    /// Bind a transport for `host` through `factory`
    pub async fn connect(
        factory: &dyn SnmpTransportFactory,
        host: &HostConfig,
        protocol: &SnmpProtocol,
        ordering: OidOrdering,
    ) -> Result<Self> {
        let transport = factory.connect(host, protocol).await?;
        debug!("Session bound to {}", transport.target());
        Ok(Self::new(transport, ordering))
    }

    /// Target description (`ip:port`)
    pub fn target(&self) -> String {
        self.transport.target()
    }

    /// GET one value; `None` (logged) on any failure
    pub async fn get_single_value(&self, oid: &OidAddress) -> Option<SnmpValue> {
        self.transport
            .get(oid)
            .await
            .classify(ProbeMode::Resolution, &self.transport.target(), &oid.to_string())
            .into_payload()
            .map(|binding| binding.value)
    }

    /// GET one value addressed by MIB symbol (`SNMPv2-MIB`, `sysName`, `[0]`)
    ///
    /// Fails only if the symbol is unknown; request failures yield `Ok(None)`.
    pub async fn get_named(&self, module: &str, symbol: &str, instance: &[u32]) -> Result<Option<SnmpValue>> {
        let oid = mib::resolve_instance(module, symbol, instance)?;
        Ok(self.get_single_value(&oid).await)
    }

    /// Walk the subtree rooted at `table`
    pub fn walk(&self, table: &OidAddress) -> TableWalk<'_> {
        TableWalk::new(self.transport.as_ref(), table.clone(), self.ordering)
    }
}

impl std::fmt::Debug for SnmpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnmpSession")
            .field("target", &self.transport.target())
            .field("ordering", &self.ordering)
            .finish()
    }
}
