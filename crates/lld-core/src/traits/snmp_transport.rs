// # SNMP Transport Trait
//
// Defines the interface for one SNMP PDU round trip.
//
// ## Implementations
//
// - async-snmp (SNMPv3 USM over UDP): `lld-transport-snmp` crate
// - Test doubles: scripted transports in `lld-core/tests/common`
//
// ## Usage
//
// ```rust,ignore
// use lld_core::{SnmpTransport, ProbeOutcome};
//
// let transport = /* SnmpTransport implementation */;
// match transport.get_next(&base).await {
//     ProbeOutcome::Success(binding) => println!("{} = {}", binding.oid, binding.value),
//     other => println!("no data: {:?}", other),
// }
// ```

use crate::config::{HostConfig, SnmpProtocol};
use crate::oid::OidAddress;
use crate::outcome::ProbeOutcome;
use async_trait::async_trait;
use std::fmt;
use std::net::Ipv4Addr;

/// Value carried by a variable binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpValue {
    Integer(i64),
    OctetString(Vec<u8>),
    ObjectId(OidAddress),
    IpAddress(Ipv4Addr),
    Counter(u64),
    Gauge(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Null,
}

impl SnmpValue {
    /// Build an octet string value from text
    pub fn text(s: impl Into<String>) -> Self {
        SnmpValue::OctetString(s.into().into_bytes())
    }

    /// The value as an OID, if it is one
    pub fn as_oid(&self) -> Option<&OidAddress> {
        match self {
            SnmpValue::ObjectId(oid) => Some(oid),
            _ => None,
        }
    }

    /// Printable rendering; octet strings are decoded lossily as UTF-8
    pub fn as_text(&self) -> String {
        match self {
            SnmpValue::OctetString(bytes) | SnmpValue::Opaque(bytes) => {
                String::from_utf8_lossy(bytes).into_owned()
            }
            other => other.to_string(),
        }
    }
}

impl fmt::Display for SnmpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnmpValue::Integer(v) => write!(f, "{}", v),
            SnmpValue::OctetString(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            SnmpValue::ObjectId(oid) => write!(f, "{}", oid),
            SnmpValue::IpAddress(ip) => write!(f, "{}", ip),
            SnmpValue::Counter(v) => write!(f, "{}", v),
            SnmpValue::Gauge(v) => write!(f, "{}", v),
            SnmpValue::TimeTicks(ticks) => {
                let secs = ticks / 100;
                write!(
                    f,
                    "{}d {:02}:{:02}:{:02}",
                    secs / 86_400,
                    (secs % 86_400) / 3_600,
                    (secs % 3_600) / 60,
                    secs % 60
                )
            }
            SnmpValue::Opaque(bytes) => write!(f, "opaque({} bytes)", bytes.len()),
            SnmpValue::Null => write!(f, "null"),
        }
    }
}

/// One `oid = value` pair returned by the agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBinding {
    pub oid: OidAddress,
    pub value: SnmpValue,
}

impl VarBinding {
    pub fn new(oid: OidAddress, value: SnmpValue) -> Self {
        Self { oid, value }
    }
}

/// Trait for SNMP transport implementations
///
/// One call is one PDU round trip against one agent. Implementations own the
/// wire codec, the security model and the socket.
///
/// # Contract
///
/// - Exactly one request per call; no retries (the library must be configured
///   accordingly).
/// - Exception values (`noSuchObject`, `noSuchInstance`, `endOfMibView`) are
///   reported as [`ProbeOutcome::EmptyAnswer`], never as a value.
/// - A non-zero error-status is [`ProbeOutcome::ProtocolError`] carrying the
///   status code and the error index in `detail`.
#[async_trait]
pub trait SnmpTransport: Send + Sync {
    /// GET a single object instance
    async fn get(&self, oid: &OidAddress) -> ProbeOutcome<VarBinding>;

    /// GETNEXT: the first object lexicographically after `oid`
    async fn get_next(&self, oid: &OidAddress) -> ProbeOutcome<VarBinding>;

    /// Target description for logs (`ip:port`)
    fn target(&self) -> String;
}

/// Helper trait for constructing transports from host configuration
#[async_trait]
pub trait SnmpTransportFactory: Send + Sync {
    /// Bind a transport for one host
    ///
    /// # Parameters
    ///
    /// - `host`: The host's address and port
    /// - `protocol`: Validated protocol settings for that host
    async fn connect(
        &self,
        host: &HostConfig,
        protocol: &SnmpProtocol,
    ) -> Result<Box<dyn SnmpTransport>, crate::Error>;
}
