// # SNMPv3 Transport
//
// This crate provides the `SnmpTransport` implementation for the LLD system,
// backed by the `async-snmp` client.
//
// ## Implementation Status
//
// - ✅ SNMPv3 USM authPriv (MD5/SHA auth, DES/AES privacy)
// - ✅ One PDU per call, library retries disabled (`Retry::none()`)
// - ✅ Per-call timeout
// - ✅ Exception values mapped to `EmptyAnswer`
// - ✅ Error-status mapped to `ProtocolError` with status code and index
// - ❌ NO retry logic (intentionally omitted - failures degrade the walk)
// - ❌ NO GETBULK (one get-next per row keeps the walk boundary exact)
// - ❌ NO SNMPv1/v2c (rejected during host validation)
//
// ## Trust Level: Untrusted (Transport)
//
// Transports talk to one agent only and never log passphrases.

use async_snmp::client::Retry;
use async_snmp::{Auth, AuthProtocol, Client, Oid, PrivProtocol, Value};
use async_trait::async_trait;
use lld_core::config::{AuthAlgorithm, HostConfig, PrivAlgorithm, SnmpProtocol};
use lld_core::traits::{SnmpTransport, SnmpTransportFactory, SnmpValue, VarBinding};
use lld_core::{Error, OidAddress, ProbeOutcome, Result};
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::debug;

/// Default per-request timeout
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// SNMPv3 transport for one agent
pub struct AsyncSnmpTransport {
    client: Client,
    target: String,
}

impl AsyncSnmpTransport {
    /// Connect to `target` (`ip:port`) with USM authPriv credentials
    ///
    /// No request is sent here; engine discovery happens on the first call.
    pub async fn connect(target: String, protocol: &SnmpProtocol, timeout: Duration) -> Result<Self> {
        let SnmpProtocol::V3(creds) = protocol;

        let auth = Auth::usm(creds.user.as_str())
            .auth(auth_protocol(creds.auth_protocol), creds.auth_key.as_str())
            .privacy(priv_protocol(creds.priv_protocol), creds.priv_key.as_str());

        let client = Client::builder(target.as_str(), auth)
            .timeout(timeout)
            .retry(Retry::none())
            .connect()
            .await
            .map_err(|e| Error::transport(format!("{}: {}", target, e)))?;

        debug!("SNMPv3 client ready for {} (user {})", target, creds.user);

        Ok(Self { client, target })
    }
}

#[async_trait]
impl SnmpTransport for AsyncSnmpTransport {
    async fn get(&self, oid: &OidAddress) -> ProbeOutcome<VarBinding> {
        match self.client.get(&to_wire_oid(oid)).await {
            Ok(vb) => binding_outcome(vb.oid, vb.value),
            Err(e) => error_outcome(&e),
        }
    }

    async fn get_next(&self, oid: &OidAddress) -> ProbeOutcome<VarBinding> {
        match self.client.get_next(&to_wire_oid(oid)).await {
            Ok(vb) => binding_outcome(vb.oid, vb.value),
            Err(e) => error_outcome(&e),
        }
    }

    fn target(&self) -> String {
        self.target.clone()
    }
}

impl std::fmt::Debug for AsyncSnmpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncSnmpTransport")
            .field("target", &self.target)
            .finish()
    }
}

/// Factory binding one [`AsyncSnmpTransport`] per host
#[derive(Debug, Clone)]
pub struct AsyncSnmpFactory {
    timeout: Duration,
}

impl AsyncSnmpFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for AsyncSnmpFactory {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

#[async_trait]
impl SnmpTransportFactory for AsyncSnmpFactory {
    async fn connect(&self, host: &HostConfig, protocol: &SnmpProtocol) -> Result<Box<dyn SnmpTransport>> {
        let transport = AsyncSnmpTransport::connect(host.target(), protocol, self.timeout).await?;
        Ok(Box::new(transport))
    }
}

fn auth_protocol(algorithm: AuthAlgorithm) -> AuthProtocol {
    match algorithm {
        AuthAlgorithm::Md5 => AuthProtocol::Md5,
        AuthAlgorithm::Sha1 => AuthProtocol::Sha1,
        AuthAlgorithm::Sha224 => AuthProtocol::Sha224,
        AuthAlgorithm::Sha256 => AuthProtocol::Sha256,
        AuthAlgorithm::Sha384 => AuthProtocol::Sha384,
        AuthAlgorithm::Sha512 => AuthProtocol::Sha512,
    }
}

fn priv_protocol(algorithm: PrivAlgorithm) -> PrivProtocol {
    match algorithm {
        PrivAlgorithm::Des => PrivProtocol::Des,
        PrivAlgorithm::Aes128 => PrivProtocol::Aes128,
        PrivAlgorithm::Aes192 => PrivProtocol::Aes192,
        PrivAlgorithm::Aes256 => PrivProtocol::Aes256,
    }
}

fn to_wire_oid(oid: &OidAddress) -> Oid {
    Oid::from_slice(oid.arcs())
}

fn from_wire_oid(oid: &Oid) -> OidAddress {
    OidAddress::from(oid.arcs())
}

/// Convert a wire value; `None` for exception values
fn convert_value(value: Value) -> Option<SnmpValue> {
    let converted = match value {
        Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => return None,
        Value::Integer(v) => SnmpValue::Integer(i64::from(v)),
        Value::OctetString(bytes) => SnmpValue::OctetString(bytes.to_vec()),
        Value::Null => SnmpValue::Null,
        Value::ObjectIdentifier(oid) => SnmpValue::ObjectId(from_wire_oid(&oid)),
        Value::IpAddress(octets) => SnmpValue::IpAddress(Ipv4Addr::from(octets)),
        Value::Counter32(v) => SnmpValue::Counter(u64::from(v)),
        Value::Gauge32(v) => SnmpValue::Gauge(v),
        Value::TimeTicks(v) => SnmpValue::TimeTicks(v),
        Value::Opaque(bytes) => SnmpValue::Opaque(bytes.to_vec()),
        Value::Counter64(v) => SnmpValue::Counter(v),
        Value::Unknown { data, .. } => SnmpValue::Opaque(data.to_vec()),
        _ => SnmpValue::Null,
    };
    Some(converted)
}

fn binding_outcome(oid: Oid, value: Value) -> ProbeOutcome<VarBinding> {
    match convert_value(value) {
        Some(value) => ProbeOutcome::Success(VarBinding::new(from_wire_oid(&oid), value)),
        None => ProbeOutcome::EmptyAnswer,
    }
}

fn error_outcome(err: &async_snmp::Error) -> ProbeOutcome<VarBinding> {
    match err {
        async_snmp::Error::Timeout { .. } => ProbeOutcome::Timeout,
        async_snmp::Error::Snmp { status, index, oid, .. } => ProbeOutcome::ProtocolError {
            code: status.as_i32(),
            detail: match oid {
                Some(oid) => format!("{} at index {} ({})", status, index, oid),
                None => format!("{} at index {}", status, index),
            },
        },
        other => ProbeOutcome::TransportError(other.to_string()),
    }
}
