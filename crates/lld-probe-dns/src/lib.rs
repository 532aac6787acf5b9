// # DNS Availability Probes
//
// Three independent checks that a DNS server at a given IPv4 address answers:
//
// - **Reverse lookup**: PTR query for the server's own address. NXDOMAIN counts
//   as alive (the server answered authoritatively), as does any PTR answer.
// - **Fast status**: one fixed `version.bind` TXT/CH datagram. Alive iff a
//   reply of at least a DNS header arrives and echoes the transaction id.
// - **Forward resolution**: A query for a known hostname. Alive iff at least
//   one A record comes back.
//
// Every check sends exactly one datagram and waits once; there are no retries.
// Outcomes are classified with the shared `ProbeOutcome` policy.

use lld_core::config::DnsServerConfig;
use lld_core::{ProbeMode, ProbeOutcome, Verdict};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, info};
use trust_dns_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use trust_dns_proto::rr::{Name, RecordType};

/// Default DNS port
pub const DEFAULT_DNS_PORT: u16 = 53;

/// Default per-query timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Transaction id of the fixed fast-status datagram
pub const FAST_PROBE_ID: u16 = 0x7777;

/// Size of a DNS header; anything shorter is not a DNS reply
const DNS_HEADER_LEN: usize = 12;

/// Largest reply read from the socket
const MAX_REPLY_LEN: usize = 4096;

/// Rcode reported for replies that are not usable DNS messages
const MALFORMED_REPLY: i32 = -1;

/// Transaction id used by the fast status probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionId {
    /// Always [`FAST_PROBE_ID`] (byte-identical datagram on every run)
    #[default]
    Fixed,
    /// A fresh random id per probe
    Random,
}

impl TransactionId {
    fn next(self) -> u16 {
        match self {
            TransactionId::Fixed => FAST_PROBE_ID,
            TransactionId::Random => rand::random(),
        }
    }
}

/// Result of running every check against one server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsAvailability {
    pub server: SocketAddr,
    pub reverse_lookup: bool,
    pub fast_status: bool,
    /// `None` when no hostname was given
    pub forward_resolution: Option<bool>,
}

impl DnsAvailability {
    /// Any check proved the server alive
    pub fn is_available(&self) -> bool {
        self.reverse_lookup || self.fast_status || self.forward_resolution.unwrap_or(false)
    }
}

/// Availability probe for one DNS server
#[derive(Debug, Clone)]
pub struct DnsAvailabilityProbe {
    ip: Ipv4Addr,
    port: u16,
    timeout: Duration,
    fast_id: TransactionId,
}

impl DnsAvailabilityProbe {
    /// Probe `ip` on port 53 with the default timeout
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            port: DEFAULT_DNS_PORT,
            timeout: DEFAULT_TIMEOUT,
            fast_id: TransactionId::default(),
        }
    }

    /// Probe built from a configured server entry
    pub fn from_config(config: &DnsServerConfig) -> Self {
        Self::new(config.ip)
            .with_port(config.port)
            .with_timeout(Duration::from_millis(config.timeout_ms))
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Choose the transaction id of the fast status datagram
    pub fn with_transaction_id(mut self, fast_id: TransactionId) -> Self {
        self.fast_id = fast_id;
        self
    }

    /// Server address
    pub fn server(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.ip, self.port))
    }

    /// PTR query for the server's own address
    pub async fn reverse_lookup(&self) -> bool {
        let qname = reverse_name(self.ip);
        let outcome = self.query(&qname, RecordType::PTR).await;

        match outcome.classify(ProbeMode::Liveness, &self.server().to_string(), &qname) {
            Verdict::Deliver(reply) => has_answer(&reply, RecordType::PTR),
            Verdict::Available => true,
            Verdict::Unavailable(_) => false,
        }
    }

    /// Fixed `version.bind` datagram, reply id must echo the request id
    pub async fn fast_status(&self) -> bool {
        let id = self.fast_id.next();
        let outcome = self.exchange(&version_bind_query(id)).await;

        let checked = match outcome {
            ProbeOutcome::Success(reply) => check_fast_reply(id, &reply),
            other => other.map(|_| ()),
        };

        checked
            .classify(ProbeMode::Liveness, &self.server().to_string(), "version.bind")
            .is_available()
    }

    /// A query for `hostname`
    pub async fn forward_resolution(&self, hostname: &str) -> bool {
        let outcome = self.query(hostname, RecordType::A).await;

        match outcome.classify(ProbeMode::Resolution, &self.server().to_string(), hostname) {
            Verdict::Deliver(reply) => has_answer(&reply, RecordType::A),
            Verdict::Available | Verdict::Unavailable(_) => false,
        }
    }

    /// Run every check, sequentially
    pub async fn probe_all(&self, hostname: Option<&str>) -> DnsAvailability {
        let reverse_lookup = self.reverse_lookup().await;
        let fast_status = self.fast_status().await;
        let forward_resolution = match hostname {
            Some(name) => Some(self.forward_resolution(name).await),
            None => None,
        };

        let availability = DnsAvailability {
            server: self.server(),
            reverse_lookup,
            fast_status,
            forward_resolution,
        };
        info!(
            "DNS {}: reverse={} fast={} forward={:?}",
            availability.server, reverse_lookup, fast_status, forward_resolution
        );
        availability
    }

    /// Encode, send and decode one standard query
    async fn query(&self, qname: &str, qtype: RecordType) -> ProbeOutcome<Message> {
        let id: u16 = rand::random();
        let request = match build_query(id, qname, qtype) {
            Ok(bytes) => bytes,
            Err(e) => return ProbeOutcome::TransportError(format!("cannot encode query for {}: {}", qname, e)),
        };

        match self.exchange(&request).await {
            ProbeOutcome::Success(reply) => decode_reply(id, &reply),
            other => other.map(|_| Message::new()),
        }
    }

    /// Send one datagram and wait once for the reply
    async fn exchange(&self, payload: &[u8]) -> ProbeOutcome<Vec<u8>> {
        let socket = match UdpSocket::bind("0.0.0.0:0").await {
            Ok(socket) => socket,
            Err(e) => return ProbeOutcome::TransportError(format!("bind failed: {}", e)),
        };
        if let Err(e) = socket.connect(self.server()).await {
            return ProbeOutcome::TransportError(format!("connect failed: {}", e));
        }
        if let Err(e) = socket.send(payload).await {
            return ProbeOutcome::TransportError(format!("send failed: {}", e));
        }

        let mut buf = vec![0u8; MAX_REPLY_LEN];
        match tokio::time::timeout(self.timeout, socket.recv(&mut buf)).await {
            Ok(Ok(n)) => {
                debug!("{}: {} byte reply", self.server(), n);
                buf.truncate(n);
                ProbeOutcome::Success(buf)
            }
            Ok(Err(e)) => ProbeOutcome::TransportError(format!("recv failed: {}", e)),
            Err(_) => ProbeOutcome::Timeout,
        }
    }
}

/// `d.c.b.a.in-addr.arpa.` for `a.b.c.d`
pub fn reverse_name(ip: Ipv4Addr) -> String {
    let [a, b, c, d] = ip.octets();
    format!("{}.{}.{}.{}.in-addr.arpa.", d, c, b, a)
}

/// The fast-status datagram: `version.bind` TXT, class CHAOS, RD set
pub fn version_bind_query(id: u16) -> Vec<u8> {
    let mut packet = id.to_be_bytes().to_vec();
    // Flags: standard query, recursion desired
    packet.extend_from_slice(&[0x01, 0x00]);
    // QDCOUNT = 1, ANCOUNT = NSCOUNT = ARCOUNT = 0
    packet.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

    for label in ["version", "bind"] {
        packet.push(label.len() as u8);
        packet.extend_from_slice(label.as_bytes());
    }
    packet.push(0x00);

    // QTYPE = TXT (16), QCLASS = CHAOS (3)
    packet.extend_from_slice(&[0x00, 0x10, 0x00, 0x03]);
    packet
}

fn check_fast_reply(id: u16, reply: &[u8]) -> ProbeOutcome<()> {
    if reply.len() < DNS_HEADER_LEN {
        return ProbeOutcome::ProtocolError {
            code: MALFORMED_REPLY,
            detail: format!("{} byte reply is shorter than a DNS header", reply.len()),
        };
    }
    if reply[..2] != id.to_be_bytes() {
        return ProbeOutcome::ProtocolError {
            code: MALFORMED_REPLY,
            detail: format!("reply id {:02x}{:02x} does not match {:04x}", reply[0], reply[1], id),
        };
    }
    ProbeOutcome::Success(())
}

fn build_query(id: u16, qname: &str, qtype: RecordType) -> Result<Vec<u8>, trust_dns_proto::error::ProtoError> {
    let name = Name::from_ascii(qname)?;

    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(Query::query(name, qtype));

    message.to_vec()
}

/// Decode a reply and map its rcode
fn decode_reply(id: u16, reply: &[u8]) -> ProbeOutcome<Message> {
    let message = match Message::from_vec(reply) {
        Ok(message) => message,
        Err(e) => {
            return ProbeOutcome::ProtocolError {
                code: MALFORMED_REPLY,
                detail: format!("undecodable reply: {}", e),
            };
        }
    };

    if message.id() != id {
        return ProbeOutcome::ProtocolError {
            code: MALFORMED_REPLY,
            detail: format!("reply id {} does not match query id {}", message.id(), id),
        };
    }

    match message.response_code() {
        ResponseCode::NoError => ProbeOutcome::Success(message),
        ResponseCode::NXDomain => ProbeOutcome::EmptyAnswer,
        other => ProbeOutcome::ProtocolError {
            code: i32::from(u16::from(other)),
            detail: other.to_string(),
        },
    }
}

fn has_answer(reply: &Message, qtype: RecordType) -> bool {
    reply.answers().iter().any(|record| record.record_type() == qtype)
}

/// Reverse PTR check against `ip:port`
pub async fn check_dns_available(ip: Ipv4Addr, port: u16, timeout: Duration) -> bool {
    DnsAvailabilityProbe::new(ip)
        .with_port(port)
        .with_timeout(timeout)
        .reverse_lookup()
        .await
}

/// Fast `version.bind` check against `ip:port`
pub async fn check_dns_available_fast(ip: Ipv4Addr, port: u16, timeout: Duration) -> bool {
    DnsAvailabilityProbe::new(ip)
        .with_port(port)
        .with_timeout(timeout)
        .fast_status()
        .await
}

/// A-record check for `hostname` against `ip:port`
pub async fn resolve_dns_available(hostname: &str, ip: Ipv4Addr, port: u16, timeout: Duration) -> bool {
    DnsAvailabilityProbe::new(ip)
        .with_port(port)
        .with_timeout(timeout)
        .forward_resolution(hostname)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_name() {
        assert_eq!(reverse_name(Ipv4Addr::new(8, 8, 4, 4)), "4.4.8.8.in-addr.arpa.");
        assert_eq!(reverse_name(Ipv4Addr::new(10, 0, 0, 5)), "5.0.0.10.in-addr.arpa.");
    }

    #[test]
    fn test_fixed_datagram_is_stable() {
        let expected: &[u8] = b"\x77\x77\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00\x07version\x04bind\x00\x00\x10\x00\x03";
        assert_eq!(version_bind_query(FAST_PROBE_ID), expected);
        assert_eq!(TransactionId::Fixed.next(), FAST_PROBE_ID);
    }

    #[test]
    fn test_fast_reply_checks() {
        let mut reply = version_bind_query(0x7777);
        assert_eq!(check_fast_reply(0x7777, &reply), ProbeOutcome::Success(()));

        reply[1] = 0x78;
        assert!(matches!(check_fast_reply(0x7777, &reply), ProbeOutcome::ProtocolError { .. }));
        assert!(matches!(check_fast_reply(0x7777, &[0x77, 0x77, 0x81]), ProbeOutcome::ProtocolError { .. }));
    }

    #[test]
    fn test_decode_reply_rcodes() {
        let query = build_query(42, "db1.example.net.", RecordType::A).unwrap();
        let mut message = Message::from_vec(&query).unwrap();
        message.set_message_type(MessageType::Response);

        message.set_response_code(ResponseCode::NXDomain);
        assert_eq!(decode_reply(42, &message.to_vec().unwrap()), ProbeOutcome::EmptyAnswer);

        message.set_response_code(ResponseCode::ServFail);
        assert!(matches!(
            decode_reply(42, &message.to_vec().unwrap()),
            ProbeOutcome::ProtocolError { code: 2, .. }
        ));

        message.set_response_code(ResponseCode::NoError);
        assert!(matches!(decode_reply(43, &message.to_vec().unwrap()), ProbeOutcome::ProtocolError { .. }));
        assert!(matches!(decode_reply(42, &[1, 2, 3]), ProbeOutcome::ProtocolError { .. }));
    }

    #[test]
    fn test_availability_summary() {
        let availability = DnsAvailability {
            server: "10.0.0.53:53".parse().unwrap(),
            reverse_lookup: false,
            fast_status: false,
            forward_resolution: Some(true),
        };
        assert!(availability.is_available());
    }
}
