//! Configuration types for the discovery system
//!
//! This module defines all configuration structures used throughout the crate.
//! The JSON layout accepts the key names of the legacy deployment
//! (`pylld`, `zabbix`, `hostgrp`, `posfix`) as aliases.

use crate::oid::OidOrdering;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LldConfig {
    /// SNMP agents to discover
    #[serde(default)]
    pub hosts: Vec<HostConfig>,

    /// Discovery-wide settings
    #[serde(alias = "pylld")]
    pub discovery: DiscoveryConfig,

    /// Registry endpoint
    #[serde(alias = "zabbix")]
    pub registry: RegistryConfig,

    /// DNS servers for the availability checks
    #[serde(default)]
    pub dns_servers: Vec<DnsServerConfig>,
}

impl LldConfig {
    /// Load and validate configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a JSON document
    pub fn from_json(raw: &str) -> Result<Self, crate::Error> {
        let config = Self::parse_json(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON file without validating it
    ///
    /// For callers that patch the result (environment overrides) before
    /// calling [`LldConfig::validate`].
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse_json(&raw)
    }

    /// Parse a JSON document without validating it
    pub fn parse_json(raw: &str) -> Result<Self, crate::Error> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Validate the run-wide parts of the configuration
    ///
    /// Per-host settings (protocol version, credentials) are checked by
    /// [`HostConfig::validate`] when the engine builds its host tasks, so one
    /// bad host does not block the others.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.hosts.is_empty() && self.dns_servers.is_empty() {
            return Err(crate::Error::config("No hosts or DNS servers configured"));
        }

        self.discovery.validate()?;
        self.registry.validate()?;

        Ok(())
    }
}

/// One SNMP agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Agent address
    pub ip: String,

    /// Agent UDP port
    #[serde(default = "default_snmp_port")]
    pub port: u16,

    /// DNS name registered with the monitored interface
    #[serde(default)]
    pub hostname: String,

    /// Protocol settings as written in the file
    pub protocol: ProtocolConfig,
}

impl HostConfig {
    /// Create a host configuration with SNMPv3 authPriv credentials
    pub fn v3(ip: impl Into<String>, auth_key: impl Into<String>, priv_key: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            port: default_snmp_port(),
            hostname: String::new(),
            protocol: ProtocolConfig {
                version: 3,
                user: default_security_name(),
                auth_key: Some(auth_key.into()),
                auth_protocol: AuthAlgorithm::default(),
                priv_key: Some(priv_key.into()),
                priv_protocol: PrivAlgorithm::default(),
            },
        }
    }

    /// Set the DNS name
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Set the agent port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// `ip:port`
    pub fn target(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// Validate the host and resolve its protocol settings
    pub fn validate(&self) -> Result<SnmpProtocol, crate::Error> {
        if self.ip.trim().is_empty() {
            return Err(crate::Error::config("Host ip cannot be empty"));
        }
        if self.port == 0 {
            return Err(crate::Error::config(format!("Host {} has port 0", self.ip)));
        }

        self.protocol
            .resolve()
            .map_err(|e| crate::Error::config(format!("Host {}: {}", self.ip, e)))
    }
}

/// Protocol settings as written in the configuration file
///
/// Resolved into the closed [`SnmpProtocol`] enum before a host task starts.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// SNMP version number
    pub version: u8,

    /// USM security name
    #[serde(default = "default_security_name")]
    pub user: String,

    /// Authentication passphrase
    #[serde(default)]
    pub auth_key: Option<String>,

    /// Authentication protocol
    #[serde(default)]
    pub auth_protocol: AuthAlgorithm,

    /// Privacy passphrase
    #[serde(default)]
    pub priv_key: Option<String>,

    /// Privacy protocol
    #[serde(default)]
    pub priv_protocol: PrivAlgorithm,
}

impl std::fmt::Debug for ProtocolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolConfig")
            .field("version", &self.version)
            .field("user", &self.user)
            .field("auth_key", &self.auth_key.as_ref().map(|_| "<REDACTED>"))
            .field("auth_protocol", &self.auth_protocol)
            .field("priv_key", &self.priv_key.as_ref().map(|_| "<REDACTED>"))
            .field("priv_protocol", &self.priv_protocol)
            .finish()
    }
}

/// Minimum USM passphrase length (RFC 3414 §11.2)
const MIN_PASSPHRASE_LEN: usize = 8;

impl ProtocolConfig {
    /// Resolve into a supported protocol configuration
    pub fn resolve(&self) -> Result<SnmpProtocol, crate::Error> {
        match self.version {
            3 => {
                let auth_key = require_passphrase("auth_key", self.auth_key.as_deref())?;
                let priv_key = require_passphrase("priv_key", self.priv_key.as_deref())?;

                if self.user.is_empty() {
                    return Err(crate::Error::config("SNMPv3 user cannot be empty"));
                }

                Ok(SnmpProtocol::V3(UsmCredentials {
                    user: self.user.clone(),
                    auth_protocol: self.auth_protocol,
                    auth_key: auth_key.to_string(),
                    priv_protocol: self.priv_protocol,
                    priv_key: priv_key.to_string(),
                }))
            }
            other => Err(crate::Error::config(format!(
                "SNMP version {} is not supported (only 3 with authPriv)",
                other
            ))),
        }
    }
}

fn require_passphrase<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, crate::Error> {
    match value {
        None | Some("") => Err(crate::Error::config(format!("SNMPv3 {} is required", field))),
        Some(v) if v.len() < MIN_PASSPHRASE_LEN => Err(crate::Error::config(format!(
            "SNMPv3 {} must be at least {} characters",
            field, MIN_PASSPHRASE_LEN
        ))),
        Some(v) => Ok(v),
    }
}

/// Supported protocol configurations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpProtocol {
    /// SNMPv3, USM authPriv
    V3(UsmCredentials),
}

/// SNMPv3 USM credentials (authPriv)
#[derive(Clone, PartialEq, Eq)]
pub struct UsmCredentials {
    pub user: String,
    pub auth_protocol: AuthAlgorithm,
    pub auth_key: String,
    pub priv_protocol: PrivAlgorithm,
    pub priv_key: String,
}

// Custom Debug implementation that hides both passphrases
impl std::fmt::Debug for UsmCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsmCredentials")
            .field("user", &self.user)
            .field("auth_protocol", &self.auth_protocol)
            .field("auth_key", &"<REDACTED>")
            .field("priv_protocol", &self.priv_protocol)
            .field("priv_key", &"<REDACTED>")
            .finish()
    }
}

/// USM authentication protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthAlgorithm {
    #[default]
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl AuthAlgorithm {
    /// Numeric code used by the registry's interface details
    pub fn registry_code(self) -> u8 {
        match self {
            AuthAlgorithm::Md5 => 0,
            AuthAlgorithm::Sha1 => 1,
            AuthAlgorithm::Sha224 => 2,
            AuthAlgorithm::Sha256 => 3,
            AuthAlgorithm::Sha384 => 4,
            AuthAlgorithm::Sha512 => 5,
        }
    }
}

/// USM privacy protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivAlgorithm {
    #[default]
    Des,
    Aes128,
    Aes192,
    Aes256,
}

impl PrivAlgorithm {
    /// Numeric code used by the registry's interface details
    pub fn registry_code(self) -> u8 {
        match self {
            PrivAlgorithm::Des => 0,
            PrivAlgorithm::Aes128 => 1,
            PrivAlgorithm::Aes192 => 2,
            PrivAlgorithm::Aes256 => 3,
        }
    }
}

/// Discovery-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Storage descriptions matching this pattern (at the start) are dropped
    #[serde(default)]
    pub filter_fs_names: String,

    /// Registry group every discovered host is placed in
    #[serde(alias = "hostgrp")]
    pub host_group: String,

    /// Appended to `sysName` to form the registry host name
    #[serde(alias = "posfix")]
    pub name_suffix: String,

    /// Value of the `{$SCRIPT_NAME}` macro on created hosts
    #[serde(default = "default_script_name")]
    pub script_name: String,

    /// OID order used for walk boundaries
    #[serde(default)]
    pub oid_ordering: OidOrdering,

    /// Delete and re-create an existing group once per run
    #[serde(default)]
    pub recreate_group: bool,

    /// Capacity of the engine event channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl DiscoveryConfig {
    /// Create discovery settings with defaults
    pub fn new(host_group: impl Into<String>, name_suffix: impl Into<String>) -> Self {
        Self {
            filter_fs_names: String::new(),
            host_group: host_group.into(),
            name_suffix: name_suffix.into(),
            script_name: default_script_name(),
            oid_ordering: OidOrdering::default(),
            recreate_group: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Set the storage exclusion pattern
    pub fn with_filter(mut self, pattern: impl Into<String>) -> Self {
        self.filter_fs_names = pattern.into();
        self
    }

    /// Set the walk boundary ordering
    pub fn with_oid_ordering(mut self, ordering: OidOrdering) -> Self {
        self.oid_ordering = ordering;
        self
    }

    /// Re-create the host group on the first reconciliation of a run
    pub fn with_recreate_group(mut self, recreate: bool) -> Self {
        self.recreate_group = recreate;
        self
    }

    /// Compile the exclusion pattern
    ///
    /// The pattern is anchored at the start of the description. An empty
    /// pattern means "exclude nothing".
    pub fn exclusion_regex(&self) -> Result<Option<Regex>, crate::Error> {
        if self.filter_fs_names.is_empty() {
            return Ok(None);
        }

        Regex::new(&format!("^(?:{})", self.filter_fs_names))
            .map(Some)
            .map_err(|e| crate::Error::config(format!("Invalid filter_fs_names: {}", e)))
    }

    /// Validate the discovery settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.host_group.is_empty() {
            return Err(crate::Error::config("Host group cannot be empty"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        self.exclusion_regex()?;
        Ok(())
    }
}

/// Registry endpoint
#[derive(Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL of the registry frontend
    #[serde(default = "default_registry_url")]
    pub url: String,

    /// API token (may be supplied from the environment instead)
    #[serde(default)]
    pub api_token: String,

    /// Verify the registry's TLS certificate
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,

    /// HTTP timeout (in seconds)
    #[serde(default = "default_registry_timeout_secs")]
    pub timeout_secs: u64,

    /// Send the token in the request's `auth` field instead of a Bearer
    /// header (Zabbix 5.4 to 6.2)
    #[serde(default)]
    pub auth_in_body: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("url", &self.url)
            .field("api_token", &"<REDACTED>")
            .field("verify_tls", &self.verify_tls)
            .field("timeout_secs", &self.timeout_secs)
            .field("auth_in_body", &self.auth_in_body)
            .finish()
    }
}

impl RegistryConfig {
    /// Create a registry configuration with defaults
    pub fn new(url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_token: api_token.into(),
            verify_tls: default_verify_tls(),
            timeout_secs: default_registry_timeout_secs(),
            auth_in_body: false,
        }
    }

    /// Validate the registry configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(crate::Error::config(format!(
                "Registry URL must use HTTP or HTTPS scheme. Got: {}",
                self.url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Registry timeout must be > 0"));
        }
        Ok(())
    }
}

/// One DNS server to check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsServerConfig {
    /// Server address (IPv4 only)
    pub ip: Ipv4Addr,

    /// Server port
    #[serde(default = "default_dns_port")]
    pub port: u16,

    /// Hostname for the forward-resolution check (skipped when absent)
    #[serde(default)]
    pub probe_hostname: Option<String>,

    /// Per-query timeout (in milliseconds)
    #[serde(default = "default_dns_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_snmp_port() -> u16 {
    161
}

fn default_dns_port() -> u16 {
    53
}

fn default_dns_timeout_ms() -> u64 {
    3000
}

fn default_security_name() -> String {
    "bootstrap".to_string()
}

fn default_script_name() -> String {
    "lldd".to_string()
}

fn default_event_channel_capacity() -> usize {
    256
}

fn default_registry_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_verify_tls() -> bool {
    true
}

fn default_registry_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY_LAYOUT: &str = r#"{
        "hosts": [
            {"ip": "10.0.0.5", "port": 161, "hostname": "db1.example.net",
             "protocol": {"version": 3, "auth_key": "authpass123", "priv_key": "privpass123"}},
            {"ip": "10.0.0.6", "port": 161, "hostname": "legacy",
             "protocol": {"version": 2}}
        ],
        "pylld": {"filter_fs_names": "^/(proc|sys|run)", "hostgrp": "Discovered", "posfix": "snmp"},
        "zabbix": {"api_token": "0123456789abcdef0123"}
    }"#;

    #[test]
    fn test_legacy_layout_parses() {
        let config = LldConfig::from_json(LEGACY_LAYOUT).unwrap();

        assert_eq!(config.hosts.len(), 2);
        assert_eq!(config.discovery.host_group, "Discovered");
        assert_eq!(config.discovery.name_suffix, "snmp");
        assert_eq!(config.discovery.oid_ordering, OidOrdering::Numeric);
        assert_eq!(config.registry.url, "http://127.0.0.1:8080");
        assert!(config.registry.verify_tls);
    }

    #[test]
    fn test_protocol_version_is_checked_per_host() {
        let config = LldConfig::from_json(LEGACY_LAYOUT).unwrap();

        let good = config.hosts[0].validate().unwrap();
        let SnmpProtocol::V3(creds) = good;
        assert_eq!(creds.user, "bootstrap");
        assert_eq!(creds.auth_protocol, AuthAlgorithm::Md5);
        assert_eq!(creds.priv_protocol, PrivAlgorithm::Des);

        let err = config.hosts[1].validate().unwrap_err();
        assert!(err.to_string().contains("version 2"));
    }

    #[test]
    fn test_short_or_missing_keys_rejected() {
        let mut host = HostConfig::v3("10.0.0.1", "short", "privpass123");
        assert!(host.validate().is_err());

        host.protocol.auth_key = None;
        assert!(host.validate().is_err());

        let host = HostConfig::v3("", "authpass123", "privpass123");
        assert!(host.validate().is_err());
    }

    #[test]
    fn test_exclusion_regex_is_prefix_anchored() {
        let discovery = DiscoveryConfig::new("g", "s").with_filter("/proc|/sys");
        let re = discovery.exclusion_regex().unwrap().unwrap();

        assert!(re.is_match("/proc"));
        assert!(re.is_match("/sys/fs/cgroup"));
        assert!(!re.is_match("/data/proc"));

        assert!(DiscoveryConfig::new("g", "s").exclusion_regex().unwrap().is_none());
        assert!(DiscoveryConfig::new("g", "s").with_filter("(").validate().is_err());
    }

    #[test]
    fn test_secrets_not_exposed_in_debug() {
        let host = HostConfig::v3("10.0.0.1", "authsecret1", "privsecret1");
        let SnmpProtocol::V3(creds) = host.validate().unwrap();
        let registry = RegistryConfig::new("https://zbx.example.net", "tokensecret");

        for rendered in [format!("{:?}", host), format!("{:?}", creds), format!("{:?}", registry)] {
            assert!(!rendered.contains("authsecret1"));
            assert!(!rendered.contains("privsecret1"));
            assert!(!rendered.contains("tokensecret"));
        }
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, LEGACY_LAYOUT.as_bytes()).unwrap();

        let config = LldConfig::from_file(file.path()).unwrap();
        assert_eq!(config.hosts[0].target(), "10.0.0.5:161");

        assert!(LldConfig::from_file("/nonexistent/lld.json").is_err());
    }

    #[test]
    fn test_read_file_defers_validation() {
        let raw = LEGACY_LAYOUT.replace(r#""api_token""#, r#""url": "ftp://zbx", "api_token""#);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, raw.as_bytes()).unwrap();

        assert!(LldConfig::from_file(file.path()).is_err());

        let mut config = LldConfig::read_file(file.path()).unwrap();
        assert!(config.validate().is_err());
        config.registry.url = "https://zbx.example.net".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_string_ordering_and_registry_options() {
        let raw = r#"{
            "hosts": [{"ip": "10.0.0.5", "protocol": {"version": 3, "auth_key": "authpass123", "priv_key": "privpass123"}}],
            "discovery": {"host_group": "Discovered", "name_suffix": "snmp",
                          "oid_ordering": "legacy_string", "recreate_group": true},
            "registry": {"url": "https://zbx.example.net", "api_token": "t", "auth_in_body": true}
        }"#;
        let config = LldConfig::from_json(raw).unwrap();

        assert_eq!(config.discovery.oid_ordering, OidOrdering::LegacyString);
        assert!(config.discovery.recreate_group);
        assert!(config.registry.auth_in_body);

        let defaults = LldConfig::from_json(LEGACY_LAYOUT).unwrap();
        assert!(!defaults.discovery.recreate_group);
        assert!(!defaults.registry.auth_in_body);
    }

    #[test]
    fn test_registry_url_scheme() {
        assert!(RegistryConfig::new("ftp://zbx", "t").validate().is_err());
        assert!(RegistryConfig::new("http://zbx", "t").validate().is_ok());
    }
}
