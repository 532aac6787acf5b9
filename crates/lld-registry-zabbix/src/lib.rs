// # Zabbix Host Registry
//
// This crate provides the `HostRegistry` implementation for the LLD system,
// talking to the Zabbix JSON-RPC API.
//
// ## Implementation Status
//
// - ✅ One JSON-RPC call per trait method
// - ✅ Bearer token authentication (Zabbix 6.4+)
// - ✅ Token in the request `auth` field for 5.4 to 6.2 (`auth_in_body`)
// - ✅ HTTP timeout configured
// - ✅ Specific error handling for HTTP status codes (401, 403, 5xx)
// - ✅ JSON-RPC errors mapped to `Registry`, "already exists" to `RegistryConflict`
// - ✅ Dry-run mode for safe testing
// - ✅ Optional TLS verification bypass for self-signed frontends
// - ❌ NO retry logic (intentionally omitted - failures are reported per host)
// - ❌ NO caching (every lookup hits the API)
//
// ## Security Requirements
//
// - API token NEVER appears in logs
// - SNMPv3 passphrases are sent to the API but never logged
//
// ## API Reference
//
// - Endpoint: POST `{url}/api_jsonrpc.php`
// - `hostgroup.get` / `hostgroup.create` / `hostgroup.delete`
// - `host.get` / `host.create` / `host.delete`

use async_trait::async_trait;
use lld_core::config::RegistryConfig;
use lld_core::traits::{HostRegistry, HostSpec};
use lld_core::{Error, Result};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// JSON-RPC endpoint path below the frontend URL
const API_PATH: &str = "api_jsonrpc.php";

/// Zabbix interface type for SNMP agents
const INTERFACE_TYPE_SNMP: u8 = 2;

/// SNMPv3 security level authPriv
const SECURITY_LEVEL_AUTH_PRIV: u8 = 2;

/// Zabbix host registry
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the registry will:
/// - Perform all lookups (`*.get`)
/// - Log the intended create/delete payloads
/// - **NOT** actually modify the registry
pub struct ZabbixRegistry {
    /// Full JSON-RPC endpoint
    endpoint: String,

    /// Zabbix API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform lookups but skip writes
    dry_run: bool,

    /// Put the token in the request body rather than the Authorization header
    auth_in_body: bool,

    /// JSON-RPC request id
    request_id: AtomicU64,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for ZabbixRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZabbixRegistry")
            .field("endpoint", &self.endpoint)
            .field("api_token", &"<REDACTED>")
            .field("auth_in_body", &self.auth_in_body)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl ZabbixRegistry {
    /// Create a new Zabbix registry
    ///
    /// # Parameters
    ///
    /// - `config`: Frontend URL, API token, TLS and timeout settings
    /// - `dry_run`: If true, perform lookups but skip writes
    pub fn new(config: &RegistryConfig, dry_run: bool) -> Result<Self> {
        if config.api_token.is_empty() {
            return Err(Error::config("Zabbix API token is required"));
        }
        config.validate()?;

        if !config.verify_tls {
            tracing::warn!("TLS certificate verification disabled for {}", config.url);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint(&config.url),
            api_token: config.api_token.clone(),
            client,
            dry_run,
            auth_in_body: config.auth_in_body,
            request_id: AtomicU64::new(1),
        })
    }

    /// Create a registry, honouring `LLD_MODE=dry-run`
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let dry_run = std::env::var("LLD_MODE").unwrap_or_default().to_lowercase() == "dry-run";

        if dry_run {
            tracing::warn!("Zabbix registry running in DRY-RUN mode - no changes will be made");
        }

        Self::new(config, dry_run)
    }

    /// Perform one JSON-RPC call and return its `result`
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Zabbix call {} (id {})", method, id);

        let mut request = self.client.post(&self.endpoint);
        if !self.auth_in_body {
            request = request.bearer_auth(&self.api_token);
        }

        let response = request
            .json(&self.request_body(method, params, id))
            .send()
            .await
            .map_err(|e| Error::http(format!("{}: HTTP request failed: {}", method, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return match status.as_u16() {
                401 | 403 => Err(Error::registry(format!(
                    "Authentication failed: Invalid API token or insufficient permissions. Status: {}",
                    status
                ))),
                500..=599 => Err(Error::registry(format!(
                    "Zabbix server error (transient): {} - {}",
                    status, error_text
                ))),
                _ => Err(Error::registry(format!("{} failed: {} - {}", method, status, error_text))),
            };
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::registry(format!("{}: Failed to parse response: {}", method, e)))?;

        rpc_result(method, body)
    }

    /// JSON-RPC body, carrying the token when header auth is off
    fn request_body(&self, method: &str, params: Value, id: u64) -> Value {
        let auth = self.auth_in_body.then_some(self.api_token.as_str());
        rpc_request(method, params, id, auth)
    }

    /// Log a skipped write in dry-run mode
    fn dry_run_write(&self, method: &str, params: &Value) {
        tracing::info!("[DRY-RUN] Would call {} on {} with {}", method, self.endpoint, redact(params));
    }

    /// Look up the first id matching a `filter`
    async fn find_id(&self, method: &str, id_field: &str, filter: Value) -> Result<Option<String>> {
        let result = self
            .call(method, json!({ "output": [id_field], "filter": filter }))
            .await?;
        first_id(&result, id_field)
    }
}

#[async_trait]
impl HostRegistry for ZabbixRegistry {
    async fn group_exists(&self, name: &str) -> Result<Option<String>> {
        self.find_id("hostgroup.get", "groupid", json!({ "name": [name] })).await
    }

    async fn create_group(&self, name: &str) -> Result<String> {
        let params = json!({ "name": name });
        if self.dry_run {
            self.dry_run_write("hostgroup.create", &params);
            return Ok(format!("dry-run:{}", name));
        }

        let result = self.call("hostgroup.create", params).await?;
        created_id(&result, "groupids")
    }

    async fn delete_group(&self, id: &str) -> Result<()> {
        let params = json!([id]);
        if self.dry_run {
            self.dry_run_write("hostgroup.delete", &params);
            return Ok(());
        }

        self.call("hostgroup.delete", params).await?;
        Ok(())
    }

    async fn host_exists(&self, name: &str) -> Result<Option<String>> {
        self.find_id("host.get", "hostid", json!({ "host": [name] })).await
    }

    async fn create_host(&self, spec: &HostSpec) -> Result<String> {
        let params = host_create_params(spec);
        if self.dry_run {
            self.dry_run_write("host.create", &params);
            return Ok(format!("dry-run:{}", spec.name));
        }

        let result = self.call("host.create", params).await?;
        created_id(&result, "hostids")
    }

    async fn delete_host(&self, id: &str) -> Result<()> {
        let params = json!([id]);
        if self.dry_run {
            self.dry_run_write("host.delete", &params);
            return Ok(());
        }

        self.call("host.delete", params).await?;
        Ok(())
    }

    fn registry_name(&self) -> &'static str {
        "zabbix"
    }
}

fn endpoint(url: &str) -> String {
    format!("{}/{}", url.trim_end_matches('/'), API_PATH)
}

fn rpc_request(method: &str, params: Value, id: u64, auth: Option<&str>) -> Value {
    let mut request = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": id,
    });
    if let Some(token) = auth {
        request["auth"] = json!(token);
    }
    request
}

/// Extract `result` from a JSON-RPC response, mapping `error`
fn rpc_result(method: &str, mut body: Value) -> Result<Value> {
    if let Some(error) = body.get("error") {
        let message = error["message"].as_str().unwrap_or("unknown error");
        let data = error["data"].as_str().unwrap_or_default();
        let code = error["code"].as_i64().unwrap_or_default();

        if data.contains("already exist") || message.contains("already exist") {
            return Err(Error::conflict(format!("{}: {}", method, data)));
        }
        return Err(Error::registry(format!("{} failed ({}): {} {}", method, code, message, data)));
    }

    match body.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(Error::registry(format!("{}: Invalid response format: no result", method))),
    }
}

fn first_id(result: &Value, id_field: &str) -> Result<Option<String>> {
    let rows = result
        .as_array()
        .ok_or_else(|| Error::registry("Invalid response format: result is not an array"))?;

    match rows.first() {
        None => Ok(None),
        Some(row) => row[id_field]
            .as_str()
            .map(|id| Some(id.to_string()))
            .ok_or_else(|| Error::registry(format!("Invalid response format: {} is not a string", id_field))),
    }
}

fn created_id(result: &Value, ids_field: &str) -> Result<String> {
    result[ids_field]
        .as_array()
        .and_then(|ids| ids.first())
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::registry(format!("Invalid response format: missing {}", ids_field)))
}

fn host_create_params(spec: &HostSpec) -> Value {
    let iface = &spec.interface;
    let details = &iface.details;

    json!({
        "host": spec.name,
        "interfaces": [{
            "type": INTERFACE_TYPE_SNMP,
            "main": 1,
            "useip": u8::from(iface.use_ip),
            "ip": iface.ip,
            "dns": iface.dns,
            "port": iface.port.to_string(),
            "details": {
                "version": details.version,
                "bulk": u8::from(details.bulk),
                "securityname": details.security_name,
                "securitylevel": SECURITY_LEVEL_AUTH_PRIV,
                "authpassphrase": details.auth_passphrase,
                "authprotocol": details.auth_protocol,
                "privpassphrase": details.priv_passphrase,
                "privprotocol": details.priv_protocol,
            },
        }],
        "groups": [{ "groupid": spec.group_id }],
        "macros": spec.macros.iter().map(|m| json!({ "macro": m.macro_name, "value": m.value })).collect::<Vec<_>>(),
        "inventory_mode": -1,
    })
}

/// Copy of `params` with passphrases masked, for logging
fn redact(params: &Value) -> Value {
    let mut copy = params.clone();
    if let Some(interfaces) = copy["interfaces"].as_array_mut() {
        for iface in interfaces {
            for key in ["authpassphrase", "privpassphrase"] {
                if iface["details"].get(key).is_some() {
                    iface["details"][key] = json!("<REDACTED>");
                }
            }
        }
    }
    copy
}
