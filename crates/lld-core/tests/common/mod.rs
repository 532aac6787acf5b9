//! Test doubles and common utilities for discovery contract tests
//!
//! This module provides a scripted in-memory SNMP agent and a recording
//! registry. Neither touches the network.

#![allow(dead_code)]

use async_trait::async_trait;
use lld_core::config::{DiscoveryConfig, HostConfig, LldConfig, RegistryConfig, SnmpProtocol};
use lld_core::traits::{HostRegistry, HostSpec, SnmpTransport, SnmpTransportFactory, SnmpValue, VarBinding};
use lld_core::{mib, Error, OidAddress, ProbeOutcome};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn oid(s: &str) -> OidAddress {
    OidAddress::parse(s).unwrap()
}

pub fn storage_type(symbol: &str) -> SnmpValue {
    SnmpValue::ObjectId(mib::resolve("HOST-RESOURCES-TYPES", symbol).unwrap())
}

/// Shared state of a scripted agent
struct AgentState {
    target: String,
    objects: BTreeMap<OidAddress, SnmpValue>,
    /// get-next answers that override the MIB view (keyed by request OID)
    overrides: HashMap<OidAddress, VarBinding>,
    /// Fail every get-next after this many calls
    fail_after: Option<(usize, ProbeOutcome<VarBinding>)>,
    get_calls: AtomicUsize,
    get_next_calls: AtomicUsize,
    requested: Mutex<Vec<OidAddress>>,
}

/// In-memory SNMP agent answering get/get-next from a sorted MIB view
#[derive(Clone)]
pub struct ScriptedAgent {
    state: Arc<AgentState>,
}

impl ScriptedAgent {
    pub fn builder(target: &str) -> ScriptedAgentBuilder {
        ScriptedAgentBuilder {
            target: target.to_string(),
            objects: BTreeMap::new(),
            overrides: HashMap::new(),
            fail_after: None,
        }
    }

    pub fn get_calls(&self) -> usize {
        self.state.get_calls.load(Ordering::SeqCst)
    }

    pub fn get_next_calls(&self) -> usize {
        self.state.get_next_calls.load(Ordering::SeqCst)
    }

    /// Every OID sent in a get-next, in order
    pub fn requested(&self) -> Vec<OidAddress> {
        self.state.requested.lock().unwrap().clone()
    }
}

pub struct ScriptedAgentBuilder {
    target: String,
    objects: BTreeMap<OidAddress, SnmpValue>,
    overrides: HashMap<OidAddress, VarBinding>,
    fail_after: Option<(usize, ProbeOutcome<VarBinding>)>,
}

impl ScriptedAgentBuilder {
    pub fn object(mut self, oid: OidAddress, value: SnmpValue) -> Self {
        self.objects.insert(oid, value);
        self
    }

    pub fn system(self, sys_name: &str) -> Self {
        let sys = |symbol: &str| mib::resolve_instance("SNMPv2-MIB", symbol, &[0]).unwrap();
        self.object(sys("sysName"), SnmpValue::text(sys_name))
            .object(sys("sysLocation"), SnmpValue::text("rack 4"))
            .object(sys("sysDescr"), SnmpValue::text("Linux db1 6.1.0"))
            .object(sys("sysUpTime"), SnmpValue::TimeTicks(4_200_000))
    }

    /// One `hrStorageTable` row: type and description
    pub fn storage(self, index: u32, type_symbol: &str, descr: &str) -> Self {
        self.storage_type(index, type_symbol).storage_descr(index, descr)
    }

    pub fn storage_type(self, index: u32, type_symbol: &str) -> Self {
        let column = mib::resolve("HOST-RESOURCES-MIB", "hrStorageType").unwrap();
        self.object(column.child(index), storage_type(type_symbol))
    }

    pub fn storage_descr(self, index: u32, descr: &str) -> Self {
        let column = mib::resolve("HOST-RESOURCES-MIB", "hrStorageDescr").unwrap();
        self.object(column.child(index), SnmpValue::text(descr))
    }

    /// Answer a get-next for `request` with `response` regardless of the view
    pub fn override_next(mut self, request: OidAddress, response: VarBinding) -> Self {
        self.overrides.insert(request, response);
        self
    }

    /// After `calls` successful get-next calls, answer every further one with `outcome`
    pub fn fail_get_next_after(mut self, calls: usize, outcome: ProbeOutcome<VarBinding>) -> Self {
        self.fail_after = Some((calls, outcome));
        self
    }

    pub fn build(self) -> ScriptedAgent {
        ScriptedAgent {
            state: Arc::new(AgentState {
                target: self.target,
                objects: self.objects,
                overrides: self.overrides,
                fail_after: self.fail_after,
                get_calls: AtomicUsize::new(0),
                get_next_calls: AtomicUsize::new(0),
                requested: Mutex::new(Vec::new()),
            }),
        }
    }
}

#[async_trait]
impl SnmpTransport for ScriptedAgent {
    async fn get(&self, oid: &OidAddress) -> ProbeOutcome<VarBinding> {
        self.state.get_calls.fetch_add(1, Ordering::SeqCst);
        match self.state.objects.get(oid) {
            Some(value) => ProbeOutcome::Success(VarBinding::new(oid.clone(), value.clone())),
            None => ProbeOutcome::EmptyAnswer,
        }
    }

    async fn get_next(&self, oid: &OidAddress) -> ProbeOutcome<VarBinding> {
        let calls = self.state.get_next_calls.fetch_add(1, Ordering::SeqCst);
        self.state.requested.lock().unwrap().push(oid.clone());

        if let Some((limit, outcome)) = &self.state.fail_after {
            if calls >= *limit {
                return outcome.clone();
            }
        }

        if let Some(binding) = self.state.overrides.get(oid) {
            return ProbeOutcome::Success(binding.clone());
        }

        match self
            .state
            .objects
            .range((Bound::Excluded(oid.clone()), Bound::Unbounded))
            .next()
        {
            Some((next, value)) => ProbeOutcome::Success(VarBinding::new(next.clone(), value.clone())),
            None => ProbeOutcome::EmptyAnswer,
        }
    }

    fn target(&self) -> String {
        self.state.target.clone()
    }
}

/// Factory handing out scripted agents by host IP
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    agents: HashMap<String, ScriptedAgent>,
    connects: Arc<Mutex<Vec<String>>>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(mut self, ip: &str, agent: ScriptedAgent) -> Self {
        self.agents.insert(ip.to_string(), agent);
        self
    }

    /// IPs passed to `connect`, in call order
    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnmpTransportFactory for ScriptedFactory {
    async fn connect(&self, host: &HostConfig, _protocol: &SnmpProtocol) -> Result<Box<dyn SnmpTransport>, Error> {
        self.connects.lock().unwrap().push(host.ip.clone());
        match self.agents.get(&host.ip) {
            Some(agent) => Ok(Box::new(agent.clone())),
            None => Err(Error::transport(format!("no route to {}", host.ip))),
        }
    }
}

#[derive(Default)]
struct RegistryState {
    groups: BTreeMap<String, String>,
    hosts: BTreeMap<String, (String, HostSpec)>,
    calls: Vec<String>,
    next_id: usize,
}

/// In-memory registry recording every call
#[derive(Clone, Default)]
pub struct RecordingRegistry {
    state: Arc<Mutex<RegistryState>>,
    reject_host: Option<String>,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `create_host` for this name with a conflict
    pub fn rejecting_host(mut self, name: &str) -> Self {
        self.reject_host = Some(name.to_string());
        self
    }

    pub fn seed_group(&self, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id.to_string();
        state.groups.insert(name.to_string(), id.clone());
        id
    }

    pub fn seed_host(&self, spec: HostSpec) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id.to_string();
        state.hosts.insert(spec.name.clone(), (id.clone(), spec));
        id
    }

    /// Calls in order, e.g. `"host.delete 3"`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn host(&self, name: &str) -> Option<(String, HostSpec)> {
        self.state.lock().unwrap().hosts.get(name).cloned()
    }

    pub fn host_names(&self) -> Vec<String> {
        self.state.lock().unwrap().hosts.keys().cloned().collect()
    }

    pub fn group_count(&self) -> usize {
        self.state.lock().unwrap().groups.len()
    }
}

#[async_trait]
impl HostRegistry for RecordingRegistry {
    async fn group_exists(&self, name: &str) -> Result<Option<String>, Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("hostgroup.get {}", name));
        Ok(state.groups.get(name).cloned())
    }

    async fn create_group(&self, name: &str) -> Result<String, Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("hostgroup.create {}", name));
        if state.groups.contains_key(name) {
            return Err(Error::conflict(format!("Host group \"{}\" already exists", name)));
        }
        state.next_id += 1;
        let id = state.next_id.to_string();
        state.groups.insert(name.to_string(), id.clone());
        Ok(id)
    }

    async fn delete_group(&self, id: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("hostgroup.delete {}", id));
        state.groups.retain(|_, gid| gid != id);
        Ok(())
    }

    async fn host_exists(&self, name: &str) -> Result<Option<String>, Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("host.get {}", name));
        Ok(state.hosts.get(name).map(|(id, _)| id.clone()))
    }

    async fn create_host(&self, spec: &HostSpec) -> Result<String, Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("host.create {}", spec.name));
        if self.reject_host.as_deref() == Some(spec.name.as_str()) || state.hosts.contains_key(&spec.name) {
            return Err(Error::conflict(format!("Host with the same name \"{}\" already exists", spec.name)));
        }
        state.next_id += 1;
        let id = state.next_id.to_string();
        state.hosts.insert(spec.name.clone(), (id.clone(), spec.clone()));
        Ok(id)
    }

    async fn delete_host(&self, id: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("host.delete {}", id));
        state.hosts.retain(|_, (hid, _)| hid != id);
        Ok(())
    }

    fn registry_name(&self) -> &'static str {
        "recording"
    }
}

/// Minimal run configuration around the given hosts
pub fn config_with_hosts(hosts: Vec<HostConfig>, filter: &str) -> LldConfig {
    LldConfig {
        hosts,
        discovery: DiscoveryConfig::new("Discovered", "snmp").with_filter(filter),
        registry: RegistryConfig::new("http://127.0.0.1:8080", "test-token"),
        dns_servers: Vec::new(),
    }
}

pub fn v3_host(ip: &str) -> HostConfig {
    HostConfig::v3(ip, "authpass123", "privpass123").with_hostname(format!("{}.example.net", ip))
}
