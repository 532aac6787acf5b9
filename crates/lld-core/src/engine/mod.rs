//! Discovery engine
//!
//! The DiscoveryEngine is responsible for:
//! - Validating every host's protocol settings before any network I/O
//! - Running one discovery task per host, concurrently
//! - Reconciling each host's result into the registry
//! - Reporting per-host results and emitting events
//!
//! ## Architecture
//!
//! ```text
//!                   ┌──────────────────┐
//!                   │ DiscoveryEngine  │
//!                   └──────────────────┘
//!                            │ one task per host (JoinSet)
//!         ┌──────────────────┼──────────────────┐
//!         ▼                  ▼                  ▼
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ SnmpSession  │   │ SnmpSession  │   │ SnmpSession  │
//! │ + Discovery  │   │ + Discovery  │   │ + Discovery  │
//! └──────────────┘   └──────────────┘   └──────────────┘
//!         │                  │                  │
//!         └────────► registry mutex ◄───────────┘
//!                            │
//!                            ▼
//!                   ┌──────────────────┐
//!                   │  HostReconciler  │
//!                   └──────────────────┘
//! ```
//!
//! ## Failure Isolation
//!
//! A host that fails validation, connection, discovery or reconciliation is
//! reported as failed. It never cancels or delays the other hosts, and the run
//! itself only fails on errors that affect every host (bad discovery
//! settings).

use crate::config::{HostConfig, LldConfig, SnmpProtocol};
use crate::discovery::{HostFacts, StorageDiscovery};
use crate::error::Result;
use crate::oid::OidOrdering;
use crate::reconcile::{HostReconciler, ReconcileOutcome};
use crate::session::SnmpSession;
use crate::traits::{HostRegistry, SnmpTransportFactory};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Events emitted by the DiscoveryEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Run started
    Started {
        hosts_count: usize,
    },

    /// Host configuration rejected before any I/O
    HostRejected {
        target: String,
        error: String,
    },

    /// Discovery pass finished for a host
    DiscoveryCompleted {
        target: String,
        disks: usize,
        rams: usize,
    },

    /// Host written to the registry
    HostRegistered {
        target: String,
        host_name: String,
        replaced: bool,
    },

    /// Host failed after validation
    HostFailed {
        target: String,
        error: String,
    },

    /// Run finished
    Finished {
        succeeded: usize,
        failed: usize,
    },
}

/// Result for one configured host
#[derive(Debug, Clone)]
pub struct HostReport {
    /// `ip:port`
    pub target: String,
    /// Discovery result, if the discovery pass ran
    pub facts: Option<HostFacts>,
    /// Registry result, if reconciliation succeeded
    pub registration: Option<ReconcileOutcome>,
    /// First error that stopped this host
    pub error: Option<String>,
}

impl HostReport {
    fn failed(target: String, error: impl ToString) -> Self {
        Self {
            target,
            facts: None,
            registration: None,
            error: Some(error.to_string()),
        }
    }

    /// Discovery and registration both succeeded
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.facts.is_some() && self.registration.is_some()
    }
}

/// Result of one run, in configuration order
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub hosts: Vec<HostReport>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.hosts.iter().filter(|h| h.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.hosts.len() - self.succeeded()
    }
}

/// State shared by the host tasks of one run
struct HostContext {
    factory: Arc<dyn SnmpTransportFactory>,
    discovery: StorageDiscovery,
    reconciler: HostReconciler,
    ordering: OidOrdering,
    registry_lock: Mutex<()>,
    event_tx: mpsc::Sender<EngineEvent>,
}

/// Core discovery engine
///
/// ## Lifecycle
///
/// 1. Create with [`DiscoveryEngine::new()`]
/// 2. Call [`DiscoveryEngine::run()`] once per discovery run
/// 3. Drain the event receiver for monitoring/logging
///
/// ## Concurrency
///
/// Each host gets its own task and its own [`SnmpSession`]. SNMP calls inside
/// a host task are sequential. Registry writes from all host tasks go through
/// one async mutex.
pub struct DiscoveryEngine {
    /// Transport factory, one binding per host
    factory: Arc<dyn SnmpTransportFactory>,

    /// Registry shared by all host tasks
    registry: Arc<dyn HostRegistry>,

    /// Run configuration
    config: LldConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl DiscoveryEngine {
    /// Create a new discovery engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        factory: Arc<dyn SnmpTransportFactory>,
        registry: Arc<dyn HostRegistry>,
        config: LldConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.discovery.validate()?;

        let (tx, rx) = mpsc::channel(config.discovery.event_channel_capacity);

        let engine = Self {
            factory,
            registry,
            config,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Run one discovery over every configured host
    ///
    /// # Returns
    ///
    /// - `Ok(RunReport)`: One report per configured host, in configuration order
    /// - `Err(Error)`: The run could not start at all
    pub async fn run(&self) -> Result<RunReport> {
        let hosts = &self.config.hosts;
        emit_event(&self.event_tx, EngineEvent::Started { hosts_count: hosts.len() });
        info!("Starting discovery of {} hosts", hosts.len());

        let ctx = Arc::new(HostContext {
            factory: Arc::clone(&self.factory),
            discovery: StorageDiscovery::from_config(&self.config.discovery)?,
            reconciler: HostReconciler::new(Arc::clone(&self.registry), &self.config.discovery),
            ordering: self.config.discovery.oid_ordering,
            registry_lock: Mutex::new(()),
            event_tx: self.event_tx.clone(),
        });

        let mut reports: Vec<Option<HostReport>> = vec![None; hosts.len()];
        let mut tasks = JoinSet::new();

        for (position, host) in hosts.iter().enumerate() {
            let protocol = match host.validate() {
                Ok(protocol) => protocol,
                Err(e) => {
                    error!("Rejecting host {}: {}", host.target(), e);
                    emit_event(
                        &self.event_tx,
                        EngineEvent::HostRejected {
                            target: host.target(),
                            error: e.to_string(),
                        },
                    );
                    reports[position] = Some(HostReport::failed(host.target(), e));
                    continue;
                }
            };

            let ctx = Arc::clone(&ctx);
            let host = host.clone();
            tasks.spawn(async move { (position, run_host(&ctx, &host, &protocol).await) });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, report)) => reports[position] = Some(report),
                Err(e) => error!("Host task aborted: {}", e),
            }
        }

        let report = RunReport {
            hosts: reports
                .into_iter()
                .zip(hosts)
                .map(|(report, host)| {
                    report.unwrap_or_else(|| HostReport::failed(host.target(), "host task aborted"))
                })
                .collect(),
        };

        info!(
            "Discovery finished: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        );
        emit_event(
            &self.event_tx,
            EngineEvent::Finished {
                succeeded: report.succeeded(),
                failed: report.failed(),
            },
        );

        Ok(report)
    }
}

/// Discover and reconcile one validated host
async fn run_host(ctx: &HostContext, host: &HostConfig, protocol: &SnmpProtocol) -> HostReport {
    let target = host.target();

    let session = match SnmpSession::connect(ctx.factory.as_ref(), host, protocol, ctx.ordering).await {
        Ok(session) => session,
        Err(e) => return host_failed(ctx, target, e),
    };

    let facts = match ctx.discovery.collect(&session).await {
        Ok(facts) => facts,
        Err(e) => return host_failed(ctx, target, e),
    };

    // empty storage from a silent agent must not wipe the registered host
    if !facts.agent_answered {
        let mut report = host_failed(ctx, target.clone(), crate::Error::NoResponse(target));
        report.facts = Some(facts);
        return report;
    }

    emit_event(
        &ctx.event_tx,
        EngineEvent::DiscoveryCompleted {
            target: target.clone(),
            disks: facts.disk_count(),
            rams: facts.ram_count(),
        },
    );

    let reconciled = {
        let _guard = ctx.registry_lock.lock().await;
        debug!("{}: registry lock acquired", target);
        ctx.reconciler.reconcile(host, protocol, &facts).await
    };

    match reconciled {
        Ok(outcome) => {
            emit_event(
                &ctx.event_tx,
                EngineEvent::HostRegistered {
                    target: target.clone(),
                    host_name: outcome.host_name.clone(),
                    replaced: outcome.host_replaced,
                },
            );
            HostReport {
                target,
                facts: Some(facts),
                registration: Some(outcome),
                error: None,
            }
        }
        Err(e) => {
            let mut report = host_failed(ctx, target, e);
            report.facts = Some(facts);
            report
        }
    }
}

fn host_failed(ctx: &HostContext, target: String, e: crate::Error) -> HostReport {
    error!("Host {} failed: {}", target, e);
    emit_event(
        &ctx.event_tx,
        EngineEvent::HostFailed {
            target: target.clone(),
            error: e.to_string(),
        },
    );
    HostReport::failed(target, e)
}

/// Emit an engine event
fn emit_event(tx: &mpsc::Sender<EngineEvent>, event: EngineEvent) {
    // Send event, logging warning if channel is full (backpressure)
    match tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("Event receiver dropped, event discarded");
        }
    }
}
