// # lldd - Storage Discovery Runner
//
// ⚠️ ARCHITECTURAL CONSTRAINTS ⚠️
//
// - This is a THIN integration layer ONLY
// - DO NOT add discovery, SNMP or registry logic here
// - All discovery logic MUST be in lld-core
// - Runtime settings come from environment variables; the host inventory
//   comes from the JSON file named by `LLD_CONFIG`
//
// lldd is responsible for:
// 1. Reading the configuration file and environment overrides
// 2. Initializing logging and the runtime
// 3. Wiring the SNMP transport, the Zabbix registry and the DNS probes
// 4. Running one discovery pass (or one round of DNS checks) and exiting
//
// ## Commands
//
// - `lldd` / `lldd discover`: discover every configured host and register it
// - `lldd dns`: run the availability checks against every configured DNS server
//
// ## Environment
//
// - `LLD_CONFIG`: Path to the JSON configuration (default `./config.json`)
// - `LLD_REGISTRY_URL`: Overrides `registry.url` from the file
// - `LLD_REGISTRY_API_TOKEN`: Overrides `registry.api_token` from the file
// - `LLD_SNMP_TIMEOUT_SECS`: Per-request SNMP timeout (default 5)
// - `LLD_LOG_LEVEL`: trace, debug, info, warn, error (default info)
// - `LLD_MODE=dry-run`: Look up registry state but skip every write
//
// ## Example
//
// ```bash
// export LLD_CONFIG=/etc/lld/config.json
// export LLD_REGISTRY_API_TOKEN=your_token
//
// lldd discover
// ```

use anyhow::{Context, Result};
use lld_core::{DiscoveryEngine, EngineEvent, LldConfig, RunReport};
use lld_probe_dns::{DnsAvailability, DnsAvailabilityProbe};
use lld_registry_zabbix::ZabbixRegistry;
use lld_transport_snmp::AsyncSnmpFactory;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// - 0: Every host (or DNS server) succeeded
/// - 1: Configuration or startup error
/// - 2: At least one host or DNS server failed
#[derive(Debug, Clone, Copy)]
enum LldExitCode {
    Success = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<LldExitCode> for ExitCode {
    fn from(code: LldExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Discover,
    Dns,
}

impl Command {
    fn parse(arg: Option<&str>) -> Result<Self> {
        match arg {
            None | Some("discover") => Ok(Command::Discover),
            Some("dns") => Ok(Command::Dns),
            Some(other) => anyhow::bail!("Unknown command '{}'. Usage: lldd [discover|dns]", other),
        }
    }
}

/// Process settings read from the environment
struct Settings {
    command: Command,
    config_path: String,
    registry_url: Option<String>,
    registry_api_token: Option<String>,
    snmp_timeout_secs: u64,
    log_level: String,
}

impl Settings {
    /// Load settings from the command line and environment variables
    fn from_env() -> Result<Self> {
        let arg = env::args().nth(1);

        Ok(Self {
            command: Command::parse(arg.as_deref())?,
            config_path: env::var("LLD_CONFIG").unwrap_or_else(|_| "./config.json".to_string()),
            registry_url: env::var("LLD_REGISTRY_URL").ok(),
            registry_api_token: env::var("LLD_REGISTRY_API_TOKEN").ok(),
            snmp_timeout_secs: match env::var("LLD_SNMP_TIMEOUT_SECS") {
                Ok(raw) => raw
                    .parse()
                    .with_context(|| format!("LLD_SNMP_TIMEOUT_SECS is not a number: {}", raw))?,
                Err(_) => 5,
            },
            log_level: env::var("LLD_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    fn validate(&self) -> Result<()> {
        if !(1..=60).contains(&self.snmp_timeout_secs) {
            anyhow::bail!(
                "LLD_SNMP_TIMEOUT_SECS must be between 1 and 60 seconds. Got: {}",
                self.snmp_timeout_secs
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "LLD_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Read the configuration file, apply the environment overrides, then validate
    ///
    /// `dns` never touches the registry, so registry settings are only
    /// checked for `discover`.
    fn load_config(&self) -> Result<LldConfig> {
        let mut config = LldConfig::read_file(&self.config_path)?;

        if let Some(url) = &self.registry_url {
            config.registry.url = url.clone();
        }
        if let Some(token) = &self.registry_api_token {
            config.registry.api_token = token.clone();
        }

        if self.command == Command::Discover {
            config.validate()?;
        }

        Ok(config)
    }
}

fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return LldExitCode::ConfigError.into();
        }
    };

    if let Err(e) = settings.validate() {
        eprintln!("Configuration validation error: {}", e);
        return LldExitCode::ConfigError.into();
    }

    let log_level = match settings.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return LldExitCode::ConfigError.into();
    }

    let config = match settings.load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return LldExitCode::ConfigError.into();
        }
    };

    info!(
        "Configuration loaded: {} host(s), {} DNS server(s)",
        config.hosts.len(),
        config.dns_servers.len()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return LldExitCode::RuntimeError.into();
        }
    };

    let timeout = Duration::from_secs(settings.snmp_timeout_secs);
    let result = rt.block_on(async {
        match settings.command {
            Command::Discover => run_discovery(config, timeout).await,
            Command::Dns => Ok(run_dns_checks(&config).await),
        }
    });

    match result {
        Ok(code) => code.into(),
        Err(e) => {
            error!("{:#}", e);
            // setup failures (registry client, filter) are configuration errors
            LldExitCode::ConfigError.into()
        }
    }
}

/// Discover and register every configured host
async fn run_discovery(config: LldConfig, timeout: Duration) -> Result<LldExitCode> {
    if config.hosts.is_empty() {
        warn!("No hosts configured, nothing to discover");
        return Ok(LldExitCode::Success);
    }

    let registry = ZabbixRegistry::from_config(&config.registry).context("Cannot create Zabbix registry")?;
    let factory = AsyncSnmpFactory::new(timeout);

    let (engine, mut events) = DiscoveryEngine::new(Arc::new(factory), Arc::new(registry), config)?;

    // drains until the engine is dropped
    let event_log = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                EngineEvent::Finished { succeeded, failed } => {
                    info!("Discovery finished: {} succeeded, {} failed", succeeded, failed)
                }
                other => debug!("Engine event: {:?}", other),
            }
        }
    });

    let report = engine.run().await?;
    drop(engine);
    if let Err(e) = event_log.await {
        warn!("Event log task ended abnormally: {}", e);
    }

    print_report(&report);

    if report.failed() > 0 {
        Ok(LldExitCode::RuntimeError)
    } else {
        Ok(LldExitCode::Success)
    }
}

fn print_report(report: &RunReport) {
    for host in &report.hosts {
        println!("HOST: {}", host.target);

        if let Some(facts) = &host.facts {
            println!("DISKS: {}", facts.disk_count());
            println!("RAMS: {}", facts.ram_count());
        }
        if let Some(registration) = &host.registration {
            println!("REGISTERED: {} ({})", registration.host_name, registration.host_id);
        }
        if let Some(error) = &host.error {
            println!("ERROR: {}", error);
        }
    }
}

/// Run every availability check against every configured DNS server
async fn run_dns_checks(config: &LldConfig) -> LldExitCode {
    if config.dns_servers.is_empty() {
        warn!("No DNS servers configured");
        return LldExitCode::Success;
    }

    let mut all_available = true;

    for server in &config.dns_servers {
        let probe = DnsAvailabilityProbe::from_config(server);
        let availability = probe.probe_all(server.probe_hostname.as_deref()).await;

        print_availability(&availability);
        all_available &= availability.is_available();
    }

    if all_available {
        LldExitCode::Success
    } else {
        LldExitCode::RuntimeError
    }
}

fn print_availability(availability: &DnsAvailability) {
    let status = |ok: bool| if ok { "OK" } else { "FAIL" };

    println!("DNS {} reverse: {}", availability.server, status(availability.reverse_lookup));
    println!("DNS {} fast: {}", availability.server, status(availability.fast_status));
    if let Some(forward) = availability.forward_resolution {
        println!("DNS {} forward: {}", availability.server, status(forward));
    }
}
