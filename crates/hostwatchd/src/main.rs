// # hostwatchd - Host Supervision Daemon
//
// This daemon is a THIN integration layer:
// - No reconciliation, reachability or proxy logic lives here
// - All decisions are made in hostwatch-core
// - Configuration is via environment variables only
//
// The hostwatchd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the docker transport and the stores into the core
// 4. Running the scheduler until SIGTERM/SIGINT
//
// ## Configuration
//
// ### Hosts
// - `HOSTWATCH_HOSTS`: Comma-separated `id=target` list; `target` is `local`
//   or an ssh destination (e.g. `1=local,2=root@10.0.0.5`)
// - `HOSTWATCH_TEAM_ID`: Team that receives notifications (default 0)
// - `HOSTWATCH_RESOURCES_PATH`: JSON snapshot of tracked resources (optional)
//
// ### State Store
// - `HOSTWATCH_STATE_STORE_TYPE`: Type of host store (file, memory)
// - `HOSTWATCH_STATE_STORE_PATH`: Path to host file (for file store)
//
// ### Reconciliation
// - `HOSTWATCH_INTERVAL_SECS`: Seconds between passes
// - `HOSTWATCH_UNREACHABLE_THRESHOLD`: Failed probes before a host is confirmed down
// - `HOSTWATCH_PROXY_NAME`: Reserved proxy container name
// - `HOSTWATCH_PROXY_NETWORKS`: Comma-separated networks the proxy must join
// - `HOSTWATCH_PROXY_AUTOSTART`: Start an absent proxy (true, false)
// - `HOSTWATCH_LABEL_PREFIX`: Prefix of resource labels
// - `HOSTWATCH_BASE_URL`: Dashboard URL used in notification links
// - `HOSTWATCH_COMMAND_TIMEOUT_SECS`: Bound on each docker/ssh command
//
// ## Example
//
// ```bash
// export HOSTWATCH_HOSTS=1=local,2=deploy@edge-2.internal
// export HOSTWATCH_RESOURCES_PATH=/etc/hostwatch/resources.json
// export HOSTWATCH_STATE_STORE_TYPE=file
// export HOSTWATCH_STATE_STORE_PATH=/var/lib/hostwatch/hosts.json
//
// hostwatchd
// ```

use anyhow::{Context, Result};
use hostwatch_core::config::{HostStoreConfig, HostwatchConfig};
use hostwatch_core::model::Host;
use hostwatch_core::traits::HostStore;
use hostwatch_core::{
    Collaborators, FileHostStore, LogAlertSink, LogNotifier, MemoryHostLock, MemoryHostStore,
    MemoryResourceStore, ReconciliationJob, Scheduler, SchedulerEvent,
};
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum HostwatchExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<HostwatchExitCode> for ExitCode {
    fn from(code: HostwatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// One `id=target` entry of `HOSTWATCH_HOSTS`
#[derive(Debug, Clone, PartialEq, Eq)]
struct HostEntry {
    id: u64,
    target: String,
}

/// Application configuration
#[derive(Debug)]
struct Config {
    hosts: Vec<HostEntry>,
    team_id: u64,
    resources_path: Option<String>,
    state_store_type: String,
    state_store_path: Option<String>,
    interval_secs: Option<u64>,
    unreachable_threshold: Option<u32>,
    proxy_name: Option<String>,
    proxy_networks: Option<Vec<String>>,
    proxy_autostart: Option<bool>,
    label_prefix: Option<String>,
    base_url: Option<String>,
    command_timeout_secs: u64,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            hosts: parse_hosts(&env::var("HOSTWATCH_HOSTS").unwrap_or_default())?,
            team_id: parse_var("HOSTWATCH_TEAM_ID")?.unwrap_or(0),
            resources_path: env::var("HOSTWATCH_RESOURCES_PATH").ok(),
            state_store_type: env::var("HOSTWATCH_STATE_STORE_TYPE")
                .unwrap_or_else(|_| "memory".to_string()),
            state_store_path: env::var("HOSTWATCH_STATE_STORE_PATH").ok(),
            interval_secs: parse_var("HOSTWATCH_INTERVAL_SECS")?,
            unreachable_threshold: parse_var("HOSTWATCH_UNREACHABLE_THRESHOLD")?,
            proxy_name: env::var("HOSTWATCH_PROXY_NAME").ok(),
            proxy_networks: env::var("HOSTWATCH_PROXY_NETWORKS").ok().map(|s| split_list(&s)),
            proxy_autostart: parse_var("HOSTWATCH_PROXY_AUTOSTART")?,
            label_prefix: env::var("HOSTWATCH_LABEL_PREFIX").ok(),
            base_url: env::var("HOSTWATCH_BASE_URL").ok(),
            command_timeout_secs: parse_var("HOSTWATCH_COMMAND_TIMEOUT_SECS")?.unwrap_or(30),
            log_level: env::var("HOSTWATCH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Checks what the core cannot know about: host list, store selection,
    /// file paths, timeouts and log level. Everything else is validated by
    /// [`HostwatchConfig::validate`].
    fn validate(&self) -> Result<()> {
        if self.hosts.is_empty() {
            anyhow::bail!(
                "HOSTWATCH_HOSTS must contain at least one host. \
                Set it via: export HOSTWATCH_HOSTS=1=local,2=root@10.0.0.5"
            );
        }

        let mut seen = std::collections::HashSet::new();
        for host in &self.hosts {
            if !seen.insert(host.id) {
                anyhow::bail!("HOSTWATCH_HOSTS lists host id {} more than once", host.id);
            }
        }

        match self.state_store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "HOSTWATCH_STATE_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.state_store_type
            ),
        }

        if self.state_store_type == "file" {
            match self.state_store_path.as_deref() {
                None | Some("") => anyhow::bail!(
                    "HOSTWATCH_STATE_STORE_PATH is required when HOSTWATCH_STATE_STORE_TYPE=file. \
                    Set it via: export HOSTWATCH_STATE_STORE_PATH=/var/lib/hostwatch/hosts.json"
                ),
                Some(path) => {
                    if let Some(parent) = std::path::Path::new(path).parent()
                        && !parent.as_os_str().is_empty()
                        && !parent.exists()
                    {
                        anyhow::bail!(
                            "HOSTWATCH_STATE_STORE_PATH parent directory does not exist: {}. \
                            Create it first: sudo mkdir -p {}",
                            parent.display(),
                            parent.display()
                        );
                    }
                }
            }
        }

        if let Some(path) = &self.resources_path
            && !std::path::Path::new(path).is_file()
        {
            anyhow::bail!("HOSTWATCH_RESOURCES_PATH does not point to a file: {}", path);
        }

        if !(1..=600).contains(&self.command_timeout_secs) {
            anyhow::bail!(
                "HOSTWATCH_COMMAND_TIMEOUT_SECS must be between 1 and 600 seconds. Got: {}",
                self.command_timeout_secs
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "HOSTWATCH_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.core_config().validate()?;
        Ok(())
    }

    /// Core configuration with environment overrides applied
    fn core_config(&self) -> HostwatchConfig {
        let mut config = HostwatchConfig::default();

        if let Some(interval) = self.interval_secs {
            config.scheduler.interval_secs = interval;
        }
        if let Some(threshold) = self.unreachable_threshold {
            config.reachability.unreachable_threshold = threshold;
        }
        if let Some(name) = &self.proxy_name {
            config.proxy.container_name = name.clone();
        }
        if let Some(networks) = &self.proxy_networks {
            config.proxy.networks = networks.clone();
        }
        if let Some(auto_start) = self.proxy_autostart {
            config.proxy.auto_start = auto_start;
        }
        if let Some(prefix) = &self.label_prefix {
            config.labels.prefix = prefix.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.links.base_url = base_url.clone();
        }
        config.host_store = match (self.state_store_type.as_str(), &self.state_store_path) {
            ("file", Some(path)) => HostStoreConfig::File { path: path.clone() },
            _ => HostStoreConfig::Memory,
        };

        config
    }

    /// Host records for the configured entries
    fn seed_hosts(&self) -> Vec<Host> {
        self.hosts
            .iter()
            .map(|entry| Host::new(entry.id, entry.target.clone(), self.team_id).with_address(entry.target.clone()))
            .collect()
    }
}

/// Parse an optional environment variable
fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", name, raw, e)),
        Err(_) => Ok(None),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse `1=local,2=root@10.0.0.5`
fn parse_hosts(raw: &str) -> Result<Vec<HostEntry>> {
    split_list(raw)
        .into_iter()
        .map(|entry| {
            let (id, target) = entry.split_once('=').with_context(|| {
                format!("HOSTWATCH_HOSTS entry '{}' must look like id=target", entry)
            })?;
            let id = id
                .trim()
                .parse()
                .with_context(|| format!("HOSTWATCH_HOSTS entry '{}' has a non-numeric id", entry))?;
            let target = target.trim();
            if target.is_empty() {
                anyhow::bail!("HOSTWATCH_HOSTS entry '{}' has an empty target", entry);
            }
            Ok(HostEntry {
                id,
                target: target.to_string(),
            })
        })
        .collect()
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return HostwatchExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return HostwatchExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return HostwatchExitCode::ConfigError.into();
    }

    info!("Starting hostwatchd daemon");
    info!("Configuration loaded: {} host(s)", config.hosts.len());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return HostwatchExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            HostwatchExitCode::RuntimeError
        } else {
            HostwatchExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let core_config = config.core_config();

    let hosts: Arc<dyn HostStore> = match &core_config.host_store {
        HostStoreConfig::File { path } => {
            let store = FileHostStore::new(path)
                .await
                .with_context(|| format!("opening host store {}", path))?;
            for host in config.seed_hosts() {
                store.ensure_host(&host).await?;
            }
            info!("Host store: file ({})", path);
            Arc::new(store)
        }
        HostStoreConfig::Memory => {
            info!("Host store: memory (reachability state is lost on restart)");
            Arc::new(MemoryHostStore::with_hosts(config.seed_hosts()))
        }
    };

    let resources = match &config.resources_path {
        Some(path) => MemoryResourceStore::from_snapshot(path)
            .await
            .with_context(|| format!("loading resources from {}", path))?,
        None => {
            warn!("HOSTWATCH_RESOURCES_PATH not set; only reachability and the proxy are supervised");
            MemoryResourceStore::new()
        }
    };

    #[cfg(feature = "docker")]
    let docker = Arc::new(hostwatch_docker::DockerCli::new(
        &core_config.proxy,
        Duration::from_secs(config.command_timeout_secs),
    ));

    #[cfg(not(feature = "docker"))]
    anyhow::bail!("hostwatchd was built without a transport; enable the `docker` feature");

    #[cfg(feature = "docker")]
    {
        let deps = Collaborators {
            hosts,
            resources: Arc::new(resources),
            probe: docker.clone(),
            inventory: docker.clone(),
            proxy: docker,
            notifier: Arc::new(LogNotifier),
            alerts: Arc::new(LogAlertSink),
            lock: Arc::new(MemoryHostLock::new()),
        };

        let job = Arc::new(ReconciliationJob::new(deps, &core_config)?);
        let (scheduler, mut events) = Scheduler::new(job, &core_config.scheduler)?;

        let event_logger = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    SchedulerEvent::PassDropped { host_id } => {
                        debug!("Pass for host {} dropped (previous still running)", host_id)
                    }
                    other => debug!("Scheduler event: {:?}", other),
                }
            }
        });

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let signals = tokio::spawn(async move {
            let signal = wait_for_shutdown().await;
            let _ = shutdown_tx.send(());
            signal
        });

        info!(
            "Supervising {} host(s) every {}s",
            config.hosts.len(),
            core_config.scheduler.interval_secs
        );
        scheduler.run_with_shutdown(Some(shutdown_rx)).await?;

        match signals.await? {
            Ok(signal) => info!("Stopped after {}", signal),
            Err(e) => warn!("Signal handling failed: {}", e),
        }

        // The scheduler owned the only sender
        drop(scheduler);
        let _ = event_logger.await;

        info!("Shutting down daemon");
    }

    Ok(())
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for SIGINT
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
