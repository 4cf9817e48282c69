// # Docker CLI Transport
//
// This crate implements the hostwatch collaborator traits that touch a
// host by running the `docker` CLI:
//
// - `ConnectivityProbe`: `docker version` answers
// - `InventorySource`: `docker container ls -q` then
//   `docker container inspect <ids> --format '{{json .}}'`
// - `ProxyControl`: inspect, `docker start` and `docker network connect`
//
// ## Targets
//
// A host without an address (or with `local` / `localhost`) runs commands
// through `sh -c` on this machine. Any other address is an ssh destination;
// commands run with `BatchMode=yes` so a missing key fails fast instead of
// prompting.
//
// ## Timeouts
//
// Every command is bounded by the configured timeout and killed when it
// expires. There are no retries; the next pass tries again.

use async_trait::async_trait;
use hostwatch_core::config::ProxyConfig;
use hostwatch_core::inventory::parse_container_ids;
use hostwatch_core::model::Host;
use hostwatch_core::traits::{ConnectivityProbe, InventorySource, ProxyControl};
use hostwatch_core::{Error, Result};

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace};

/// Default bound on a single command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a command runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// This machine
    Local,
    /// An ssh destination (`user@host`, `host`, or an ssh config alias)
    Ssh(String),
}

impl Target {
    /// Resolve the target of a host from its address
    pub fn of(host: &Host) -> Self {
        match host.address.as_deref().map(str::trim) {
            None | Some("") | Some("local") | Some("localhost") => Target::Local,
            Some(destination) => Target::Ssh(destination.to_string()),
        }
    }
}

/// Failure of one command
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("exited with {code}: {stderr}")]
    Failed { code: String, stderr: String },
}

/// Runs shell scripts locally or over ssh
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Full argument vector for `script` on `target`
    pub fn argv(&self, target: &Target, script: &str) -> Vec<String> {
        match target {
            Target::Local => vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            Target::Ssh(destination) => vec![
                "ssh".to_string(),
                "-o".to_string(),
                "BatchMode=yes".to_string(),
                "-o".to_string(),
                format!("ConnectTimeout={}", self.timeout.as_secs().max(1)),
                destination.clone(),
                script.to_string(),
            ],
        }
    }

    /// Run `script` and return its stdout
    pub async fn run(&self, target: &Target, script: &str) -> std::result::Result<String, CommandError> {
        let argv = self.argv(target, script);
        let (program, args) = argv.split_first().ok_or_else(|| CommandError::Failed {
            code: "none".to_string(),
            stderr: "empty command".to_string(),
        })?;

        trace!("Running {:?} on {:?}", script, target);

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| CommandError::Timeout(self.timeout))?
            .map_err(|source| CommandError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(CommandError::Failed {
                code,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

/// Quote a word for a POSIX shell
pub fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// Docker CLI implementation of the host-facing collaborator traits
///
/// # Example
///
/// ```rust,no_run
/// use hostwatch_core::config::ProxyConfig;
/// use hostwatch_core::model::Host;
/// use hostwatch_core::traits::ConnectivityProbe;
/// use hostwatch_docker::DockerCli;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let docker = DockerCli::new(&ProxyConfig::default(), Duration::from_secs(10));
///     let host = Host::new(1, "edge-1", 10).with_address("root@10.0.0.5");
///
///     println!("reachable: {}", docker.probe(&host).await?);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DockerCli {
    runner: CommandRunner,
    binary: String,
    proxy: ProxyConfig,
}

impl DockerCli {
    pub fn new(proxy: &ProxyConfig, timeout: Duration) -> Self {
        Self {
            runner: CommandRunner::new(timeout),
            binary: "docker".to_string(),
            proxy: proxy.clone(),
        }
    }

    /// Use another docker-compatible binary (e.g. `podman`)
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    fn version_script(&self) -> String {
        format!("{} version --format '{{{{.Server.Version}}}}'", self.binary)
    }

    fn list_script(&self) -> String {
        format!("{} container ls -q", self.binary)
    }

    fn inspect_script(&self, ids: &[String]) -> String {
        let ids: Vec<String> = ids.iter().map(|id| shell_quote(id)).collect();
        format!(
            "{} container inspect {} --format '{{{{json .}}}}'",
            self.binary,
            ids.join(" ")
        )
    }

    fn proxy_exists_script(&self) -> String {
        format!(
            "{} container inspect {} --format '{{{{.State.Status}}}}'",
            self.binary,
            shell_quote(&self.proxy.container_name)
        )
    }

    fn start_script(&self) -> String {
        format!("{} start {}", self.binary, shell_quote(&self.proxy.container_name))
    }

    fn attach_script(&self) -> String {
        let proxy = shell_quote(&self.proxy.container_name);
        self.proxy
            .networks
            .iter()
            .map(|network| {
                let network = shell_quote(network);
                format!(
                    "{bin} network create --attachable {network} >/dev/null 2>&1 || true; \
                     {bin} network connect {network} {proxy} >/dev/null 2>&1 || true",
                    bin = self.binary,
                )
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[async_trait]
impl ConnectivityProbe for DockerCli {
    async fn probe(&self, host: &Host) -> Result<bool> {
        match self.runner.run(&Target::of(host), &self.version_script()).await {
            Ok(version) => {
                debug!("Host {} answers, docker {}", host.id, version.trim());
                Ok(true)
            }
            Err(e) => {
                debug!("Host {} did not answer: {}", host.id, e);
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl InventorySource for DockerCli {
    async fn list_container_ids(&self, host: &Host) -> Result<Vec<String>> {
        let raw = self
            .runner
            .run(&Target::of(host), &self.list_script())
            .await
            .map_err(|e| Error::inventory(format!("listing containers on host {}: {}", host.id, e)))?;
        Ok(parse_container_ids(&raw))
    }

    async fn inspect(&self, host: &Host, ids: &[String]) -> Result<String> {
        if ids.is_empty() {
            return Ok(String::new());
        }
        self.runner
            .run(&Target::of(host), &self.inspect_script(ids))
            .await
            .map_err(|e| Error::inventory(format!("inspecting containers on host {}: {}", host.id, e)))
    }
}

#[async_trait]
impl ProxyControl for DockerCli {
    async fn should_start(&self, host: &Host) -> Result<bool> {
        if !self.proxy.auto_start {
            return Ok(false);
        }

        match self.runner.run(&Target::of(host), &self.proxy_exists_script()).await {
            Ok(state) => {
                debug!("Proxy on host {} exists in state {}", host.id, state.trim());
                Ok(true)
            }
            // No such container: nothing to start
            Err(CommandError::Failed { .. }) => Ok(false),
            Err(e) => Err(Error::proxy(format!(
                "checking proxy on host {}: {}",
                host.id, e
            ))),
        }
    }

    async fn start(&self, host: &Host) -> Result<()> {
        self.runner
            .run(&Target::of(host), &self.start_script())
            .await
            .map(|_| ())
            .map_err(|e| Error::proxy(format!("starting proxy on host {}: {}", host.id, e)))
    }

    async fn attach_networks(&self, host: &Host) -> Result<()> {
        if self.proxy.networks.is_empty() {
            return Ok(());
        }
        self.runner
            .run(&Target::of(host), &self.attach_script())
            .await
            .map(|_| ())
            .map_err(|e| Error::proxy(format!("attaching proxy networks on host {}: {}", host.id, e)))
    }
}
