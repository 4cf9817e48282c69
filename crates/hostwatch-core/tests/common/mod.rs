//! Test doubles and common utilities for contract tests
//!
//! Every double records what it was asked to do. Counters live behind
//! `Arc` so a test can keep a handle after the double moves into the job.

#![allow(dead_code)]

use async_trait::async_trait;
use hostwatch_core::error::{Error, Result};
use hostwatch_core::model::{
    EnvironmentLink, Host, HostResources, ManagedResource, Notification, Preview, ResourceRef,
    Service,
};
use hostwatch_core::traits::{
    AlertSink, ConnectivityProbe, HostStore, InventorySource, Notifier, ProxyControl,
    ResourceRepository,
};
use hostwatch_core::{
    Collaborators, HostwatchConfig, MemoryHostLock, MemoryHostStore, MemoryResourceStore,
    ReconciliationJob,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PROXY: &str = "hostwatch-proxy";

/// A probe that answers from a script, then repeats its fallback
pub struct ScriptedProbe {
    script: Mutex<VecDeque<Result<bool>>>,
    fallback: bool,
    delay: Duration,
    panics: AtomicUsize,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    /// Always answer `reachable`
    pub fn always(reachable: bool) -> Self {
        Self::script(Vec::new(), reachable)
    }

    /// Answer from `script`, then `fallback` forever
    pub fn script(script: Vec<Result<bool>>, fallback: bool) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            delay: Duration::ZERO,
            panics: AtomicUsize::new(0),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Hold every probe for `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Panic on the first `count` probes
    pub fn with_panics(self, count: usize) -> Self {
        self.panics.store(count, Ordering::SeqCst);
        self
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl ConnectivityProbe for ScriptedProbe {
    async fn probe(&self, _host: &Host) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let remaining = self
            .panics
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if remaining.is_ok() {
            panic!("probe transport crashed");
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or(Ok(self.fallback))
    }
}

/// An inventory whose snapshot the test swaps between passes
#[derive(Clone, Default)]
pub struct StaticInventory {
    lines: Arc<Mutex<Vec<String>>>,
    fail: Arc<Mutex<bool>>,
    list_calls: Arc<AtomicUsize>,
    inspect_calls: Arc<AtomicUsize>,
}

impl StaticInventory {
    pub fn new(lines: Vec<String>) -> Self {
        let inventory = Self::default();
        inventory.set(lines);
        inventory
    }

    /// Replace the snapshot
    pub fn set(&self, lines: Vec<String>) {
        *self.lines.lock().unwrap() = lines;
    }

    /// Make the listing fail
    pub fn fail(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn inspect_calls(&self) -> usize {
        self.inspect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InventorySource for StaticInventory {
    async fn list_container_ids(&self, _host: &Host) -> Result<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail.lock().unwrap() {
            return Err(Error::inventory("connection reset"));
        }
        let count = self.lines.lock().unwrap().len();
        Ok((0..count).map(|i| format!("c{}", i)).collect())
    }

    async fn inspect(&self, _host: &Host, _ids: &[String]) -> Result<String> {
        self.inspect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.lines.lock().unwrap().join("\n"))
    }
}

/// A notifier that keeps every notification
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(u64, Notification)>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose delivery always fails (still records)
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(u64, Notification)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn count_where(&self, predicate: impl Fn(&Notification) -> bool) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, n)| predicate(n))
            .count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, team_id: u64, notification: Notification) -> Result<()> {
        self.sent.lock().unwrap().push((team_id, notification));
        if self.fail {
            return Err(Error::notification("mail relay down"));
        }
        Ok(())
    }
}

/// An alert sink that keeps every message
#[derive(Clone, Default)]
pub struct RecordingAlertSink {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn alert(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// How the scripted proxy control answers `should_start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShouldStart {
    Yes,
    No,
    Error,
}

/// A proxy control with configurable answers and call counters
#[derive(Clone)]
pub struct ScriptedProxyControl {
    should_start: ShouldStart,
    start_fails: bool,
    attach_fails: bool,
    should_start_calls: Arc<AtomicUsize>,
    start_calls: Arc<AtomicUsize>,
    attach_calls: Arc<AtomicUsize>,
}

impl ScriptedProxyControl {
    pub fn new(should_start: ShouldStart) -> Self {
        Self {
            should_start,
            start_fails: false,
            attach_fails: false,
            should_start_calls: Arc::new(AtomicUsize::new(0)),
            start_calls: Arc::new(AtomicUsize::new(0)),
            attach_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_failing_start(mut self) -> Self {
        self.start_fails = true;
        self
    }

    pub fn with_failing_attach(mut self) -> Self {
        self.attach_fails = true;
        self
    }

    pub fn should_start_calls(&self) -> usize {
        self.should_start_calls.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn attach_calls(&self) -> usize {
        self.attach_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProxyControl for ScriptedProxyControl {
    async fn should_start(&self, _host: &Host) -> Result<bool> {
        self.should_start_calls.fetch_add(1, Ordering::SeqCst);
        match self.should_start {
            ShouldStart::Yes => Ok(true),
            ShouldStart::No => Ok(false),
            ShouldStart::Error => Err(Error::proxy("docker daemon not answering")),
        }
    }

    async fn start(&self, _host: &Host) -> Result<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.start_fails {
            return Err(Error::proxy("port 80 already allocated"));
        }
        Ok(())
    }

    async fn attach_networks(&self, _host: &Host) -> Result<()> {
        self.attach_calls.fetch_add(1, Ordering::SeqCst);
        if self.attach_fails {
            return Err(Error::proxy("network not found"));
        }
        Ok(())
    }
}

/// A memory host store that counts flushes
#[derive(Clone, Default)]
pub struct FlushCountingHostStore {
    inner: MemoryHostStore,
    flushes: Arc<AtomicUsize>,
}

impl FlushCountingHostStore {
    pub fn new(hosts: Vec<Host>) -> Self {
        Self {
            inner: MemoryHostStore::with_hosts(hosts),
            flushes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostStore for FlushCountingHostStore {
    async fn get_host(&self, host_id: u64) -> Result<Option<Host>> {
        self.inner.get_host(host_id).await
    }

    async fn save_host(&self, host: &Host) -> Result<()> {
        self.inner.save_host(host).await
    }

    async fn list_hosts(&self) -> Result<Vec<Host>> {
        self.inner.list_hosts().await
    }

    async fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// One `docker container inspect --format '{{json .}}'` line
pub fn container_json(name: &str, run_state: &str, health: Option<&str>, labels: &[(&str, &str)]) -> String {
    let labels: serde_json::Map<String, serde_json::Value> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect();
    let mut state = serde_json::json!({ "Status": run_state });
    if let Some(health) = health {
        state["Health"] = serde_json::json!({ "Status": health });
    }
    serde_json::json!({
        "Id": format!("id-{}", name),
        "Name": format!("/{}", name),
        "State": state,
        "Config": { "Labels": labels },
    })
    .to_string()
}

/// Healthy running proxy container
pub fn proxy_json() -> String {
    container_json(PROXY, "running", None, &[])
}

/// Running container labelled for application `id`
pub fn application_json(name: &str, id: &str) -> String {
    container_json(name, "running", Some("healthy"), &[("hostwatch.applicationId", id)])
}

pub const RUNNING: &str = "running (healthy)";

/// One host's worth of running resources of every kind
///
/// - application 42 (`web`, linked to project `proj-1` / `production`)
/// - preview 70 of application 42, pull request 7
/// - database 9 (compose service `db-uuid`)
/// - service 5 with application 11 (`ghost`) and database 11 (`mysql`)
pub fn running_resources() -> HostResources {
    HostResources {
        applications: vec![
            ManagedResource::new(42)
                .with_uuid("app-uuid")
                .with_name("web")
                .with_fqdn("https://web.example.com")
                .with_status(RUNNING)
                .with_environment("proj-1", "production"),
        ],
        previews: vec![Preview {
            application_id: 42,
            pull_request_id: 7,
            application_uuid: Some("app-uuid".to_string()),
            resource: ManagedResource::new(70)
                .with_name("web-pr-7")
                .with_status(RUNNING)
                .with_environment("proj-1", "production"),
        }],
        databases: vec![
            ManagedResource::new(9)
                .with_uuid("db-uuid")
                .with_name("postgres")
                .with_status(RUNNING),
        ],
        services: vec![Service {
            id: 5,
            uuid: Some("svc-uuid".to_string()),
            name: Some("blog".to_string()),
            environment: EnvironmentLink {
                project_uuid: Some("proj-1".to_string()),
                environment_name: Some("production".to_string()),
            },
            applications: vec![ManagedResource::new(11).with_name("ghost").with_status(RUNNING)],
            databases: vec![ManagedResource::new(11).with_name("mysql").with_status(RUNNING)],
        }],
    }
}

/// Containers matching every resource of [`running_resources`], plus the proxy
pub fn running_containers() -> Vec<String> {
    vec![
        proxy_json(),
        application_json("web-42", "42"),
        container_json(
            "web-42-pr-7",
            "running",
            Some("healthy"),
            &[("hostwatch.applicationId", "42"), ("hostwatch.pullRequestId", "7")],
        ),
        container_json(
            "postgres",
            "running",
            Some("healthy"),
            &[("com.docker.compose.service", "db-uuid")],
        ),
        container_json(
            "ghost-5",
            "running",
            Some("healthy"),
            &[
                ("hostwatch.serviceId", "5"),
                ("hostwatch.service.subType", "application"),
                ("hostwatch.service.subId", "11"),
            ],
        ),
        container_json(
            "mysql-5",
            "running",
            Some("healthy"),
            &[
                ("hostwatch.serviceId", "5"),
                ("hostwatch.service.subType", "database"),
                ("hostwatch.service.subId", "11"),
            ],
        ),
    ]
}

/// Resource store whose status writes can be switched to fail
#[derive(Clone, Default)]
pub struct SwitchableResourceStore {
    inner: MemoryResourceStore,
    fail_writes: Arc<AtomicBool>,
}

impl SwitchableResourceStore {
    pub fn new(inner: MemoryResourceStore) -> Self {
        Self {
            inner,
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResourceRepository for SwitchableResourceStore {
    async fn applications(&self, host_id: u64) -> Result<Vec<ManagedResource>> {
        self.inner.applications(host_id).await
    }

    async fn previews(&self, host_id: u64) -> Result<Vec<Preview>> {
        self.inner.previews(host_id).await
    }

    async fn databases(&self, host_id: u64) -> Result<Vec<ManagedResource>> {
        self.inner.databases(host_id).await
    }

    async fn services(&self, host_id: u64) -> Result<Vec<Service>> {
        self.inner.services(host_id).await
    }

    async fn set_status(&self, resource: &ResourceRef, status: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::repository("database went away"));
        }
        self.inner.set_status(resource, status).await
    }
}

/// The pieces a contract test drives and inspects
pub struct Harness {
    pub job: Arc<ReconciliationJob>,
    pub hosts: MemoryHostStore,
    pub resources: MemoryResourceStore,
    pub writes: SwitchableResourceStore,
    pub inventory: StaticInventory,
    pub notifier: RecordingNotifier,
    pub alerts: RecordingAlertSink,
    pub proxy: ScriptedProxyControl,
    pub lock: MemoryHostLock,
}

impl Harness {
    pub async fn host(&self, host_id: u64) -> Host {
        self.hosts.get_host(host_id).await.unwrap().unwrap()
    }
}

/// Builder for a job wired to test doubles
pub struct HarnessBuilder {
    hosts: Vec<Host>,
    resources: Vec<(u64, HostResources)>,
    probe: ScriptedProbe,
    inventory: StaticInventory,
    notifier: RecordingNotifier,
    proxy: ScriptedProxyControl,
    config: HostwatchConfig,
}

impl HarnessBuilder {
    pub fn new(host: Host) -> Self {
        Self {
            hosts: vec![host],
            resources: Vec::new(),
            probe: ScriptedProbe::always(true),
            inventory: StaticInventory::new(vec![proxy_json()]),
            notifier: RecordingNotifier::new(),
            proxy: ScriptedProxyControl::new(ShouldStart::Yes),
            config: HostwatchConfig::default(),
        }
    }

    pub fn host(mut self, host: Host) -> Self {
        self.hosts.push(host);
        self
    }

    pub fn resources(mut self, host_id: u64, resources: HostResources) -> Self {
        self.resources.push((host_id, resources));
        self
    }

    pub fn probe(mut self, probe: ScriptedProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn inventory(mut self, lines: Vec<String>) -> Self {
        self.inventory = StaticInventory::new(lines);
        self
    }

    pub fn notifier(mut self, notifier: RecordingNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn proxy(mut self, proxy: ScriptedProxyControl) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn config(mut self, config: HostwatchConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn build(self) -> Harness {
        let hosts = MemoryHostStore::with_hosts(self.hosts);
        let resources = MemoryResourceStore::new();
        for (host_id, host_resources) in self.resources {
            resources.insert(host_id, host_resources).await;
        }
        let writes = SwitchableResourceStore::new(resources.clone());
        let alerts = RecordingAlertSink::new();
        let lock = MemoryHostLock::new();

        let deps = Collaborators {
            hosts: Arc::new(hosts.clone()),
            resources: Arc::new(writes.clone()),
            probe: Arc::new(self.probe),
            inventory: Arc::new(self.inventory.clone()),
            proxy: Arc::new(self.proxy.clone()),
            notifier: Arc::new(self.notifier.clone()),
            alerts: Arc::new(alerts.clone()),
            lock: Arc::new(lock.clone()),
        };

        let job = ReconciliationJob::new(deps, &self.config).expect("job construction succeeds");

        Harness {
            job: Arc::new(job),
            hosts,
            resources,
            writes,
            inventory: self.inventory,
            notifier: self.notifier,
            alerts,
            proxy: self.proxy,
            lock,
        }
    }
}
