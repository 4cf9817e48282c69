//! Minimal embedding example for hostwatch-core
//!
//! Drives the reconciliation job against an in-process "host" whose
//! containers the example edits between passes. Nothing here touches a
//! real container runtime.

use async_trait::async_trait;
use hostwatch_core::model::{Host, HostResources, ManagedResource};
use hostwatch_core::traits::{ConnectivityProbe, InventorySource, ProxyControl};
use hostwatch_core::{
    Collaborators, HostwatchConfig, LogAlertSink, LogNotifier, MemoryHostLock, MemoryHostStore,
    MemoryResourceStore, ReconciliationJob, Result, Scheduler,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A host whose liveness and container set are switched by hand
struct EmbeddedHost {
    up: AtomicBool,
    containers: Mutex<Vec<String>>,
}

impl EmbeddedHost {
    fn new() -> Self {
        Self {
            up: AtomicBool::new(true),
            containers: Mutex::new(Vec::new()),
        }
    }

    fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }

    fn set_containers(&self, containers: Vec<String>) {
        if let Ok(mut guard) = self.containers.lock() {
            *guard = containers;
        }
    }

    fn snapshot(&self) -> Vec<String> {
        self.containers
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConnectivityProbe for EmbeddedHost {
    async fn probe(&self, _host: &Host) -> Result<bool> {
        Ok(self.up.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl InventorySource for EmbeddedHost {
    async fn list_container_ids(&self, _host: &Host) -> Result<Vec<String>> {
        Ok((0..self.snapshot().len()).map(|i| format!("c{}", i)).collect())
    }

    async fn inspect(&self, _host: &Host, _ids: &[String]) -> Result<String> {
        Ok(self.snapshot().join("\n"))
    }
}

#[async_trait]
impl ProxyControl for EmbeddedHost {
    async fn should_start(&self, _host: &Host) -> Result<bool> {
        Ok(true)
    }

    async fn start(&self, _host: &Host) -> Result<()> {
        println!("[Embedded] Starting proxy");
        Ok(())
    }

    async fn attach_networks(&self, _host: &Host) -> Result<()> {
        Ok(())
    }
}

fn container(name: &str, labels: serde_json::Value) -> String {
    serde_json::json!({
        "Id": format!("id-{}", name),
        "Name": format!("/{}", name),
        "State": { "Status": "running", "Health": { "Status": "healthy" } },
        "Config": { "Labels": labels },
    })
    .to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Embedded hostwatch-core Example ===\n");

    let config = HostwatchConfig::default();
    let application_label = config.labels.key("applicationId");

    let host = Arc::new(EmbeddedHost::new());
    let resources = MemoryResourceStore::new();
    resources
        .insert(
            1,
            HostResources {
                applications: vec![
                    ManagedResource::new(42)
                        .with_uuid("app-uuid")
                        .with_name("web")
                        .with_fqdn("https://web.example.com")
                        .with_status("running (healthy)")
                        .with_environment("proj-1", "production"),
                ],
                ..HostResources::default()
            },
        )
        .await;

    let deps = Collaborators {
        hosts: Arc::new(MemoryHostStore::with_hosts([Host::new(1, "edge-1", 10)])),
        resources: Arc::new(resources.clone()),
        probe: host.clone(),
        inventory: host.clone(),
        proxy: host.clone(),
        notifier: Arc::new(LogNotifier),
        alerts: Arc::new(LogAlertSink),
        lock: Arc::new(MemoryHostLock::new()),
    };
    let job = Arc::new(ReconciliationJob::new(deps, &config)?);
    let (scheduler, _events) = Scheduler::new(job, &config.scheduler)?;

    println!("1. Application running, proxy running");
    host.set_containers(vec![
        container(&config.proxy.container_name, serde_json::json!({})),
        container("web", serde_json::json!({ application_label.as_str(): "42" })),
    ]);
    for (host_id, outcome) in scheduler.run_once().await? {
        println!("   host {}: {:?}", host_id, outcome);
    }

    println!("\n2. Application container gone, proxy missing");
    host.set_containers(vec![container("unrelated", serde_json::json!({}))]);
    for (host_id, outcome) in scheduler.run_once().await? {
        println!("   host {}: {:?}", host_id, outcome);
    }
    for application in resources.snapshot(1).await.applications {
        println!("   application {} status: {}", application.id, application.status);
    }

    println!("\n3. Host stops answering");
    host.set_up(false);
    for pass in 1..=config.reachability.unreachable_threshold + 1 {
        for (host_id, outcome) in scheduler.run_once().await? {
            println!("   pass {} host {}: {:?}", pass, host_id, outcome);
        }
    }

    println!("\n4. Host answers again");
    host.set_up(true);
    for (host_id, outcome) in scheduler.run_once().await? {
        println!("   host {}: {:?}", host_id, outcome);
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
