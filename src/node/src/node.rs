//! Node orchestrator: registry backend, bootstrap, and ticket maintenance

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, error, info};
use wicket_registry::{
    AuthorizationCache, InMemoryRegistryStore, JsonServiceSource, RegistryStore, ServicesManager,
    ServicesManagerConfig, SledRegistryStore, SyncEngine, SyncReport,
};
use wicket_ticket::{
    DefaultTicketIdGenerator, HardTimeout, InMemoryTicketRegistry, TransientSessionTicketFactory,
};

use crate::config::{NodeConfig, RegistryBackend};

/// Authentication node core
pub struct WicketNode {
    /// Node identifier
    node_id: String,

    /// Configuration
    config: NodeConfig,

    /// Service registry backend
    store: Arc<dyn RegistryStore>,

    /// Runtime view of the registry
    services: Arc<ServicesManager>,

    /// Issued tickets
    tickets: Arc<InMemoryTicketRegistry>,

    /// Issues transient session tickets for delegated authentication
    transient_tickets: TransientSessionTicketFactory,

    /// Shutdown signal
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: Option<mpsc::Receiver<()>>,

    /// Periodic expired-ticket removal
    sweep_task: Option<tokio::task::JoinHandle<()>>,
}

impl WicketNode {
    /// Create a new node, opening the configured registry backend
    pub async fn new(config: NodeConfig) -> Result<Self> {
        let node_id = if config.node.id.is_empty() {
            uuid::Uuid::new_v4().simple().to_string()
        } else {
            config.node.id.clone()
        };
        info!("Initializing node '{}'", node_id);

        let store = Self::open_store(&config).await?;
        info!("Service registry backend [{}] ready", store.name());

        let services = Arc::new(ServicesManager::with_config(
            store.clone(),
            ServicesManagerConfig {
                lookup_capacity: config.services.lookup_capacity,
            },
        ));

        let transient_tickets = TransientSessionTicketFactory::new(
            Arc::new(DefaultTicketIdGenerator::new().with_suffix(node_id.clone())),
            Arc::new(HardTimeout::new(config.transient_time_to_kill())),
        );

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        Ok(Self {
            node_id,
            config,
            store,
            services,
            tickets: Arc::new(InMemoryTicketRegistry::new()),
            transient_tickets,
            shutdown_tx,
            shutdown_rx: Some(shutdown_rx),
            sweep_task: None,
        })
    }

    async fn open_store(config: &NodeConfig) -> Result<Arc<dyn RegistryStore>> {
        match config.registry.backend {
            RegistryBackend::Memory => Ok(Arc::new(InMemoryRegistryStore::new())),
            RegistryBackend::Sled => {
                let path = config.registry_path();
                std::fs::create_dir_all(&path).context("Failed to create registry directory")?;
                let store = SledRegistryStore::open(&path)
                    .with_context(|| format!("Failed to open sled registry at {:?}", path))?;
                Ok(Arc::new(store))
            }
            RegistryBackend::Postgres => Self::open_postgres(config).await,
        }
    }

    #[cfg(feature = "postgres")]
    async fn open_postgres(config: &NodeConfig) -> Result<Arc<dyn RegistryStore>> {
        let url = config
            .registry
            .database_url
            .as_deref()
            .context("Registry backend 'postgres' requires 'database_url'")?;
        let store = wicket_registry::PostgresRegistryStore::new(url)
            .await
            .context("Failed to connect to PostgreSQL registry")?;
        store.run_migrations().await.context("Failed to migrate PostgreSQL registry")?;
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "postgres"))]
    async fn open_postgres(_config: &NodeConfig) -> Result<Arc<dyn RegistryStore>> {
        anyhow::bail!("Registry backend 'postgres' requires building with the 'postgres' feature")
    }

    /// Seed the registry (when enabled) and load the services cache
    pub async fn bootstrap(&self) -> Result<SyncReport> {
        let engine = SyncEngine::new(
            self.config.registry.init_from_json,
            self.store.clone(),
            Arc::new(JsonServiceSource::new(self.config.registry.json_location.clone())),
            self.services.clone(),
        );

        let report = engine
            .initialize_registry_if_necessary()
            .await
            .context("Service registry bootstrap failed")?;

        if report.is_disabled() {
            // Lookups still need the persisted definitions
            self.services.load().await.context("Failed to load services")?;
        }

        Ok(report)
    }

    /// Run until a shutdown signal arrives, sweeping expired tickets periodically
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting node '{}'...", self.node_id);

        let mut shutdown_rx = self
            .shutdown_rx
            .take()
            .context("Node is already running")?;

        self.sweep_task = Some(Self::start_ticket_sweeper(
            self.tickets.clone(),
            self.config.sweep_interval(),
        ));

        let _ = shutdown_rx.recv().await;
        info!("Received internal shutdown signal");

        self.stop_sweeper();
        Ok(())
    }

    /// Graceful shutdown
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Initiating graceful shutdown...");

        self.stop_sweeper();
        let _ = self.shutdown_tx.try_send(());

        info!("Shutdown complete");
        Ok(())
    }

    /// Sender that stops a running node
    pub fn shutdown_handle(&self) -> mpsc::Sender<()> {
        self.shutdown_tx.clone()
    }

    fn stop_sweeper(&mut self) {
        if let Some(task) = self.sweep_task.take() {
            task.abort();
        }
    }

    fn start_ticket_sweeper(
        tickets: Arc<InMemoryTicketRegistry>,
        every: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(every);

            loop {
                ticker.tick().await;

                match tickets.sweep_expired() {
                    Ok(removed) if !removed.is_empty() => {
                        debug!("Ticket sweep removed {} expired tickets", removed.len());
                    }
                    Ok(_) => {}
                    Err(e) => error!("Ticket sweep failed: {}", e),
                }
            }
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn services(&self) -> &Arc<ServicesManager> {
        &self.services
    }

    pub fn tickets(&self) -> &Arc<InMemoryTicketRegistry> {
        &self.tickets
    }

    pub fn transient_tickets(&self) -> &TransientSessionTicketFactory {
        &self.transient_tickets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wicket_ticket::{Ticket, TicketRegistry};

    fn config(dir: &TempDir, backend: RegistryBackend, init_from_json: bool) -> NodeConfig {
        let services = dir.path().join("services");
        std::fs::create_dir_all(&services).unwrap();
        std::fs::write(
            services.join("app.json"),
            r#"{"id": 1, "serviceId": "^https://app\\.example\\.org/.*", "name": "App"}"#,
        )
        .unwrap();

        let mut config = NodeConfig::default();
        config.node.id = "test-node".to_string();
        config.node.data_dir = dir.path().join("data");
        config.registry.backend = backend;
        config.registry.init_from_json = init_from_json;
        config.registry.json_location = services;
        config
    }

    #[tokio::test]
    async fn test_bootstrap_seeds_sled_registry() {
        let dir = TempDir::new().unwrap();
        let node = WicketNode::new(config(&dir, RegistryBackend::Sled, true)).await.unwrap();

        let report = node.bootstrap().await.unwrap();
        assert_eq!(report.persisted.len(), 1);
        assert_eq!(node.services().all_services().len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_bootstrap_still_loads_services() {
        let dir = TempDir::new().unwrap();
        let node = WicketNode::new(config(&dir, RegistryBackend::Memory, false)).await.unwrap();

        let report = node.bootstrap().await.unwrap();
        assert!(report.is_disabled());
        assert_eq!(node.services().stats().loads, 1);
        assert!(node.services().all_services().is_empty());
    }

    #[tokio::test]
    async fn test_transient_ticket_ids_carry_node_id() {
        let dir = TempDir::new().unwrap();
        let node = WicketNode::new(config(&dir, RegistryBackend::Memory, false)).await.unwrap();

        let ticket = node
            .transient_tickets()
            .create(wicket_core::Service::new("https://app.example.org/"));
        assert!(ticket.id().starts_with("TST-"));
        assert!(ticket.id().ends_with("-test-node"));

        node.tickets().add_ticket(&ticket).await.unwrap();
        assert_eq!(node.tickets().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let dir = TempDir::new().unwrap();
        let mut node = WicketNode::new(config(&dir, RegistryBackend::Memory, false)).await.unwrap();
        let handle = node.shutdown_handle();

        let running = tokio::spawn(async move { node.run().await });
        handle.send(()).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .expect("node should stop")
            .unwrap();
        assert!(result.is_ok());
    }
}
