//! Wires the core services together from the loaded configuration.

use std::sync::Arc;

use tailorshop_core::{
    Connectivity, DataInitializer, Endpoints, Gateway, HttpRemote, LocalStore, RemoteApi,
    SyncService,
};

use crate::config::Config;

/// Everything a command needs, built once per invocation.
pub struct AppContext {
    pub store: LocalStore,
    pub remote: Arc<dyn RemoteApi>,
    pub endpoints: Endpoints,
    pub connectivity: Connectivity,
    /// Offline was requested by flag or config, so no probing.
    pub forced_offline: bool,
    pub config: Config,
}

impl AppContext {
    pub async fn open(
        config: &Config,
        force_offline: bool,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let store = LocalStore::open(&config.database_path.value).await?;

        let mut remote = HttpRemote::new()?;
        if let Some(token) = &config.api_token {
            remote = remote.with_token(token.value.clone());
        }

        let forced_offline = force_offline || config.offline.value;
        let online = !forced_offline;
        tracing::debug!(
            "Opened cache at {} (server {}, {})",
            config.database_path.value.display(),
            config.server_url.value,
            if online { "online" } else { "offline" }
        );

        Ok(Self {
            store,
            remote: Arc::new(remote),
            endpoints: Endpoints::new(config.server_url.value.clone()),
            connectivity: Connectivity::new(online),
            forced_offline,
            config: config.clone(),
        })
    }

    pub fn gateway(&self) -> Gateway {
        Gateway::new(
            self.store.clone(),
            Arc::clone(&self.remote),
            self.connectivity.clone(),
        )
    }

    pub fn initializer(&self) -> DataInitializer {
        DataInitializer::new(
            self.store.clone(),
            Arc::clone(&self.remote),
            self.endpoints.clone(),
            self.connectivity.clone(),
        )
        .with_fetch_timeout(self.config.sync.fetch_timeout())
    }

    pub fn sync_service(&self) -> Arc<SyncService> {
        Arc::new(
            SyncService::new(
                self.store.clone(),
                Arc::clone(&self.remote),
                self.endpoints.clone(),
                self.connectivity.clone(),
            )
            .with_interval(self.config.sync.interval())
            .with_fetch_timeout(self.config.sync.fetch_timeout()),
        )
    }
}
