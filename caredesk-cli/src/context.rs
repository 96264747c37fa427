//! Per-invocation wiring: config, view-state store, session and gateways

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use caredesk_core::config::CaredeskConfig;
use caredesk_core::entity::{City, Contract, Entity, EntityKind, InsuredPerson, Street};
use caredesk_core::gateway::{Gateway, HttpGateway};
use caredesk_core::list::EntityListManager;
use caredesk_core::persist::FileStateStore;
use caredesk_core::session::Session;
use tracing::{debug, warn};

pub struct AppContext {
    pub config: CaredeskConfig,
    pub session: Arc<Session>,
}

impl AppContext {
    /// Apply command-line overrides to `config` and open the state store.
    pub fn new(
        mut config: CaredeskConfig,
        api_url: Option<String>,
        state_dir: Option<PathBuf>,
    ) -> Result<Self> {
        if let Some(url) = api_url {
            config.api.base_url = url;
        }
        let state_dir = match state_dir {
            Some(dir) => dir,
            None => config.state_dir()?,
        };
        let store = FileStateStore::in_dir(&state_dir)
            .with_context(|| format!("Failed to open view state in {}", state_dir.display()))?;
        debug!(api = %config.api.base_url, state = %store.path().display(), "context ready");

        let session = Session::from_config(&config, Arc::new(store));
        Ok(Self {
            config,
            session: Arc::new(session),
        })
    }

    pub fn gateway<E: Entity>(&self) -> Result<Arc<dyn Gateway<E>>> {
        let gateway = HttpGateway::<E>::new(&self.config.api.base_url, self.config.timeout())
            .context("Failed to build HTTP client")?;
        Ok(Arc::new(gateway))
    }

    pub fn manager<E: Entity>(&self) -> Result<EntityListManager<E>> {
        Ok(EntityListManager::new(
            Arc::clone(&self.session),
            self.gateway::<E>()?,
        ))
    }

    async fn side_load<R: Entity>(&self) {
        let result = match self.gateway::<R>() {
            Ok(gateway) => self
                .session
                .side_load(gateway.as_ref())
                .await
                .map_err(anyhow::Error::from),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(entity = R::KEY, error = %e, "could not load labels");
        }
    }

    /// Load labels for the entities `kind` references, so foreign-key
    /// columns sort and search by name. Failures only cost the labels.
    pub async fn load_labels(&self, kind: EntityKind) {
        match kind {
            EntityKind::Street => self.side_load::<City>().await,
            EntityKind::Address => {
                self.side_load::<City>().await;
                self.side_load::<Street>().await;
            }
            EntityKind::Policy => {
                self.side_load::<InsuredPerson>().await;
                self.side_load::<Contract>().await;
            }
            _ => {}
        }
    }
}
