use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::exchange::{build, Collaborators, Exchange};
use crate::registry::Registry;
use crate::transport::{BlockingTransport, Transport};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

enum TransportSource {
    /// One blocking client per exchange, using that exchange's timeout.
    Live,
    Shared(Arc<dyn Transport>),
}

/// One adapter per configured exchange, built lazily on first use.
///
/// The first caller for a name constructs the adapter and runs its coin and
/// pair refresh; concurrent callers block on the same cell and receive the
/// same instance.
pub struct ExchangeSet {
    config: Config,
    transport: TransportSource,
    clock: Arc<dyn Clock>,
    registry: Arc<Registry>,
    cells: BTreeMap<String, OnceLock<Result<Arc<dyn Exchange>>>>,
}

impl ExchangeSet {
    pub fn live(config: Config) -> Self {
        Self::with_source(
            config,
            TransportSource::Live,
            Arc::new(SystemClock),
            Arc::new(Registry::new()),
        )
    }

    pub fn with_collaborators(config: Config, collaborators: Collaborators) -> Self {
        Self::with_source(
            config,
            TransportSource::Shared(collaborators.transport),
            collaborators.clock,
            collaborators.registry,
        )
    }

    fn with_source(
        config: Config,
        transport: TransportSource,
        clock: Arc<dyn Clock>,
        registry: Arc<Registry>,
    ) -> Self {
        let cells = config
            .exchanges
            .keys()
            .map(|name| (name.clone(), OnceLock::new()))
            .collect();
        Self {
            config,
            transport,
            clock,
            registry,
            cells,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn names(&self) -> Vec<&str> {
        self.cells.keys().map(String::as_str).collect()
    }

    /// Returns the adapter for `name`, initializing it exactly once.
    ///
    /// A construction failure is cached as well; metadata refresh failures
    /// are logged and leave an adapter with empty caches.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Exchange>> {
        let name = name.to_lowercase();
        let cell = self
            .cells
            .get(&name)
            .ok_or_else(|| Error::Config(format!("exchange {name:?} is not configured")))?;
        cell.get_or_init(|| self.initialize(&name)).clone()
    }

    fn collaborators(&self, timeout_secs: u64) -> Result<Collaborators> {
        let transport: Arc<dyn Transport> = match &self.transport {
            TransportSource::Live => Arc::new(BlockingTransport::new(timeout_secs)?),
            TransportSource::Shared(transport) => Arc::clone(transport),
        };
        Ok(Collaborators::new(
            transport,
            Arc::clone(&self.clock),
            Arc::clone(&self.registry),
        ))
    }

    fn initialize(&self, name: &str) -> Result<Arc<dyn Exchange>> {
        let config = self.config.exchange(name)?;
        let exchange = build(config, self.collaborators(config.timeout_secs)?)?;
        info!(exchange = name, "initializing adapter");

        match exchange.refresh_coins() {
            Ok(count) => info!(exchange = name, count, "coins loaded"),
            Err(err) => warn!(exchange = name, error = %err, "coin refresh failed"),
        }
        match exchange.refresh_pairs() {
            Ok(count) => info!(exchange = name, count, "pairs loaded"),
            Err(err) => warn!(exchange = name, error = %err, "pair refresh failed"),
        }
        Ok(exchange)
    }
}
