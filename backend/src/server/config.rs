//! HTTP server configuration object and helpers.

use std::net::SocketAddr;

use crate::domain::BatchSyncEngineConfig;
use crate::outbound::gateway::HttpPaymentGatewayConfig;
use crate::outbound::ledger::HttpLedgerClientConfig;
use crate::outbound::persistence::DbPool;

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) db_pool: DbPool,
    pub(crate) gateway: HttpPaymentGatewayConfig,
    pub(crate) ledger: HttpLedgerClientConfig,
    pub(crate) sync: BatchSyncEngineConfig,
}

impl ServerConfig {
    /// Construct a server configuration with default sync tuning.
    #[must_use]
    pub fn new(
        bind_addr: SocketAddr,
        db_pool: DbPool,
        gateway: HttpPaymentGatewayConfig,
        ledger: HttpLedgerClientConfig,
    ) -> Self {
        Self {
            bind_addr,
            db_pool,
            gateway,
            ledger,
            sync: BatchSyncEngineConfig::default(),
        }
    }

    /// Override the batch sync engine tuning.
    #[must_use]
    pub fn with_sync_config(mut self, sync: BatchSyncEngineConfig) -> Self {
        self.sync = sync;
        self
    }

    /// Return the socket address the server will bind to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}
