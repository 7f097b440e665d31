//! Extension de mrserver::Server pour le relais multi-room
//!
//! `mrserver` reste un serveur HTTP générique ; ce trait y greffe les routes
//! REST, la WebSocket des viewers et la documentation Swagger du relais.
//!
//! ```rust,no_run
//! use mrrelay::{AppContext, CommandGateway, RelayServerExt};
//! use mrserver::ServerBuilder;
//! use std::sync::Arc;
//!
//! # async fn example(ctx: Arc<AppContext>) -> anyhow::Result<()> {
//! let mut server = ServerBuilder::new("MultiRoom-Relay", 3001).build();
//! server.init_relay(CommandGateway::new(ctx)).await?;
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

use crate::api::{RelayApiDoc, create_relay_router};
use crate::gateway::CommandGateway;
use anyhow::Result;
use mrserver::Server;
use tracing::info;
use utoipa::OpenApi;

/// Trait d'extension ajoutant le relais à un [`Server`]
pub trait RelayServerExt {
    /// Enregistre les routes du relais
    ///
    /// # Routes enregistrées
    ///
    /// - `GET /api/token`, `POST /api/register-device`, `POST /api/transfer-playback`
    /// - `POST /api/verify`, `GET /api/health`, `GET /api/ping`, `GET /api/playback`
    /// - `GET /auth/url`, `GET /callback`
    /// - WebSocket sur `/` et `/ws`
    /// - `GET /swagger-ui/relay` - Documentation interactive
    async fn init_relay(&mut self, gateway: CommandGateway) -> Result<()>;
}

impl RelayServerExt for Server {
    async fn init_relay(&mut self, gateway: CommandGateway) -> Result<()> {
        info!("Registering relay routes");

        self.add_router("/", create_relay_router(gateway)).await;
        self.add_swagger(RelayApiDoc::openapi(), "relay").await;

        info!("✅ Relay API available at /api/*, WebSocket at / and /ws");
        Ok(())
    }
}
