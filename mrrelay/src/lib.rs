//! # mrrelay - Relais multi-room pour Spotify
//!
//! Un seul compte Spotify, plusieurs pièces : le relais observe le lecteur,
//! pousse chaque changement à tous les navigateurs connectés et leur sert de
//! point d'accès pour les opérations qui nécessitent un token.
//!
//! ## Composants
//!
//! - ⏱️ **[`StatePoller`]** : lit `/me/player` toutes les 2 s et ne diffuse que les changements
//! - 📡 **[`FanoutHub`]** : viewers WebSocket, dernier snapshot, relais des messages `sync`
//! - 🎛️ **[`CommandGateway`]** : token, enregistrement d'appareil, transfert, mot de passe, santé
//! - 🔑 Le gestionnaire de tokens vit dans `mrspotify` ([`mrspotify::TokenManager`])
//!
//! Tout l'état partagé est regroupé dans un [`AppContext`] transmis explicitement.
//!
//! ## Exemple
//!
//! ```rust,no_run
//! use mrrelay::{AppContext, CommandGateway, RelayServerExt, StatePoller};
//! use mrserver::ServerBuilder;
//! use mrspotify::{SpotifyApi, TokenManager};
//! use std::{sync::Arc, time::Duration};
//!
//! # async fn example(api: SpotifyApi) -> anyhow::Result<()> {
//! let tokens = Arc::new(TokenManager::new(api.clone(), None));
//! let ctx = Arc::new(AppContext::new(tokens, Arc::new(api), None));
//!
//! let mut server = ServerBuilder::new("MultiRoom-Relay", 3001).build();
//! server.init_relay(CommandGateway::new(ctx.clone())).await?;
//!
//! Arc::new(StatePoller::new(ctx, Duration::from_secs(2))).spawn(server.shutdown_token());
//! server.start().await?;
//! server.wait().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod context;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod poller;
pub mod server_ext;
pub mod upstream;
pub mod ws;

#[cfg(test)]
mod testing;

pub use api::{RelayApiDoc, create_relay_router};
pub use context::{AppContext, DeviceRegistry};
pub use error::{RelayError, Result};
pub use gateway::{CommandGateway, GatewayCommand, GatewayReply};
pub use hub::{FanoutHub, Frame, HubEvent, HubOutcome, ViewerId};
pub use poller::{StatePoller, TickOutcome};
pub use server_ext::RelayServerExt;
pub use upstream::PlayerUpstream;
