//! # mrserver - Serveur web haut niveau basé sur Axum
//!
//! Cette crate fournit une abstraction simple pour monter le serveur HTTP du
//! relais MultiRoom : routes JSON, handlers avec état, sous-routers, API
//! documentées OpenAPI et système de logs consultable à chaud.
//!
//! ## Fonctionnalités
//!
//! - 🚀 **API de haut niveau** : enregistrement de routes sans manipuler le `Router`
//! - 📡 **Server-Sent Events (SSE)** : logs en temps réel via `/log-sse`
//! - 📚 **Documentation OpenAPI** : Swagger UI par API enregistrée
//! - 🌍 **CORS permissif** et traçage des requêtes HTTP
//! - ⚡ **Arrêt gracieux** : Ctrl+C ou [`Server::shutdown_token`]
//!
//! ## Exemple d'utilisation
//!
//! ```rust,no_run
//! use mrserver::{ServerBuilder, logs::LoggingOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = ServerBuilder::new("MyServer", 3001).build();
//!     server.init_logging(LoggingOptions::default()).await;
//!
//!     server.add_route("/api/status", || async {
//!         serde_json::json!({"status": "ok"})
//!     }).await;
//!
//!     server.start().await?;
//!     server.wait().await;
//!     Ok(())
//! }
//! ```

pub mod logs;
pub mod server;

pub use logs::{LogState, LoggingOptions, SseLayer, log_dump, log_sse};
pub use server::{Server, ServerBuilder, ServerInfo};
