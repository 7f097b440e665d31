//! # Module Server - API de haut niveau pour Axum
//!
//! Ce module cache la configuration et le routage Axum derrière quelques
//! méthodes d'enregistrement.
//!
//! - 🚀 **Routes JSON simples** : `add_route()`
//! - 🎯 **Handlers avec état** : `add_handler_with_state()`
//! - 🔀 **Sous-routers** : `add_router()` (WebSocket, SSE, etc.)
//! - 📚 **Documentation API** : `add_openapi()`
//! - ⚡ **Arrêt gracieux** : Ctrl+C ou jeton d'annulation partagé

use crate::logs::{LogState, LoggingOptions, LogsApiDoc, create_logs_router, init_logging, log_dump, log_sse};
use anyhow::{Context, Result};
use axum::handler::Handler;
use axum::routing::get;
use axum::{Json, Router};
use mrconfig::Config;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal, sync::RwLock, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Info serveur sérialisable
#[derive(Clone, Debug, Serialize, utoipa::ToSchema)]
pub struct ServerInfo {
    pub name: String,
    pub http_port: u16,
    pub local_addr: Option<String>,
}

/// Serveur principal
pub struct Server {
    name: String,
    http_port: u16,
    router: Arc<RwLock<Router>>,
    join_handle: Option<JoinHandle<()>>,
    log_state: Option<LogState>,
    local_addr: Option<SocketAddr>,
    shutdown: CancellationToken,
}

impl Server {
    /// Crée une nouvelle instance de serveur
    ///
    /// # Arguments
    ///
    /// * `name` - Nom du serveur (pour les logs)
    /// * `http_port` - Port HTTP à écouter (0 = port éphémère)
    pub fn new(name: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            http_port,
            router: Arc::new(RwLock::new(Router::new())),
            join_handle: None,
            log_state: None,
            local_addr: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Ajoute une route JSON dynamique
    ///
    /// La closure est appelée à chaque requête GET sur `path`.
    ///
    /// ```rust,no_run
    /// # use mrserver::Server;
    /// # #[tokio::main]
    /// # async fn main() {
    /// # let mut server = Server::new("Test", 3001);
    /// server.add_route("/api/status", || async {
    ///     serde_json::json!({ "status": "online" })
    /// }).await;
    /// # }
    /// ```
    pub async fn add_route<F, Fut, T>(&mut self, path: &str, f: F)
    where
        F: Fn() -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let handler = move || {
            let f = f.clone();
            async move { Json(f().await) }
        };

        self.merge(Router::new().route(path, get(handler))).await;
    }

    /// Ajoute un handler GET avec état
    pub async fn add_handler_with_state<H, T, S>(&mut self, path: &str, handler: H, state: S)
    where
        H: Handler<T, S> + Clone + 'static,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        let route = Router::new().route(path, get(handler)).with_state(state);
        self.merge(route).await;
    }

    /// Ajoute un sous-router au serveur
    ///
    /// - Si `path` est "/", merge directement au router principal
    /// - Sinon, nest le router sous le chemin donné
    pub async fn add_router(&mut self, path: &str, sub_router: Router) {
        if path == "/" {
            self.merge(sub_router).await;
        } else {
            let normalized = format!("/{}", path.trim_matches('/'));
            let mut r = self.router.write().await;
            *r = std::mem::take(&mut *r).nest(&normalized, sub_router);
        }
    }

    /// Ajoute une API documentée avec OpenAPI et Swagger UI
    ///
    /// Les routes de `api_router` sont servies sous `/api/{name}`, la
    /// documentation sous `/swagger-ui/{name}` et la spécification brute sous
    /// `/api-docs/{name}.json`.
    pub async fn add_openapi(
        &mut self,
        api_router: Router,
        openapi: utoipa::openapi::OpenApi,
        name: &str,
    ) {
        let swagger_path: &'static str = Box::leak(format!("/swagger-ui/{}", name).into_boxed_str());
        let openapi_json_path: &'static str =
            Box::leak(format!("/api-docs/{}.json", name).into_boxed_str());

        let swagger = SwaggerUi::new(swagger_path).url(openapi_json_path, openapi);
        let nested = Router::new().nest(&format!("/api/{}", name), api_router);

        self.merge(nested.merge(swagger)).await;
    }

    /// Publie uniquement la documentation d'une API déjà routée
    ///
    /// Pour les API dont les chemins sont imposés par des clients existants
    /// et ne peuvent pas vivre sous `/api/{name}`.
    pub async fn add_swagger(&mut self, openapi: utoipa::openapi::OpenApi, name: &str) {
        let swagger_path: &'static str = Box::leak(format!("/swagger-ui/{}", name).into_boxed_str());
        let openapi_json_path: &'static str =
            Box::leak(format!("/api-docs/{}.json", name).into_boxed_str());

        self.merge(SwaggerUi::new(swagger_path).url(openapi_json_path, openapi).into())
            .await;
    }

    async fn merge(&mut self, route: Router) {
        let mut r = self.router.write().await;
        *r = std::mem::take(&mut *r).merge(route);
    }

    /// Retourne une copie du router courant, avec les couches CORS et trace
    ///
    /// Utile pour tester les routes sans ouvrir de socket.
    pub async fn router(&self) -> Router {
        self.router
            .read()
            .await
            .clone()
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Démarre le serveur HTTP
    ///
    /// Le socket est ouvert avant de rendre la main : une erreur de bind est
    /// donc remontée à l'appelant. Ctrl+C déclenche l'arrêt gracieux.
    pub async fn start(&mut self) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.http_port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Cannot listen on {}", addr))?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        info!("Server {} listening on http://{}", self.name, local_addr);

        let router = self.router().await;
        let shutdown = self.shutdown.clone();
        let server_task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
            {
                error!("HTTP server stopped with error: {}", e);
            }
        });

        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                res = signal::ctrl_c() => match res {
                    Ok(()) => {
                        info!("Ctrl+C reçu, arrêt gracieux");
                        shutdown.cancel();
                    }
                    Err(e) => warn!("Unable to listen for Ctrl+C: {}", e),
                },
                _ = shutdown.cancelled() => {}
            }
        });

        self.join_handle = Some(server_task);
        Ok(())
    }

    /// Attend la fin du serveur
    pub async fn wait(&mut self) {
        if let Some(h) = self.join_handle.take() {
            let _ = h.await;
        }
    }

    /// Jeton annulé à l'arrêt du serveur
    ///
    /// Les tâches de fond (polling, etc.) s'y abonnent pour s'arrêter avec
    /// le serveur ; l'annuler déclenche aussi l'arrêt gracieux.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Récupère les infos du serveur
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            name: self.name.clone(),
            http_port: self.http_port,
            local_addr: self.local_addr.map(|a| a.to_string()),
        }
    }

    /// État du système de logs, si initialisé
    pub fn log_state(&self) -> Option<&LogState> {
        self.log_state.as_ref()
    }

    /// Initialise le système de logging et enregistre les routes de logs
    ///
    /// Routes enregistrées :
    /// - `GET /log-sse` - flux SSE des logs
    /// - `GET /log-dump` - contenu du buffer en JSON
    /// - `GET|POST /api/logs/log_setup` - niveau de log courant
    pub async fn init_logging(&mut self, options: LoggingOptions) {
        let log_state = init_logging(options);

        self.add_handler_with_state("/log-sse", log_sse, log_state.clone())
            .await;
        self.add_handler_with_state("/log-dump", log_dump, log_state.clone())
            .await;
        self.add_openapi(
            create_logs_router(log_state.clone()),
            LogsApiDoc::openapi(),
            "logs",
        )
        .await;

        self.log_state = Some(log_state);
    }
}

/// Builder pattern
pub struct ServerBuilder {
    name: String,
    http_port: u16,
}

impl ServerBuilder {
    /// Crée un nouveau builder
    pub fn new(name: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            http_port,
        }
    }

    /// Crée un builder depuis la configuration (`host.http_port`)
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            name: "MultiRoom-Relay".to_string(),
            http_port: config.get_http_port()?,
        })
    }

    /// Construit le serveur
    pub fn build(self) -> Server {
        Server::new(self.name, self.http_port)
    }
}
