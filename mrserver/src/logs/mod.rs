//! Logs applicatifs consultables à chaud
//!
//! Les événements `tracing` sont conservés dans un buffer circulaire et
//! diffusés en SSE. Le niveau minimum peut être changé sans redémarrer.
mod sselayer;

pub use sselayer::SseLayer;

use std::{collections::VecDeque, sync::Arc};

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use chrono::{DateTime, Utc};
use mrconfig::Config;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::Level;
use tracing_subscriber::{
    Registry, filter::LevelFilter, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

const AVAILABLE_LEVELS: [&str; 5] = ["ERROR", "WARN", "INFO", "DEBUG", "TRACE"];

/// Représente une entrée de log
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub target: String,
    pub message: String,
}

/// Buffer circulaire partagé
#[derive(Clone)]
pub struct LogState {
    buffer: Arc<RwLock<VecDeque<LogEntry>>>,
    capacity: usize,
    tx: broadcast::Sender<LogEntry>,
    max_level: Arc<RwLock<Level>>,
    reload_handle: reload::Handle<LevelFilter, Registry>,
}

impl LogState {
    pub fn new(capacity: usize, reload_handle: reload::Handle<LevelFilter, Registry>) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            tx: broadcast::channel(1000).0,
            max_level: Arc::new(RwLock::new(Level::TRACE)),
            reload_handle,
        }
    }

    pub fn set_max_level(&self, level: Level) {
        *self.max_level.write() = level;

        // Le filtre global est rechargé, pas seulement l'affichage SSE
        if let Err(e) = self.reload_handle.reload(level_to_levelfilter(level)) {
            eprintln!("❌ Failed to reload log level filter: {}", e);
        }
    }

    pub fn get_max_level(&self) -> Level {
        *self.max_level.read()
    }

    fn push(&self, entry: LogEntry) {
        {
            let mut buf = self.buffer.write();
            if buf.len() >= self.capacity {
                buf.pop_front();
            }
            buf.push_back(entry.clone());
        }
        let _ = self.tx.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.tx.subscribe()
    }

    pub fn dump(&self) -> Vec<LogEntry> {
        self.buffer.read().iter().cloned().collect()
    }
}

/// Query params pour /log-sse
#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    #[serde(default)]
    pub error: Option<bool>,
    #[serde(default)]
    pub warn: Option<bool>,
    #[serde(default)]
    pub info: Option<bool>,
    #[serde(default)]
    pub debug: Option<bool>,
    #[serde(default)]
    pub trace: Option<bool>,
    #[serde(default)]
    pub search: Option<String>,
}

/// Handler SSE
///
/// Envoie d'abord l'historique du buffer, puis les nouveaux logs au fil de
/// l'eau, filtrés par le niveau courant et les paramètres de la requête.
pub async fn log_sse(
    State(state): State<LogState>,
    Query(params): Query<LogQuery>,
) -> impl IntoResponse {
    let mut rx = state.subscribe();
    let history = state.dump();
    let stream_state = state.clone();

    let stream = async_stream::stream! {
        let current_level = stream_state.get_max_level();
        for entry in history {
            if !is_level_allowed(&entry.level, current_level) || !filter_entry(&entry, &params) {
                continue;
            }
            if let Ok(json) = serde_json::to_string(&entry) {
                yield Ok::<_, axum::Error>(Event::default().data(json));
            }
        }

        loop {
            match rx.recv().await {
                Ok(entry) => {
                    if !is_level_allowed(&entry.level, stream_state.get_max_level())
                        || !filter_entry(&entry, &params)
                    {
                        continue;
                    }
                    if let Ok(json) = serde_json::to_string(&entry) {
                        yield Ok::<_, axum::Error>(Event::default().data(json));
                    }
                }
                // Un client trop lent perd des entrées mais reste connecté
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Handler REST (dump JSON du buffer)
pub async fn log_dump(State(state): State<LogState>) -> impl IntoResponse {
    Json(state.dump())
}

/// Vérifie si un niveau de log est autorisé selon le niveau maximum configuré
fn is_level_allowed(log_level: &str, max_level: Level) -> bool {
    match string_to_level(log_level) {
        // Level::ERROR est le plus petit : ERROR <= WARN <= ... <= TRACE
        Some(entry_level) => entry_level <= max_level,
        None => false,
    }
}

/// Filtrage par drapeaux de niveau et mot-clé
fn filter_entry(entry: &LogEntry, q: &LogQuery) -> bool {
    let lvl = entry.level.to_lowercase();
    let flags = [
        ("error", q.error),
        ("warn", q.warn),
        ("info", q.info),
        ("debug", q.debug),
        ("trace", q.trace),
    ];

    // si aucun flag → tout est autorisé
    let any_flag = flags.iter().any(|(_, f)| f.unwrap_or(false));
    let mut allowed = !any_flag
        || flags
            .iter()
            .any(|(name, f)| f.unwrap_or(false) && lvl == *name);

    if let Some(search) = &q.search {
        allowed &= entry.message.contains(search) || entry.target.contains(search);
    }

    allowed
}

/// Options d'initialisation du système de logging
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Capacité du buffer circulaire (nombre d'entrées conservées)
    pub buffer_capacity: usize,
    /// Activer la sortie vers la console
    pub enable_console: bool,
    /// Niveau minimum au démarrage
    pub min_level: Level,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            buffer_capacity: 1000,
            enable_console: true,
            min_level: Level::INFO,
        }
    }
}

impl LoggingOptions {
    /// Lit les options dans la section `host.logger`
    ///
    /// Une valeur illisible retombe sur la valeur par défaut.
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            buffer_capacity: config
                .get_log_cache_size()
                .unwrap_or(defaults.buffer_capacity),
            enable_console: config
                .get_log_enable_console()
                .unwrap_or(defaults.enable_console),
            min_level: config
                .get_log_min_level()
                .ok()
                .and_then(|l| string_to_level(&l))
                .unwrap_or(defaults.min_level),
        }
    }
}

/// Initialise le système de logging avec SSE et optionnellement la console
///
/// Si un subscriber global est déjà installé (tests, double appel), il est
/// conservé : le `LogState` retourné reste utilisable mais ne reçoit rien.
///
/// # Exemple
/// ```rust,no_run
/// use mrserver::logs::{init_logging, LoggingOptions};
///
/// let log_state = init_logging(LoggingOptions::default());
/// ```
pub fn init_logging(options: LoggingOptions) -> LogState {
    let (filter, reload_handle) = reload::Layer::new(level_to_levelfilter(options.min_level));

    let log_state = LogState::new(options.buffer_capacity, reload_handle);
    *log_state.max_level.write() = options.min_level;

    let console = options.enable_console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_ansi(true)
    });

    // Le filtre rechargeable doit précéder les autres layers
    let result = Registry::default()
        .with(filter)
        .with(SseLayer::new(log_state.clone()))
        .with(console)
        .try_init();

    if let Err(e) = result {
        eprintln!("⚠️ Logging already initialised: {}", e);
    }

    log_state
}

/// Request body pour la configuration du logging
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LogSetupRequest {
    pub level: String,
}

/// Response pour la configuration du logging
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LogSetupResponse {
    pub current_level: String,
    pub available_levels: Vec<String>,
}

impl LogSetupResponse {
    fn new(level: Level) -> Self {
        Self {
            current_level: level_to_string(level),
            available_levels: AVAILABLE_LEVELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// Handler pour GET /api/logs/log_setup - retourne la configuration actuelle
#[utoipa::path(
    get,
    path = "/api/logs/log_setup",
    responses(
        (status = 200, description = "Log configuration retrieved successfully", body = LogSetupResponse)
    ),
    tag = "logs"
)]
pub async fn log_setup_get(State(state): State<LogState>) -> impl IntoResponse {
    Json(LogSetupResponse::new(state.get_max_level()))
}

/// Handler pour POST /api/logs/log_setup - met à jour le niveau de log
#[utoipa::path(
    post,
    path = "/api/logs/log_setup",
    request_body = LogSetupRequest,
    responses(
        (status = 200, description = "Log level updated successfully", body = LogSetupResponse),
        (status = 400, description = "Invalid log level")
    ),
    tag = "logs"
)]
pub async fn log_setup_post(
    State(state): State<LogState>,
    Json(payload): Json<LogSetupRequest>,
) -> impl IntoResponse {
    let Some(level) = string_to_level(&payload.level) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "Invalid log level. Must be one of: ERROR, WARN, INFO, DEBUG, TRACE"
            })),
        )
            .into_response();
    };

    state.set_max_level(level);
    tracing::info!("Log level changed to: {}", level);

    (StatusCode::OK, Json(LogSetupResponse::new(level))).into_response()
}

fn string_to_level(s: &str) -> Option<Level> {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Some(Level::ERROR),
        "WARN" | "WARNING" => Some(Level::WARN),
        "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    }
}

fn level_to_string(level: Level) -> String {
    level.as_str().to_string()
}

fn level_to_levelfilter(level: Level) -> LevelFilter {
    LevelFilter::from_level(level)
}

/// Crée le router pour l'API de gestion des logs
pub fn create_logs_router(log_state: LogState) -> axum::Router {
    use axum::routing::get;
    axum::Router::new()
        .route("/log_setup", get(log_setup_get).post(log_setup_post))
        .with_state(log_state)
}

/// API OpenAPI pour la gestion des logs
#[derive(utoipa::OpenApi)]
#[openapi(
    paths(
        log_setup_get,
        log_setup_post,
    ),
    components(
        schemas(LogSetupRequest, LogSetupResponse)
    ),
    tags(
        (name = "logs", description = "Log level configuration endpoints")
    )
)]
pub struct LogsApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    fn state(capacity: usize) -> LogState {
        let (_filter, handle) = reload::Layer::<LevelFilter, Registry>::new(LevelFilter::TRACE);
        LogState::new(capacity, handle)
    }

    fn entry(level: &str, message: &str) -> LogEntry {
        LogEntry {
            timestamp: Utc::now(),
            level: level.to_string(),
            target: "multiroom::relay".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_buffer_is_bounded() {
        let state = state(2);
        state.push(entry("INFO", "one"));
        state.push(entry("INFO", "two"));
        state.push(entry("INFO", "three"));

        let messages: Vec<_> = state.dump().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["two", "three"]);
    }

    #[test]
    fn test_level_ordering() {
        assert!(is_level_allowed("ERROR", Level::INFO));
        assert!(is_level_allowed("info", Level::INFO));
        assert!(!is_level_allowed("DEBUG", Level::INFO));
        assert!(is_level_allowed("TRACE", Level::TRACE));
        assert!(!is_level_allowed("bogus", Level::TRACE));
    }

    #[test]
    fn test_filter_entry_flags_and_search() {
        let all = LogQuery::default();
        assert!(filter_entry(&entry("DEBUG", "x"), &all));

        let only_errors = LogQuery {
            error: Some(true),
            ..Default::default()
        };
        assert!(filter_entry(&entry("ERROR", "x"), &only_errors));
        assert!(!filter_entry(&entry("INFO", "x"), &only_errors));

        let search = LogQuery {
            search: Some("poll".to_string()),
            ..Default::default()
        };
        assert!(filter_entry(&entry("INFO", "poll tick"), &search));
        assert!(!filter_entry(&entry("INFO", "nothing"), &search));
    }

    #[test]
    fn test_options_from_config() {
        let config = Config::from_yaml_str(
            "host:\n  logger:\n    buffer_capacity: 42\n    enable_console: false\n    min_level: debug\n",
        )
        .unwrap();
        let options = LoggingOptions::from_config(&config);
        assert_eq!(options.buffer_capacity, 42);
        assert!(!options.enable_console);
        assert_eq!(options.min_level, Level::DEBUG);
    }

    #[test]
    fn test_set_max_level_updates_state() {
        let state = state(10);
        state.set_max_level(Level::WARN);
        assert_eq!(state.get_max_level(), Level::WARN);
        assert_eq!(level_to_string(state.get_max_level()), "WARN");
    }
}
