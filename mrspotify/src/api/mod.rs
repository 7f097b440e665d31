//! Couche d'accès aux API Spotify
//!
//! Ce module fournit une interface bas-niveau vers les deux hôtes Spotify :
//! - `accounts.spotify.com` pour l'autorisation et les tokens ([`auth`])
//! - `api.spotify.com/v1` pour le lecteur ([`player`])
//!
//! Aucun état d'authentification n'est conservé ici : l'access token est passé
//! à chaque appel, sa gestion revient au [`TokenManager`](crate::TokenManager).

pub mod auth;
pub mod player;

use crate::error::{Result, SpotifyError};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// URL de base du service de comptes
pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";

/// URL de base de l'API Web
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";

/// Scopes nécessaires au lecteur web et au suivi de lecture
pub const DEFAULT_SCOPES: &str =
    "user-read-playback-state user-modify-playback-state streaming user-read-email user-read-private";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

/// Client API bas-niveau pour communiquer avec Spotify
#[derive(Debug, Clone)]
pub struct SpotifyApi {
    client: Client,
    accounts_url: String,
    api_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: String,
}

impl SpotifyApi {
    /// Crée un builder avec les credentials de l'application
    pub fn builder(client_id: impl Into<String>, client_secret: impl Into<String>) -> SpotifyApiBuilder {
        SpotifyApiBuilder::new(client_id, client_secret)
    }

    /// Retourne le client id de l'application
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Retourne l'URI de redirection OAuth
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Retourne les scopes demandés lors de l'autorisation
    pub fn scopes(&self) -> &str {
        &self.scopes
    }

    fn accounts_endpoint(&self, path: &str) -> String {
        format!("{}{}", self.accounts_url, path)
    }

    fn api_endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Traite une réponse JSON de l'API Web
    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();
        debug!("Response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("Spotify API error ({}): {}", status.as_u16(), error_text);
            return Err(SpotifyError::from_status_code(status.as_u16(), error_text));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            warn!("Failed to parse response: {}", e);
            SpotifyError::JsonParse(e)
        })
    }
}

/// Builder pour [`SpotifyApi`]
///
/// Les URLs de base sont surchargeables pour pointer vers un serveur de test.
#[derive(Debug, Clone)]
pub struct SpotifyApiBuilder {
    client: Option<Client>,
    accounts_url: String,
    api_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: String,
    request_timeout: Duration,
}

impl SpotifyApiBuilder {
    /// Crée un builder avec les réglages par défaut
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client: None,
            accounts_url: DEFAULT_ACCOUNTS_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: String::new(),
            scopes: DEFAULT_SCOPES.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Utilise un client HTTP existant (le timeout du builder est alors ignoré)
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// URL de base du service de comptes
    pub fn accounts_url(mut self, url: impl Into<String>) -> Self {
        self.accounts_url = url.into();
        self
    }

    /// URL de base de l'API Web
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// URI de redirection enregistrée sur le dashboard Spotify
    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }

    /// Scopes séparés par des espaces
    pub fn scopes(mut self, scopes: impl Into<String>) -> Self {
        self.scopes = scopes.into();
        self
    }

    /// Timeout de chaque requête
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Construit le client
    pub fn build(self) -> Result<SpotifyApi> {
        if self.client_id.trim().is_empty() || self.client_secret.trim().is_empty() {
            return Err(SpotifyError::Configuration(
                "client id and client secret are required".to_string(),
            ));
        }

        let client = match self.client {
            Some(client) => client,
            None => Client::builder().timeout(self.request_timeout).build()?,
        };

        Ok(SpotifyApi {
            client,
            accounts_url: self.accounts_url.trim_end_matches('/').to_string(),
            api_url: self.api_url.trim_end_matches('/').to_string(),
            client_id: self.client_id,
            client_secret: self.client_secret,
            redirect_uri: self.redirect_uri,
            scopes: self.scopes,
        })
    }
}
