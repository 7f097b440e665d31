//! Gestion des erreurs pour le client Spotify

use serde::Deserialize;
use thiserror::Error;

/// Type Result personnalisé pour mrspotify
pub type Result<T> = std::result::Result<T, SpotifyError>;

/// Erreurs possibles lors des échanges avec Spotify
#[derive(Error, Debug)]
pub enum SpotifyError {
    /// Aucun refresh token : l'autorisation n'a jamais été donnée
    #[error("No refresh token available, authorization required")]
    NoRefreshToken,

    /// Refresh token révoqué ou code d'autorisation invalide
    #[error("Invalid grant: {0}")]
    InvalidGrant(String),

    /// Erreur d'authentification (token ou client credentials refusés)
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Erreur HTTP (réseau, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Erreur de parsing JSON
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Erreur de configuration Spotify (client id, secret, URL...)
    #[error("Spotify configuration error: {0}")]
    Configuration(String),

    /// Erreur de l'API Spotify, avec le corps de réponse brut
    #[error("Spotify API error (code {code}): {message}")]
    ApiError { code: u16, message: String },

    /// Quota dépassé (rate limiting)
    #[error("Rate limit exceeded, please try again later")]
    RateLimitExceeded,
}

/// Corps d'erreur de l'endpoint token (RFC 6749 §5.2)
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl SpotifyError {
    /// Crée une erreur API depuis un code de statut HTTP et un message
    pub fn from_status_code(code: u16, message: impl Into<String>) -> Self {
        match code {
            401 | 403 => Self::Unauthorized(message.into()),
            429 => Self::RateLimitExceeded,
            _ => Self::ApiError {
                code,
                message: message.into(),
            },
        }
    }

    /// Classe une réponse en erreur de l'endpoint token
    ///
    /// `invalid_grant` est isolé : c'est le seul cas où le refresh token
    /// lui-même doit être abandonné.
    pub fn from_token_error(code: u16, body: &str) -> Self {
        match serde_json::from_str::<TokenErrorBody>(body) {
            Ok(err) if err.error == "invalid_grant" => {
                Self::InvalidGrant(err.error_description.unwrap_or(err.error))
            }
            Ok(err) if err.error == "invalid_client" => {
                Self::Unauthorized(err.error_description.unwrap_or(err.error))
            }
            _ => Self::from_status_code(code, body),
        }
    }

    /// Vérifie si l'erreur relève de l'authentification
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            SpotifyError::NoRefreshToken
                | SpotifyError::InvalidGrant(_)
                | SpotifyError::Unauthorized(_)
        )
    }

    /// Vérifie si le refresh token a été révoqué
    pub fn is_invalid_grant(&self) -> bool {
        matches!(self, SpotifyError::InvalidGrant(_))
    }

    /// Vérifie si l'erreur est une erreur de rate limiting
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, SpotifyError::RateLimitExceeded)
    }
}
