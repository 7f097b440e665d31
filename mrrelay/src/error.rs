//! Erreurs du relais et leur traduction HTTP

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mrspotify::SpotifyError;
use thiserror::Error;

/// Type Result personnalisé pour mrrelay
pub type Result<T> = std::result::Result<T, RelayError>;

/// Erreurs du relais
#[derive(Error, Debug)]
pub enum RelayError {
    /// Aucun refresh token : le relais attend une autorisation
    #[error("No Spotify credential available, visit /auth/url to authorize")]
    CredentialUnavailable,

    /// Refresh ou échange de code refusé par Spotify
    #[error("Spotify rejected the credential: {0}")]
    UpstreamAuthFailure(String),

    /// Erreur réseau ou réponse inattendue de Spotify
    #[error("Spotify is unreachable: {0}")]
    UpstreamTransientFailure(String),

    /// Statut non-succès renvoyé par Spotify, corps conservé
    #[error("Spotify answered {status}: {body}")]
    UpstreamRejected { status: u16, body: String },

    /// Transfert demandé avant tout enregistrement d'appareil
    #[error("Device not registered")]
    DeviceNotRegistered,

    /// Message de pair illisible
    #[error("Malformed peer message: {0}")]
    MalformedPeerMessage(String),

    /// Callback OAuth sans code
    #[error("Missing authorization code: {0}")]
    MissingAuthorizationCode(String),

    /// Requête cliente invalide
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration Spotify incomplète
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RelayError {
    /// Traduit une erreur survenue en obtenant un access token
    pub fn from_token_error(err: SpotifyError) -> Self {
        match err {
            SpotifyError::NoRefreshToken => Self::CredentialUnavailable,
            SpotifyError::InvalidGrant(_) | SpotifyError::Unauthorized(_) => {
                Self::UpstreamAuthFailure(err.to_string())
            }
            SpotifyError::Configuration(msg) => Self::Configuration(msg),
            other => Self::UpstreamTransientFailure(other.to_string()),
        }
    }

    /// Traduit une erreur d'appel au lecteur Spotify
    pub fn from_upstream_error(err: SpotifyError) -> Self {
        match err {
            SpotifyError::ApiError { code, message } => Self::UpstreamRejected {
                status: code,
                body: message,
            },
            SpotifyError::Unauthorized(body) => Self::UpstreamRejected { status: 401, body },
            SpotifyError::RateLimitExceeded => Self::UpstreamRejected {
                status: 429,
                body: "Rate limit exceeded".to_string(),
            },
            other => Self::from_token_error(other),
        }
    }

    /// Statut HTTP renvoyé au client
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::CredentialUnavailable | RelayError::UpstreamAuthFailure(_) => {
                StatusCode::UNAUTHORIZED
            }
            RelayError::UpstreamTransientFailure(_) => StatusCode::BAD_GATEWAY,
            RelayError::UpstreamRejected { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            RelayError::DeviceNotRegistered
            | RelayError::MalformedPeerMessage(_)
            | RelayError::MissingAuthorizationCode(_)
            | RelayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            // Le corps amont est transmis tel quel
            RelayError::UpstreamRejected { body, .. } => body,
            other => other.to_string(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            RelayError::DeviceNotRegistered.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RelayError::CredentialUnavailable.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            RelayError::UpstreamRejected {
                status: 404,
                body: String::new()
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RelayError::UpstreamTransientFailure("timeout".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_spotify_error_translation() {
        assert!(matches!(
            RelayError::from_token_error(SpotifyError::NoRefreshToken),
            RelayError::CredentialUnavailable
        ));
        assert!(matches!(
            RelayError::from_token_error(SpotifyError::InvalidGrant("revoked".into())),
            RelayError::UpstreamAuthFailure(_)
        ));
        assert!(matches!(
            RelayError::from_upstream_error(SpotifyError::ApiError {
                code: 403,
                message: "premium required".into()
            }),
            RelayError::UpstreamRejected { status: 403, .. }
        ));
        assert!(matches!(
            RelayError::from_upstream_error(SpotifyError::Configuration("x".into())),
            RelayError::Configuration(_)
        ));
    }
}
