//! Endpoints d'autorisation OAuth (authorization code flow)

use super::SpotifyApi;
use crate::error::{Result, SpotifyError};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

/// Réponse de `POST /api/token`
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Absent lors d'un refresh si Spotify garde le même refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Durée de validité en secondes
    pub expires_in: i64,
}

impl SpotifyApi {
    /// Construit l'URL de consentement à ouvrir dans un navigateur
    pub fn authorize_url(&self) -> Result<String> {
        if self.redirect_uri.is_empty() {
            return Err(SpotifyError::Configuration(
                "redirect uri is not configured".to_string(),
            ));
        }

        let url = Url::parse_with_params(
            &self.accounts_endpoint("/authorize"),
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("scope", self.scopes.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
            ],
        )
        .map_err(|e| SpotifyError::Configuration(format!("invalid accounts url: {}", e)))?;

        Ok(url.into())
    }

    /// Échange un code d'autorisation contre un couple de tokens
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        debug!("Exchanging authorization code");
        self.request_token(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await
    }

    /// Obtient un nouvel access token à partir du refresh token
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        debug!("Refreshing access token");
        self.request_token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    fn basic_auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.client_id, self.client_secret);
        format!("Basic {}", STANDARD.encode(credentials))
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .client
            .post(self.accounts_endpoint("/api/token"))
            .header(reqwest::header::AUTHORIZATION, self.basic_auth_header())
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("Token endpoint error ({}): {}", status.as_u16(), body);
            return Err(SpotifyError::from_token_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(SpotifyError::JsonParse)
    }
}
