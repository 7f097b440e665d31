//! Extension pour intégrer la configuration Spotify dans mrconfig
//!
//! Ce module fournit le trait `SpotifyConfigExt` qui ajoute à
//! `mrconfig::Config` la lecture des paramètres de la section
//! `accounts.spotify`.

use crate::api::{DEFAULT_ACCOUNTS_URL, DEFAULT_API_URL, DEFAULT_SCOPES, SpotifyApi};
use anyhow::{Result, anyhow};
use mrconfig::Config;
use std::time::Duration;

const SECTION: [&str; 2] = ["accounts", "spotify"];

fn path(key: &str) -> [&str; 3] {
    [SECTION[0], SECTION[1], key]
}

/// Trait d'extension pour lire la configuration Spotify
///
/// # Exemple
///
/// ```rust,ignore
/// use mrconfig::Config;
/// use mrspotify::SpotifyConfigExt;
///
/// let config = Config::load_config("")?;
/// let api = config.spotify_api()?;
/// println!("Redirect URI: {}", api.redirect_uri());
/// ```
pub trait SpotifyConfigExt {
    /// Client id de l'application Spotify
    ///
    /// # Errors
    ///
    /// Retourne une erreur si le client id n'est pas configuré
    fn get_spotify_client_id(&self) -> Result<String>;

    /// Client secret (déchiffré si stocké sous forme `encrypted:`)
    ///
    /// # Errors
    ///
    /// Retourne une erreur si le secret n'est pas configuré ou illisible
    fn get_spotify_client_secret(&self) -> Result<String>;

    /// URI de redirection OAuth
    fn get_spotify_redirect_uri(&self) -> Result<String>;

    /// Refresh token d'amorçage, s'il y en a un
    fn get_spotify_refresh_token(&self) -> Result<Option<String>>;

    /// Scopes demandés à l'autorisation
    fn get_spotify_scopes(&self) -> Result<String>;

    /// URL de base du service de comptes
    fn get_spotify_accounts_url(&self) -> Result<String>;

    /// URL de base de l'API Web
    fn get_spotify_api_url(&self) -> Result<String>;

    /// Construit le client API à partir de la configuration
    fn spotify_api(&self) -> Result<SpotifyApi>;
}

impl SpotifyConfigExt for Config {
    fn get_spotify_client_id(&self) -> Result<String> {
        self.get_string(&path("client_id"))?
            .ok_or_else(|| anyhow!("Spotify client id not configured (SPOTIFY_CLIENT_ID)"))
    }

    fn get_spotify_client_secret(&self) -> Result<String> {
        self.get_secret(&path("client_secret"))?
            .ok_or_else(|| anyhow!("Spotify client secret not configured (SPOTIFY_CLIENT_SECRET)"))
    }

    fn get_spotify_redirect_uri(&self) -> Result<String> {
        self.get_string(&path("redirect_uri"))?
            .ok_or_else(|| anyhow!("Spotify redirect uri not configured (REDIRECT_URI)"))
    }

    fn get_spotify_refresh_token(&self) -> Result<Option<String>> {
        self.get_secret(&path("refresh_token"))
    }

    fn get_spotify_scopes(&self) -> Result<String> {
        Ok(self
            .get_string(&path("scopes"))?
            .unwrap_or_else(|| DEFAULT_SCOPES.to_string()))
    }

    fn get_spotify_accounts_url(&self) -> Result<String> {
        Ok(self
            .get_string(&path("accounts_url"))?
            .unwrap_or_else(|| DEFAULT_ACCOUNTS_URL.to_string()))
    }

    fn get_spotify_api_url(&self) -> Result<String> {
        Ok(self
            .get_string(&path("api_url"))?
            .unwrap_or_else(|| DEFAULT_API_URL.to_string()))
    }

    fn spotify_api(&self) -> Result<SpotifyApi> {
        let timeout = Duration::from_secs(self.get_request_timeout_secs()? as u64);

        SpotifyApi::builder(
            self.get_spotify_client_id()?,
            self.get_spotify_client_secret()?,
        )
        .redirect_uri(self.get_spotify_redirect_uri()?)
        .scopes(self.get_spotify_scopes()?)
        .accounts_url(self.get_spotify_accounts_url()?)
        .api_url(self.get_spotify_api_url()?)
        .timeout(timeout)
        .build()
        .map_err(|e| anyhow!("Cannot build Spotify client: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_are_reported() {
        let config = Config::from_yaml_str("").unwrap();
        assert!(config.get_spotify_client_id().is_err());
        assert!(config.spotify_api().is_err());
        assert_eq!(config.get_spotify_refresh_token().unwrap(), None);
    }

    #[test]
    fn test_spotify_api_from_config() {
        let config = Config::from_yaml_str(
            "accounts:\n  spotify:\n    client_id: abc\n    client_secret: def\n    refresh_token: seed\n",
        )
        .unwrap();

        let api = config.spotify_api().unwrap();
        assert_eq!(api.client_id(), "abc");
        assert_eq!(api.redirect_uri(), "http://127.0.0.1:3001/callback");
        assert_eq!(api.scopes(), DEFAULT_SCOPES);
        assert_eq!(
            config.get_spotify_refresh_token().unwrap().as_deref(),
            Some("seed")
        );
    }
}
