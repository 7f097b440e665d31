//! Gestionnaire de tokens OAuth
//!
//! Le [`TokenManager`] est le seul propriétaire du [`Credential`] du relais :
//! il fournit un access token valide à la demande, le rafraîchit quand il a
//! expiré et intègre le résultat de l'échange du code d'autorisation.
//!
//! Un access token est utilisable tant que `now < expires_at`, sans marge.
//! Les rafraîchissements concurrents sont sérialisés par un mutex : le second
//! appelant retrouve le token obtenu par le premier.

use crate::api::SpotifyApi;
use crate::api::auth::TokenResponse;
use crate::error::{Result, SpotifyError};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex as SyncMutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// Source de temps du gestionnaire de tokens
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Horloge système
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Horloge pilotée à la main, pour les tests et les simulations
#[derive(Debug)]
pub struct ManualClock {
    now: SyncMutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: SyncMutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Credential OAuth du compte partagé
#[derive(Clone, Default)]
pub struct Credential {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Credential {
    /// Credential ne contenant qu'un refresh token (amorçage par la config)
    pub fn from_refresh_token(refresh_token: Option<String>) -> Self {
        Self {
            refresh_token,
            ..Default::default()
        }
    }

    /// L'access token est-il utilisable à l'instant `now` ?
    pub fn is_access_token_valid(&self, now: DateTime<Utc>) -> bool {
        self.access_token.is_some() && now < self.expires_at
    }

    fn valid_access_token(&self, now: DateTime<Utc>) -> Option<AccessToken> {
        match &self.access_token {
            Some(token) if now < self.expires_at => Some(AccessToken {
                token: token.clone(),
                expires_at: self.expires_at,
            }),
            _ => None,
        }
    }

    fn apply(&mut self, response: TokenResponse, now: DateTime<Utc>) {
        self.access_token = Some(response.access_token);
        self.expires_at = now + Duration::seconds(response.expires_in);
        if let Some(refresh_token) = response.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
    }
}

/// Access token prêt à l'emploi
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Secondes restantes avant expiration (jamais négatif)
    pub fn expires_in_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// État global de l'authentification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuthState {
    /// Aucun refresh token
    Unauthorized,
    /// Échange de code en cours
    Authorizing,
    /// Refresh token présent et access token valide
    Authorized,
    /// Refresh token présent, access token absent ou expiré
    TokenExpired,
}

/// Compteur d'échanges en cours, tenu le temps d'un échange
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Gestionnaire du cycle de vie du credential
pub struct TokenManager {
    api: SpotifyApi,
    clock: Arc<dyn Clock>,
    credential: RwLock<Credential>,
    refresh_lock: Mutex<()>,
    exchanges_in_flight: AtomicUsize,
}

impl TokenManager {
    /// Crée un gestionnaire, éventuellement amorcé avec un refresh token
    pub fn new(api: SpotifyApi, refresh_token: Option<String>) -> Self {
        Self {
            api,
            clock: Arc::new(SystemClock),
            credential: RwLock::new(Credential::from_refresh_token(refresh_token)),
            refresh_lock: Mutex::new(()),
            exchanges_in_flight: AtomicUsize::new(0),
        }
    }

    /// Remplace l'horloge
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Remplace le credential initial
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = RwLock::new(credential);
        self
    }

    /// Client API sous-jacent
    pub fn api(&self) -> &SpotifyApi {
        &self.api
    }

    /// Instant courant selon l'horloge du gestionnaire
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Copie du credential courant
    pub async fn credential(&self) -> Credential {
        self.credential.read().await.clone()
    }

    /// Retourne un access token valide, en le rafraîchissant si nécessaire
    ///
    /// # Errors
    ///
    /// * `SpotifyError::NoRefreshToken` - aucune autorisation n'a été donnée
    /// * `SpotifyError::InvalidGrant` - le refresh token a été révoqué (il est oublié)
    /// * toute erreur du endpoint token
    pub async fn ensure_valid_access_token(&self) -> Result<AccessToken> {
        if let Some(token) = self.credential.read().await.valid_access_token(self.clock.now()) {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Un autre appelant a pu rafraîchir pendant l'attente du verrou
        let refresh_token = {
            let credential = self.credential.read().await;
            if let Some(token) = credential.valid_access_token(self.clock.now()) {
                return Ok(token);
            }
            credential
                .refresh_token
                .clone()
                .ok_or(SpotifyError::NoRefreshToken)?
        };

        match self.api.refresh_access_token(&refresh_token).await {
            Ok(response) => {
                let mut credential = self.credential.write().await;
                credential.apply(response, self.clock.now());
                info!("✅ Access token refreshed");
                credential
                    .valid_access_token(self.clock.now())
                    .ok_or_else(|| SpotifyError::Unauthorized("refreshed token already expired".to_string()))
            }
            Err(e) if e.is_invalid_grant() => {
                let mut credential = self.credential.write().await;
                if credential.refresh_token.as_deref() == Some(refresh_token.as_str()) {
                    credential.refresh_token = None;
                    credential.access_token = None;
                }
                warn!("Refresh token rejected, authorization required: {}", e);
                Err(e)
            }
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                Err(e)
            }
        }
    }

    /// Échange un code d'autorisation contre un nouveau credential
    ///
    /// Le refresh token obtenu est journalisé : rien n'est persisté, c'est à
    /// l'opérateur de le reporter dans sa configuration.
    pub async fn exchange_authorization_code(&self, code: &str) -> Result<()> {
        // Décrémenté au drop : une requête abandonnée ne bloque pas l'état
        let _in_flight = InFlight::enter(&self.exchanges_in_flight);
        self.exchange_inner(code).await
    }

    async fn exchange_inner(&self, code: &str) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        let response = self.api.exchange_code(code).await.inspect_err(|e| {
            warn!("Authorization code exchange failed: {}", e);
        })?;

        let mut credential = self.credential.write().await;
        credential.apply(response, self.clock.now());

        match &credential.refresh_token {
            Some(refresh_token) => {
                info!("✅ Authorization successful!");
                info!("🔑 Save this refresh token to your configuration:");
                info!("SPOTIFY_REFRESH_TOKEN={}", refresh_token);
                Ok(())
            }
            None => Err(SpotifyError::Unauthorized(
                "token endpoint returned no refresh token".to_string(),
            )),
        }
    }

    /// Un refresh token est-il disponible ?
    pub async fn has_refresh_token(&self) -> bool {
        self.credential.read().await.refresh_token.is_some()
    }

    /// L'access token courant est-il valide ? (sans effet de bord)
    pub async fn is_access_token_valid(&self) -> bool {
        self.credential
            .read()
            .await
            .is_access_token_valid(self.clock.now())
    }

    /// État courant de l'authentification
    pub async fn state(&self) -> AuthState {
        if self.exchanges_in_flight.load(Ordering::SeqCst) > 0 {
            return AuthState::Authorizing;
        }

        let credential = self.credential.read().await;
        match (
            credential.refresh_token.is_some(),
            credential.is_access_token_valid(self.clock.now()),
        ) {
            (false, _) => AuthState::Unauthorized,
            (true, true) => AuthState::Authorized,
            (true, false) => AuthState::TokenExpired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(credential: Credential, clock: Arc<ManualClock>) -> TokenManager {
        let api = SpotifyApi::builder("id", "secret")
            // Port fermé : un appel réseau inattendu échoue immédiatement
            .accounts_url("http://127.0.0.1:9")
            .build()
            .unwrap();
        TokenManager::new(api, None)
            .with_clock(clock)
            .with_credential(credential)
    }

    #[tokio::test]
    async fn test_cached_token_is_returned_before_expiry() {
        let t = Utc::now();
        let clock = Arc::new(ManualClock::new(t - Duration::milliseconds(1)));
        let manager = manager(
            Credential {
                access_token: Some("cached".to_string()),
                refresh_token: Some("refresh".to_string()),
                expires_at: t,
            },
            clock,
        );

        let token = manager.ensure_valid_access_token().await.unwrap();
        assert_eq!(token.token, "cached");
        assert_eq!(manager.state().await, AuthState::Authorized);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_is_unauthorized() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = manager(Credential::default(), clock);

        assert!(matches!(
            manager.ensure_valid_access_token().await,
            Err(SpotifyError::NoRefreshToken)
        ));
        assert_eq!(manager.state().await, AuthState::Unauthorized);
        assert!(!manager.has_refresh_token().await);
    }

    #[tokio::test]
    async fn test_state_is_expired_at_boundary() {
        let t = Utc::now();
        let clock = Arc::new(ManualClock::new(t));
        let manager = manager(
            Credential {
                access_token: Some("stale".to_string()),
                refresh_token: Some("refresh".to_string()),
                expires_at: t,
            },
            clock.clone(),
        );

        assert_eq!(manager.state().await, AuthState::TokenExpired);
        assert!(!manager.is_access_token_valid().await);

        clock.set(t - Duration::seconds(10));
        assert_eq!(manager.state().await, AuthState::Authorized);
    }

    #[test]
    fn test_expires_in_secs_never_negative() {
        let t = Utc::now();
        let token = AccessToken {
            token: "x".to_string(),
            expires_at: t,
        };
        assert_eq!(token.expires_in_secs(t - Duration::seconds(30)), 30);
        assert_eq!(token.expires_in_secs(t + Duration::seconds(30)), 0);
    }

    #[test]
    fn test_credential_debug_hides_tokens() {
        let credential = Credential {
            access_token: Some("super-secret".to_string()),
            refresh_token: None,
            expires_at: Utc::now(),
        };
        assert!(!format!("{:?}", credential).contains("super-secret"));
    }
}
