//! Passerelle de commandes
//!
//! Point d'entrée unique des opérations requête/réponse exposées aux viewers
//! et à l'agent de lecture local. Chaque route HTTP se contente de construire
//! une [`GatewayCommand`] et de renvoyer la [`GatewayReply`] obtenue.

use crate::context::AppContext;
use crate::error::{RelayError, Result};
use axum::{
    Json,
    response::{Html, IntoResponse, Response},
};
use mrspotify::{AuthState, PlaybackSnapshot};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;

/// Commandes acceptées par la passerelle
#[derive(Debug, Clone)]
pub enum GatewayCommand {
    GetAccessToken,
    RegisterDevice(String),
    TransferPlayback { play: bool },
    VerifyPassword(String),
    GetHealth,
    Ping,
    GetPlayback,
    AuthorizeUrl,
    CompleteAuthorization(String),
}

/// Access token pour le SDK de lecture web
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenReply {
    pub access_token: String,
    /// Secondes restantes
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SuccessReply {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PasswordReply {
    pub valid: bool,
}

/// État du relais, sans effet de bord
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthReply {
    pub status: String,
    pub has_token: bool,
    pub token_valid: bool,
    #[schema(value_type = String)]
    pub auth_state: AuthState,
    pub viewers: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PingReply {
    pub status: String,
    /// RFC 3339
    pub timestamp: String,
    /// Secondes depuis le démarrage
    pub uptime: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthUrlReply {
    pub url: String,
    pub redirect_uri: String,
}

/// Réponses de la passerelle
#[derive(Debug, Clone)]
pub enum GatewayReply {
    Token(TokenReply),
    Success(SuccessReply),
    Password(PasswordReply),
    Health(HealthReply),
    Ping(PingReply),
    Playback(PlaybackSnapshot),
    AuthUrl(AuthUrlReply),
    /// Page de confirmation après le callback OAuth
    Authorized,
}

impl IntoResponse for GatewayReply {
    fn into_response(self) -> Response {
        match self {
            GatewayReply::Token(reply) => Json(reply).into_response(),
            GatewayReply::Success(reply) => Json(reply).into_response(),
            GatewayReply::Password(reply) => Json(reply).into_response(),
            GatewayReply::Health(reply) => Json(reply).into_response(),
            GatewayReply::Ping(reply) => Json(reply).into_response(),
            GatewayReply::Playback(snapshot) => Json(snapshot).into_response(),
            GatewayReply::AuthUrl(reply) => Json(reply).into_response(),
            GatewayReply::Authorized => Html(AUTHORIZED_PAGE).into_response(),
        }
    }
}

const AUTHORIZED_PAGE: &str = r#"<html>
  <body style="font-family: Arial; padding: 40px; text-align: center;">
    <h1>✅ Authorization Successful!</h1>
    <p>The refresh token has been written to the server log.</p>
    <p>Add it to your configuration, then restart the relay. You can close this window.</p>
  </body>
</html>"#;

/// Passerelle de commandes partagée par les handlers
#[derive(Clone)]
pub struct CommandGateway {
    ctx: Arc<AppContext>,
}

impl CommandGateway {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    pub fn ctx(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    /// Exécute une commande
    pub async fn execute(&self, command: GatewayCommand) -> Result<GatewayReply> {
        match command {
            GatewayCommand::GetAccessToken => self.access_token().await,
            GatewayCommand::RegisterDevice(device_id) => self.register_device(device_id),
            GatewayCommand::TransferPlayback { play } => self.transfer_playback(play).await,
            GatewayCommand::VerifyPassword(candidate) => Ok(self.verify_password(&candidate)),
            GatewayCommand::GetHealth => Ok(self.health().await),
            GatewayCommand::Ping => Ok(self.ping()),
            GatewayCommand::GetPlayback => self.playback().await,
            GatewayCommand::AuthorizeUrl => self.authorize_url(),
            GatewayCommand::CompleteAuthorization(code) => self.complete_authorization(&code).await,
        }
    }

    async fn valid_token(&self) -> Result<String> {
        self.ctx
            .tokens
            .ensure_valid_access_token()
            .await
            .map(|token| token.token)
            .map_err(RelayError::from_token_error)
    }

    async fn access_token(&self) -> Result<GatewayReply> {
        let token = self
            .ctx
            .tokens
            .ensure_valid_access_token()
            .await
            .map_err(RelayError::from_token_error)?;

        let expires_in = token.expires_in_secs(self.ctx.tokens.now());
        Ok(GatewayReply::Token(TokenReply {
            access_token: token.token,
            expires_in,
        }))
    }

    fn register_device(&self, device_id: String) -> Result<GatewayReply> {
        self.ctx.devices.register(device_id);
        Ok(GatewayReply::Success(SuccessReply { success: true }))
    }

    async fn transfer_playback(&self, play: bool) -> Result<GatewayReply> {
        // Vérifié avant tout appel au token endpoint ou au lecteur
        let device_id = self
            .ctx
            .devices
            .current()
            .ok_or(RelayError::DeviceNotRegistered)?;

        let token = self.valid_token().await?;

        self.ctx
            .upstream
            .transfer_playback(&token, &device_id, play)
            .await
            .map_err(|e| {
                warn!("Transfer error: {}", e);
                RelayError::from_upstream_error(e)
            })?;

        info!("▶️ Playback transferred to {}", device_id);
        Ok(GatewayReply::Success(SuccessReply { success: true }))
    }

    fn verify_password(&self, candidate: &str) -> GatewayReply {
        let valid = match &self.ctx.site_password {
            None => true,
            Some(password) => password == candidate,
        };
        GatewayReply::Password(PasswordReply { valid })
    }

    async fn health(&self) -> GatewayReply {
        let tokens = &self.ctx.tokens;
        GatewayReply::Health(HealthReply {
            status: "ok".to_string(),
            has_token: tokens.has_refresh_token().await,
            token_valid: tokens.is_access_token_valid().await,
            auth_state: tokens.state().await,
            viewers: self.ctx.hub.viewer_count(),
        })
    }

    fn ping(&self) -> GatewayReply {
        GatewayReply::Ping(PingReply {
            status: "alive".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime: self.ctx.started_at.elapsed().as_secs_f64(),
        })
    }

    async fn playback(&self) -> Result<GatewayReply> {
        let token = self.valid_token().await?;
        let snapshot = self
            .ctx
            .upstream
            .fetch_playback(&token)
            .await
            .map_err(RelayError::from_upstream_error)?;
        Ok(GatewayReply::Playback(snapshot))
    }

    fn authorize_url(&self) -> Result<GatewayReply> {
        let api = self.ctx.tokens.api();
        let url = api
            .authorize_url()
            .map_err(|e| RelayError::Configuration(e.to_string()))?;
        Ok(GatewayReply::AuthUrl(AuthUrlReply {
            url,
            redirect_uri: api.redirect_uri().to_string(),
        }))
    }

    async fn complete_authorization(&self, code: &str) -> Result<GatewayReply> {
        if code.is_empty() {
            return Err(RelayError::MissingAuthorizationCode(
                "no code in callback".to_string(),
            ));
        }

        self.ctx
            .tokens
            .exchange_authorization_code(code)
            .await
            .map_err(RelayError::from_token_error)?;
        Ok(GatewayReply::Authorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeUpstream, Scripted, authorized_tokens, context, playing, unauthorized_tokens};

    fn gateway(upstream: Arc<FakeUpstream>, password: Option<&str>) -> CommandGateway {
        CommandGateway::new(context(authorized_tokens(), upstream, password))
    }

    #[tokio::test]
    async fn test_transfer_requires_registered_device() {
        let upstream = FakeUpstream::scripted(vec![]);
        let gateway = CommandGateway::new(context(unauthorized_tokens(), upstream.clone(), None));

        let err = gateway
            .execute(GatewayCommand::TransferPlayback { play: false })
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::DeviceNotRegistered));
        assert_eq!(upstream.fetch_count(), 0);
        assert!(upstream.transfers.lock().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_uses_last_registered_device() {
        let upstream = FakeUpstream::scripted(vec![]);
        let gateway = gateway(upstream.clone(), None);

        gateway
            .execute(GatewayCommand::RegisterDevice("first".into()))
            .await
            .unwrap();
        gateway
            .execute(GatewayCommand::RegisterDevice("second".into()))
            .await
            .unwrap();
        let reply = gateway
            .execute(GatewayCommand::TransferPlayback { play: true })
            .await
            .unwrap();

        assert!(matches!(reply, GatewayReply::Success(SuccessReply { success: true })));
        assert_eq!(
            upstream.transfers.lock().as_slice(),
            &[("access".to_string(), "second".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn test_transfer_rejection_keeps_upstream_body() {
        let upstream = FakeUpstream::scripted(vec![]);
        upstream.reject_transfers(404, r#"{"error":{"status":404,"message":"Device not found"}}"#);
        let gateway = gateway(upstream, None);
        gateway
            .execute(GatewayCommand::RegisterDevice("gone".into()))
            .await
            .unwrap();

        match gateway
            .execute(GatewayCommand::TransferPlayback { play: false })
            .await
        {
            Err(RelayError::UpstreamRejected { status, body }) => {
                assert_eq!(status, 404);
                assert!(body.contains("Device not found"));
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_empty_device_id_replaces_previous() {
        let upstream = FakeUpstream::scripted(vec![]);
        let gateway = gateway(upstream.clone(), None);
        gateway
            .execute(GatewayCommand::RegisterDevice("a".into()))
            .await
            .unwrap();

        let reply = gateway
            .execute(GatewayCommand::RegisterDevice(String::new()))
            .await
            .unwrap();
        assert!(matches!(reply, GatewayReply::Success(SuccessReply { success: true })));
        assert!(gateway.ctx().devices.current().is_none());

        let err = gateway
            .execute(GatewayCommand::TransferPlayback { play: false })
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::DeviceNotRegistered));
        assert!(upstream.transfers.lock().is_empty());
    }

    #[tokio::test]
    async fn test_open_access_password() {
        let gateway = gateway(FakeUpstream::scripted(vec![]), None);
        for candidate in ["", "anything"] {
            let reply = gateway
                .execute(GatewayCommand::VerifyPassword(candidate.into()))
                .await
                .unwrap();
            assert!(matches!(reply, GatewayReply::Password(PasswordReply { valid: true })));
        }
    }

    #[tokio::test]
    async fn test_password_exact_match() {
        let gateway = gateway(FakeUpstream::scripted(vec![]), Some("secret"));

        let check = |candidate: &'static str| {
            let gateway = gateway.clone();
            async move {
                match gateway
                    .execute(GatewayCommand::VerifyPassword(candidate.into()))
                    .await
                    .unwrap()
                {
                    GatewayReply::Password(reply) => reply.valid,
                    _ => panic!("expected a password reply"),
                }
            }
        };

        assert!(check("secret").await);
        assert!(!check("Secret").await);
        assert!(!check("").await);
    }

    #[tokio::test]
    async fn test_access_token_reply() {
        let gateway = gateway(FakeUpstream::scripted(vec![]), None);
        match gateway.execute(GatewayCommand::GetAccessToken).await.unwrap() {
            GatewayReply::Token(reply) => {
                assert_eq!(reply.access_token, "access");
                assert!(reply.expires_in > 3500 && reply.expires_in <= 3600);
            }
            _ => panic!("expected a token reply"),
        }
    }

    #[tokio::test]
    async fn test_access_token_without_credential() {
        let upstream = FakeUpstream::scripted(vec![]);
        let gateway = CommandGateway::new(context(unauthorized_tokens(), upstream, None));
        let err = gateway
            .execute(GatewayCommand::GetAccessToken)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::CredentialUnavailable));
    }

    #[tokio::test]
    async fn test_health_has_no_side_effect() {
        let upstream = FakeUpstream::scripted(vec![]);
        let gateway = CommandGateway::new(context(unauthorized_tokens(), upstream.clone(), None));

        match gateway.execute(GatewayCommand::GetHealth).await.unwrap() {
            GatewayReply::Health(reply) => {
                assert_eq!(reply.status, "ok");
                assert!(!reply.has_token);
                assert!(!reply.token_valid);
                assert_eq!(reply.auth_state, AuthState::Unauthorized);
                assert_eq!(reply.viewers, 0);
            }
            _ => panic!("expected a health reply"),
        }
        assert_eq!(upstream.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_playback_on_demand() {
        let upstream = FakeUpstream::scripted(vec![Scripted::Playback(playing("A", 42))]);
        let gateway = gateway(upstream, None);

        match gateway.execute(GatewayCommand::GetPlayback).await.unwrap() {
            GatewayReply::Playback(snapshot) => assert_eq!(snapshot, playing("A", 42)),
            _ => panic!("expected a playback reply"),
        }
        // Script épuisé : rien ne joue
        match gateway.execute(GatewayCommand::GetPlayback).await.unwrap() {
            GatewayReply::Playback(snapshot) => assert!(snapshot.is_idle()),
            _ => panic!("expected a playback reply"),
        }
    }

    #[tokio::test]
    async fn test_authorize_url_reply() {
        let gateway = gateway(FakeUpstream::scripted(vec![]), None);
        match gateway.execute(GatewayCommand::AuthorizeUrl).await.unwrap() {
            GatewayReply::AuthUrl(reply) => {
                assert!(reply.url.contains("response_type=code"));
                assert!(reply.url.contains("client_id=id"));
                assert_eq!(reply.redirect_uri, "http://127.0.0.1:3001/callback");
            }
            _ => panic!("expected an authorization url"),
        }
    }

    #[tokio::test]
    async fn test_callback_without_code() {
        let gateway = gateway(FakeUpstream::scripted(vec![]), None);
        let err = gateway
            .execute(GatewayCommand::CompleteAuthorization(String::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::MissingAuthorizationCode(_)));
    }
}
