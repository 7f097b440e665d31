//! Routes HTTP du relais
//!
//! Les chemins sont ceux qu'attendent les clients web existants :
//!
//! | Méthode | Chemin | Commande |
//! |---|---|---|
//! | GET | `/api/token` | access token pour le SDK de lecture |
//! | POST | `/api/register-device` | enregistre l'appareil local |
//! | POST | `/api/transfer-playback` | active l'appareil enregistré |
//! | POST | `/api/verify` | vérifie le mot de passe du site |
//! | GET | `/api/health` | état de l'authentification |
//! | GET | `/api/ping` | keep-alive |
//! | GET | `/api/playback` | état du lecteur à la demande |
//! | GET | `/auth/url` | URL de consentement Spotify |
//! | GET | `/callback` | retour OAuth |
//! | GET | `/`, `/ws` | WebSocket des viewers |

use crate::error::RelayError;
use crate::gateway::{
    AuthUrlReply, CommandGateway, GatewayCommand, HealthReply, PasswordReply, PingReply,
    SuccessReply, TokenReply,
};
use crate::ws::ws_handler;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use mrspotify::{PlaybackSnapshot, TrackInfo};
use serde::Deserialize;
use utoipa::{IntoParams, OpenApi, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceRequest {
    #[serde(default)]
    pub device_id: String,
}

/// Corps optionnel de `/api/transfer-playback`
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TransferRequest {
    #[serde(default)]
    pub play: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

async fn run(gateway: &CommandGateway, command: GatewayCommand) -> Response {
    match gateway.execute(command).await {
        Ok(reply) => reply.into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/token",
    responses(
        (status = 200, description = "Valid access token", body = TokenReply),
        (status = 401, description = "No usable Spotify credential")
    ),
    tag = "relay"
)]
pub async fn get_token(State(gateway): State<CommandGateway>) -> Response {
    run(&gateway, GatewayCommand::GetAccessToken).await
}

#[utoipa::path(
    post,
    path = "/api/register-device",
    request_body = RegisterDeviceRequest,
    responses(
        (status = 200, description = "Device registered, an empty id clears it", body = SuccessReply)
    ),
    tag = "relay"
)]
pub async fn register_device(
    State(gateway): State<CommandGateway>,
    Json(request): Json<RegisterDeviceRequest>,
) -> Response {
    run(&gateway, GatewayCommand::RegisterDevice(request.device_id)).await
}

#[utoipa::path(
    post,
    path = "/api/transfer-playback",
    request_body(content = TransferRequest, description = "Optional, play defaults to false"),
    responses(
        (status = 200, description = "Playback transferred", body = SuccessReply),
        (status = 400, description = "Device not registered"),
        (status = 401, description = "No usable Spotify credential")
    ),
    tag = "relay"
)]
pub async fn transfer_playback(State(gateway): State<CommandGateway>, body: Bytes) -> Response {
    let request = if body.is_empty() {
        TransferRequest::default()
    } else {
        match serde_json::from_slice::<TransferRequest>(&body) {
            Ok(request) => request,
            Err(e) => return RelayError::InvalidRequest(e.to_string()).into_response(),
        }
    };

    run(&gateway, GatewayCommand::TransferPlayback { play: request.play }).await
}

#[utoipa::path(
    post,
    path = "/api/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Password check result", body = PasswordReply)
    ),
    tag = "relay"
)]
pub async fn verify_password(
    State(gateway): State<CommandGateway>,
    Json(request): Json<VerifyRequest>,
) -> Response {
    run(&gateway, GatewayCommand::VerifyPassword(request.password)).await
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Relay health", body = HealthReply)
    ),
    tag = "relay"
)]
pub async fn health(State(gateway): State<CommandGateway>) -> Response {
    run(&gateway, GatewayCommand::GetHealth).await
}

#[utoipa::path(
    get,
    path = "/api/ping",
    responses(
        (status = 200, description = "Keep-alive", body = PingReply)
    ),
    tag = "relay"
)]
pub async fn ping(State(gateway): State<CommandGateway>) -> Response {
    run(&gateway, GatewayCommand::Ping).await
}

#[utoipa::path(
    get,
    path = "/api/playback",
    responses(
        (status = 200, description = "Current playback, idle when nothing plays", body = PlaybackSnapshot),
        (status = 401, description = "No usable Spotify credential")
    ),
    tag = "relay"
)]
pub async fn playback(State(gateway): State<CommandGateway>) -> Response {
    run(&gateway, GatewayCommand::GetPlayback).await
}

#[utoipa::path(
    get,
    path = "/auth/url",
    responses(
        (status = 200, description = "Spotify consent URL", body = AuthUrlReply)
    ),
    tag = "auth"
)]
pub async fn auth_url(State(gateway): State<CommandGateway>) -> Response {
    run(&gateway, GatewayCommand::AuthorizeUrl).await
}

#[utoipa::path(
    get,
    path = "/callback",
    params(CallbackQuery),
    responses(
        (status = 200, description = "Authorization completed, refresh token logged"),
        (status = 400, description = "Authorization denied or code missing"),
        (status = 401, description = "Code rejected by Spotify")
    ),
    tag = "auth"
)]
pub async fn callback(
    State(gateway): State<CommandGateway>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(error) = query.error {
        return RelayError::MissingAuthorizationCode(error).into_response();
    }

    run(
        &gateway,
        GatewayCommand::CompleteAuthorization(query.code.unwrap_or_default()),
    )
    .await
}

/// Router complet du relais (REST + WebSocket)
pub fn create_relay_router(gateway: CommandGateway) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/api/token", get(get_token))
        .route("/api/register-device", post(register_device))
        .route("/api/transfer-playback", post(transfer_playback))
        .route("/api/verify", post(verify_password))
        .route("/api/health", get(health))
        .route("/api/ping", get(ping))
        .route("/api/playback", get(playback))
        .route("/auth/url", get(auth_url))
        .route("/callback", get(callback))
        .with_state(gateway)
}

/// Documentation OpenAPI du relais
#[derive(OpenApi)]
#[openapi(
    paths(
        get_token,
        register_device,
        transfer_playback,
        verify_password,
        health,
        ping,
        playback,
        auth_url,
        callback,
    ),
    components(
        schemas(
            RegisterDeviceRequest,
            TransferRequest,
            VerifyRequest,
            TokenReply,
            SuccessReply,
            PasswordReply,
            HealthReply,
            PingReply,
            AuthUrlReply,
            PlaybackSnapshot,
            TrackInfo,
        )
    ),
    tags(
        (name = "relay", description = "Multi-room playback relay"),
        (name = "auth", description = "Spotify authorization flow")
    ),
    info(
        title = "MultiRoom Relay API",
        version = "0.1.0",
        description = "Token hand-out, device registration and playback transfer for the multi-room web player"
    )
)]
pub struct RelayApiDoc;
