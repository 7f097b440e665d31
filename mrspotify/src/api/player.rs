//! Endpoints du lecteur (`/me/player`)

use super::SpotifyApi;
use crate::error::{Result, SpotifyError};
use crate::models::{PlaybackSnapshot, RawPlayback};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct TransferRequest<'a> {
    device_ids: [&'a str; 1],
    play: bool,
}

impl SpotifyApi {
    /// Récupère l'état brut du lecteur
    ///
    /// Retourne `None` quand Spotify répond 204 (aucune session active).
    pub async fn get_playback(&self, access_token: &str) -> Result<Option<RawPlayback>> {
        let response = self
            .client
            .get(self.api_endpoint("/me/player"))
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            debug!("No active playback session");
            return Ok(None);
        }

        self.handle_response(response).await.map(Some)
    }

    /// Récupère l'état du lecteur sous forme de snapshot
    ///
    /// "Rien en cours" n'est pas une erreur : c'est [`PlaybackSnapshot::idle`].
    pub async fn current_playback(&self, access_token: &str) -> Result<PlaybackSnapshot> {
        Ok(self
            .get_playback(access_token)
            .await?
            .map(PlaybackSnapshot::from)
            .unwrap_or_else(PlaybackSnapshot::idle))
    }

    /// Transfère la lecture vers un appareil
    ///
    /// 200 et 204 sont des succès. Tout autre statut est remonté tel quel
    /// avec le corps de la réponse dans [`SpotifyError::ApiError`].
    pub async fn transfer_playback(&self, access_token: &str, device_id: &str, play: bool) -> Result<()> {
        let response = self
            .client
            .put(self.api_endpoint("/me/player"))
            .bearer_auth(access_token)
            .json(&TransferRequest {
                device_ids: [device_id],
                play,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!("Playback transferred to {}", device_id);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!("Transfer to {} rejected ({}): {}", device_id, status.as_u16(), body);
        Err(SpotifyError::ApiError {
            code: status.as_u16(),
            message: body,
        })
    }
}
