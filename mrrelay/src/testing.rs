//! Doublures partagées par les tests unitaires

use crate::context::AppContext;
use crate::upstream::PlayerUpstream;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use mrspotify::{Credential, PlaybackSnapshot, SpotifyApi, SpotifyError, TokenManager, TrackInfo};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Réponse scriptée du lecteur
pub enum Scripted {
    Playback(PlaybackSnapshot),
    Status(u16, &'static str),
}

#[derive(Default)]
pub struct FakeUpstream {
    script: Mutex<VecDeque<Scripted>>,
    transfer_status: Mutex<Option<(u16, &'static str)>>,
    pub fetches: AtomicUsize,
    pub transfers: Mutex<Vec<(String, String, bool)>>,
}

impl FakeUpstream {
    pub fn scripted(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        })
    }

    pub fn reject_transfers(&self, status: u16, body: &'static str) {
        *self.transfer_status.lock() = Some((status, body));
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlayerUpstream for FakeUpstream {
    async fn fetch_playback(&self, _access_token: &str) -> mrspotify::Result<PlaybackSnapshot> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().pop_front() {
            Some(Scripted::Playback(snapshot)) => Ok(snapshot),
            Some(Scripted::Status(code, body)) => Err(SpotifyError::from_status_code(code, body)),
            None => Ok(PlaybackSnapshot::idle()),
        }
    }

    async fn transfer_playback(
        &self,
        access_token: &str,
        device_id: &str,
        play: bool,
    ) -> mrspotify::Result<()> {
        self.transfers
            .lock()
            .push((access_token.to_string(), device_id.to_string(), play));
        match *self.transfer_status.lock() {
            Some((code, body)) => Err(SpotifyError::ApiError {
                code,
                message: body.to_string(),
            }),
            None => Ok(()),
        }
    }
}

fn offline_api() -> SpotifyApi {
    SpotifyApi::builder("id", "secret")
        // Port fermé : un refresh inattendu échoue immédiatement
        .accounts_url("http://127.0.0.1:9")
        .redirect_uri("http://127.0.0.1:3001/callback")
        .build()
        .unwrap()
}

/// Gestionnaire avec un access token valide une heure
pub fn authorized_tokens() -> Arc<TokenManager> {
    Arc::new(TokenManager::new(offline_api(), None).with_credential(Credential {
        access_token: Some("access".to_string()),
        refresh_token: Some("refresh".to_string()),
        expires_at: Utc::now() + Duration::hours(1),
    }))
}

/// Gestionnaire sans aucun token
pub fn unauthorized_tokens() -> Arc<TokenManager> {
    Arc::new(TokenManager::new(offline_api(), None))
}

pub fn context(
    tokens: Arc<TokenManager>,
    upstream: Arc<FakeUpstream>,
    site_password: Option<&str>,
) -> Arc<AppContext> {
    Arc::new(AppContext::new(
        tokens,
        upstream,
        site_password.map(str::to_string),
    ))
}

pub fn playing(track: &str, progress: u64) -> PlaybackSnapshot {
    PlaybackSnapshot {
        is_playing: true,
        progress_ms: progress,
        track: Some(TrackInfo {
            name: track.to_string(),
            artists: "Artist".to_string(),
            album: "Album".to_string(),
            image: None,
            uri: format!("spotify:track:{}", track),
            duration: 200000,
        }),
        device: None,
    }
}
