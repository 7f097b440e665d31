//! Accès au lecteur Spotify vu par le relais
//!
//! Le poller et la passerelle ne dépendent que de ce trait, ce qui permet de
//! les exercer sans réseau.

use async_trait::async_trait;
use mrspotify::{PlaybackSnapshot, SpotifyApi};

#[async_trait]
pub trait PlayerUpstream: Send + Sync {
    /// État courant du lecteur, [`PlaybackSnapshot::idle`] si rien ne joue
    async fn fetch_playback(&self, access_token: &str) -> mrspotify::Result<PlaybackSnapshot>;

    /// Rend `device_id` actif ; 200 et 204 sont des succès
    async fn transfer_playback(
        &self,
        access_token: &str,
        device_id: &str,
        play: bool,
    ) -> mrspotify::Result<()>;
}

#[async_trait]
impl PlayerUpstream for SpotifyApi {
    async fn fetch_playback(&self, access_token: &str) -> mrspotify::Result<PlaybackSnapshot> {
        self.current_playback(access_token).await
    }

    async fn transfer_playback(
        &self,
        access_token: &str,
        device_id: &str,
        play: bool,
    ) -> mrspotify::Result<()> {
        SpotifyApi::transfer_playback(self, access_token, device_id, play).await
    }
}
