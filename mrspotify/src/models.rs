//! Modèles de données pour l'état de lecture Spotify
//!
//! Deux familles de types :
//! - les types `Raw*`, calqués sur la réponse de `GET /me/player`
//! - [`PlaybackSnapshot`] et [`TrackInfo`], la forme diffusée aux clients

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Appareil de lecture tel que décrit par Spotify
///
/// Les champs inconnus sont conservés dans `extra` et renvoyés tels quels aux
/// clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub device_type: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub volume_percent: Option<u8>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Morceau en cours, forme exposée aux clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TrackInfo {
    pub name: String,
    /// Artistes séparés par ", "
    pub artists: String,
    pub album: String,
    /// URL de la pochette (la plus grande)
    #[serde(alias = "imageUrl")]
    pub image: Option<String>,
    pub uri: String,
    /// Durée en millisecondes
    #[serde(alias = "durationMs")]
    pub duration: u64,
}

/// État de lecture complet, remplacé en bloc à chaque changement
///
/// L'égalité porte sur tous les champs : deux snapshots ne différant que par
/// la progression sont différents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub is_playing: bool,
    /// Position en millisecondes
    #[serde(rename = "progress", alias = "progressMs", default)]
    pub progress_ms: u64,
    #[serde(default)]
    pub track: Option<TrackInfo>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub device: Option<Device>,
}

impl PlaybackSnapshot {
    /// Snapshot "rien en cours" (réponse 204 de Spotify)
    pub fn idle() -> Self {
        Self {
            is_playing: false,
            progress_ms: 0,
            track: None,
            device: None,
        }
    }

    /// Vrai si aucun morceau n'est chargé
    pub fn is_idle(&self) -> bool {
        self.track.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawImage {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAlbum {
    pub name: String,
    #[serde(default)]
    pub images: Vec<RawImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawArtist {
    pub name: String,
}

/// `item` de la réponse lecteur (piste ou épisode)
#[derive(Debug, Clone, Deserialize)]
pub struct RawItem {
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub artists: Vec<RawArtist>,
    #[serde(default)]
    pub album: Option<RawAlbum>,
}

/// Réponse brute de `GET /me/player`
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlayback {
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub item: Option<RawItem>,
    #[serde(default)]
    pub device: Option<Device>,
}

impl From<RawItem> for TrackInfo {
    fn from(item: RawItem) -> Self {
        let artists = item
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let (album, image) = match item.album {
            Some(album) => {
                let image = album.images.into_iter().next().map(|i| i.url);
                (album.name, image)
            }
            None => (String::new(), None),
        };

        Self {
            name: item.name,
            artists,
            album,
            image,
            uri: item.uri,
            duration: item.duration_ms,
        }
    }
}

impl From<RawPlayback> for PlaybackSnapshot {
    fn from(raw: RawPlayback) -> Self {
        Self {
            is_playing: raw.is_playing,
            progress_ms: raw.progress_ms.unwrap_or(0),
            track: raw.item.map(TrackInfo::from),
            device: raw.device,
        }
    }
}
