//! # mrspotify - Client Spotify du relais MultiRoom
//!
//! Cette crate regroupe tout ce qui parle à Spotify :
//! - Autorisation OAuth (URL de consentement, échange de code, refresh)
//! - Lecture de l'état du lecteur et transfert vers un appareil
//! - Gestion du cycle de vie des tokens ([`TokenManager`])
//! - Conversion des réponses brutes en [`PlaybackSnapshot`]
//!
//! ## Structure des modules
//!
//! ```text
//! mrspotify/
//! ├── src/
//! │   ├── lib.rs              # Module principal (ce fichier)
//! │   ├── api/
//! │   │   ├── mod.rs          # Client HTTP bas-niveau + builder
//! │   │   ├── auth.rs         # Endpoints OAuth
//! │   │   └── player.rs       # Endpoints /me/player
//! │   ├── token.rs            # Gestionnaire de tokens
//! │   ├── models.rs           # Snapshot de lecture et types bruts
//! │   ├── config_ext.rs       # Extension de mrconfig::Config
//! │   └── error.rs            # Gestion des erreurs
//! ```
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use mrconfig::Config;
//! use mrspotify::{SpotifyConfigExt, TokenManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_config("")?;
//!     let api = config.spotify_api()?;
//!     let tokens = TokenManager::new(api.clone(), config.get_spotify_refresh_token()?);
//!
//!     let token = tokens.ensure_valid_access_token().await?;
//!     let snapshot = api.current_playback(&token.token).await?;
//!     println!("Playing: {}", snapshot.is_playing);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config_ext;
pub mod error;
pub mod models;
pub mod token;

pub use api::{SpotifyApi, SpotifyApiBuilder, auth::TokenResponse};
pub use config_ext::SpotifyConfigExt;
pub use error::{Result, SpotifyError};
pub use models::{Device, PlaybackSnapshot, TrackInfo};
pub use token::{AccessToken, AuthState, Clock, Credential, ManualClock, SystemClock, TokenManager};
