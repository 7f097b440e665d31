//! Contexte partagé du relais
//!
//! Tout l'état mutable du processus vit ici et est passé explicitement aux
//! composants : credential (via le [`TokenManager`]), appareil enregistré,
//! ensemble des viewers et dernier snapshot (via le [`FanoutHub`]).

use crate::hub::FanoutHub;
use crate::upstream::PlayerUpstream;
use mrspotify::TokenManager;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Identifiant de l'appareil de lecture actif (dernier enregistré gagne)
///
/// Un identifiant vide remplace le précédent et laisse le registre sans
/// appareil.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    device_id: RwLock<Option<String>>,
}

impl DeviceRegistry {
    pub fn register(&self, device_id: impl Into<String>) {
        let device_id = device_id.into();
        if device_id.is_empty() {
            warn!("⚠️ Empty device id registered, no active device");
            *self.device_id.write() = None;
            return;
        }

        info!("✅ Device registered: {}", device_id);
        *self.device_id.write() = Some(device_id);
    }

    pub fn current(&self) -> Option<String> {
        self.device_id.read().clone()
    }
}

/// Contexte applicatif
pub struct AppContext {
    pub tokens: Arc<TokenManager>,
    pub upstream: Arc<dyn PlayerUpstream>,
    pub hub: Arc<FanoutHub>,
    pub devices: DeviceRegistry,
    /// `None` : accès libre
    pub site_password: Option<String>,
    pub started_at: Instant,
}

impl AppContext {
    pub fn new(
        tokens: Arc<TokenManager>,
        upstream: Arc<dyn PlayerUpstream>,
        site_password: Option<String>,
    ) -> Self {
        Self {
            tokens,
            upstream,
            hub: Arc::new(FanoutHub::new()),
            devices: DeviceRegistry::default(),
            site_password,
            started_at: Instant::now(),
        }
    }
}
