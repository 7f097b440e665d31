//! Surveillance périodique de l'état du lecteur
//!
//! À chaque tick : access token valide, lecture de `/me/player`, comparaison
//! structurelle avec le dernier snapshot diffusé, diffusion seulement s'il a
//! changé. Les échecs sont journalisés et ignorés ; le tick suivant repart de
//! zéro.
//!
//! Les ticks sont lancés dans des tâches séparées : un appel lent ne retarde
//! pas les suivants. Chaque tick porte un numéro d'ordre et un résultat plus
//! ancien que le dernier appliqué est abandonné.

use crate::context::AppContext;
use crate::error::RelayError;
use crate::hub::HubEvent;
use mrspotify::PlaybackSnapshot;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Résultat d'un tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nouveau snapshot diffusé
    Broadcast,
    /// Identique au dernier diffusé
    Unchanged,
    /// Un tick plus récent a déjà été appliqué
    Stale,
    /// Token ou lecture en échec, état précédent conservé
    Failed,
}

#[derive(Default)]
struct LastBroadcast {
    seq: u64,
    snapshot: Option<PlaybackSnapshot>,
}

/// Poller de l'état de lecture
pub struct StatePoller {
    ctx: Arc<AppContext>,
    interval: Duration,
    next_seq: AtomicU64,
    last: Mutex<LastBroadcast>,
}

impl StatePoller {
    pub fn new(ctx: Arc<AppContext>, interval: Duration) -> Self {
        Self {
            ctx,
            interval,
            next_seq: AtomicU64::new(1),
            last: Mutex::new(LastBroadcast::default()),
        }
    }

    /// Dernier snapshot diffusé
    pub fn last_snapshot(&self) -> Option<PlaybackSnapshot> {
        self.last.lock().snapshot.clone()
    }

    /// Exécute un tick complet
    pub async fn tick(&self) -> TickOutcome {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);

        let snapshot = match self.fetch().await {
            Ok(snapshot) => snapshot,
            Err(RelayError::CredentialUnavailable) => {
                debug!("No refresh token available, waiting for authorization");
                return TickOutcome::Failed;
            }
            Err(e) => {
                warn!("Playback fetch error: {}", e);
                return TickOutcome::Failed;
            }
        };

        // Comparaison, remplacement et diffusion sous le même verrou
        let mut last = self.last.lock();
        if seq < last.seq {
            debug!(seq, latest = last.seq, "Dropping out-of-order poll result");
            return TickOutcome::Stale;
        }
        last.seq = seq;

        if last.snapshot.as_ref() == Some(&snapshot) {
            return TickOutcome::Unchanged;
        }

        match self.ctx.hub.handle(HubEvent::Broadcast(snapshot.clone())) {
            Ok(_) => {
                last.snapshot = Some(snapshot);
                TickOutcome::Broadcast
            }
            Err(e) => {
                warn!("Broadcast failed: {}", e);
                TickOutcome::Failed
            }
        }
    }

    async fn fetch(&self) -> Result<PlaybackSnapshot, RelayError> {
        let token = self
            .ctx
            .tokens
            .ensure_valid_access_token()
            .await
            .map_err(RelayError::from_token_error)?;

        self.ctx
            .upstream
            .fetch_playback(&token.token)
            .await
            .map_err(RelayError::from_upstream_error)
    }

    /// Boucle de polling jusqu'à annulation
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        if self.interval.is_zero() {
            error!("Poll interval must be greater than 0, playback polling disabled");
            return;
        }

        info!("Polling playback every {:?}", self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let poller = self.clone();
                    tokio::spawn(async move {
                        poller.tick().await;
                    });
                }
            }
        }

        info!("Playback polling stopped");
    }

    /// Lance la boucle dans une tâche de fond
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
