//! Hub de diffusion vers les clients connectés
//!
//! Chaque client (viewer) est représenté par la file d'envoi de sa connexion
//! WebSocket. Le hub ne connaît rien d'autre du transport : une tâche
//! d'écriture par connexion vide la file dans l'ordre d'arrivée.
//!
//! Deux flux partagent ces files sans ordre relatif garanti :
//! - les snapshots `{"type":"playback","data":...}` issus du poller
//! - les messages `{"type":"sync",...}` relayés tels quels entre pairs

use crate::error::{RelayError, Result};
use mrspotify::PlaybackSnapshot;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identifiant d'une connexion
pub type ViewerId = Uuid;

/// Trame sérialisée, partagée entre toutes les files
pub type Frame = Arc<str>;

/// File d'envoi d'un viewer
pub type ViewerSender = mpsc::UnboundedSender<Frame>;

/// Trame émise par le serveur
#[derive(Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
enum ServerFrame<'a> {
    Playback(&'a PlaybackSnapshot),
}

/// En-tête minimal d'un message de pair
#[derive(Deserialize)]
struct PeerHeader {
    #[serde(rename = "type")]
    kind: String,
}

/// Événements reçus par le hub
#[derive(Debug)]
pub enum HubEvent {
    /// Nouvelle connexion ; reçoit immédiatement le dernier snapshot diffusé
    Connect { id: ViewerId, sender: ViewerSender },
    /// Diffusion d'un snapshot à tous les viewers ouverts
    Broadcast(PlaybackSnapshot),
    /// Message texte reçu d'un viewer
    PeerMessage { from: ViewerId, text: String },
    /// Fin de connexion
    Disconnect(ViewerId),
}

/// Résultat du traitement d'un [`HubEvent`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubOutcome {
    Connected { sent_snapshot: bool },
    Broadcast { delivered: usize },
    Relayed { delivered: usize },
    /// Message valide mais sans objet pour le hub (type autre que `sync`)
    Ignored,
    Disconnected,
}

/// Hub de diffusion
#[derive(Default)]
pub struct FanoutHub {
    viewers: RwLock<HashMap<ViewerId, ViewerSender>>,
    /// Dernière trame `playback` diffusée ; son verrou ordonne connexions et diffusions
    current: Mutex<Option<Frame>>,
}

impl FanoutHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point d'entrée unique du hub
    pub fn handle(&self, event: HubEvent) -> Result<HubOutcome> {
        match event {
            HubEvent::Connect { id, sender } => Ok(self.on_connect(id, sender)),
            HubEvent::Broadcast(snapshot) => self.broadcast(&snapshot),
            HubEvent::PeerMessage { from, text } => self.on_peer_message(from, &text),
            HubEvent::Disconnect(id) => Ok(self.on_disconnect(id)),
        }
    }

    /// Nombre de viewers enregistrés
    pub fn viewer_count(&self) -> usize {
        self.viewers.read().len()
    }

    /// Dernière trame diffusée, si un snapshot existe
    pub fn current_frame(&self) -> Option<Frame> {
        self.current.lock().clone()
    }

    fn on_connect(&self, id: ViewerId, sender: ViewerSender) -> HubOutcome {
        let current = self.current.lock();

        let sent_snapshot = match current.as_ref() {
            Some(frame) => sender.send(frame.clone()).is_ok(),
            None => false,
        };
        self.viewers.write().insert(id, sender);

        info!(viewer = %id, viewers = self.viewer_count(), "Client connected");
        HubOutcome::Connected { sent_snapshot }
    }

    fn broadcast(&self, snapshot: &PlaybackSnapshot) -> Result<HubOutcome> {
        let frame: Frame = serde_json::to_string(&ServerFrame::Playback(snapshot))
            .map_err(|e| RelayError::InvalidRequest(format!("unserializable snapshot: {}", e)))?
            .into();

        let mut current = self.current.lock();
        *current = Some(frame.clone());

        let delivered = self.send_to_all(&frame, None);
        debug!(delivered, "Playback broadcast");
        Ok(HubOutcome::Broadcast { delivered })
    }

    fn on_peer_message(&self, from: ViewerId, text: &str) -> Result<HubOutcome> {
        let header: PeerHeader = serde_json::from_str(text).map_err(|e| {
            warn!(viewer = %from, "WebSocket message error: {}", e);
            RelayError::MalformedPeerMessage(e.to_string())
        })?;

        if header.kind != "sync" {
            debug!(viewer = %from, kind = %header.kind, "Ignoring peer message");
            return Ok(HubOutcome::Ignored);
        }

        let frame: Frame = Arc::from(text);
        let delivered = self.send_to_all(&frame, Some(from));
        debug!(viewer = %from, delivered, "Sync relayed");
        Ok(HubOutcome::Relayed { delivered })
    }

    fn on_disconnect(&self, id: ViewerId) -> HubOutcome {
        if self.viewers.write().remove(&id).is_some() {
            info!(viewer = %id, viewers = self.viewer_count(), "Client disconnected");
        }
        HubOutcome::Disconnected
    }

    /// Envoie une trame à chaque viewer ouvert, sauf `except`
    ///
    /// Itère sur une copie de l'ensemble : une déconnexion concurrente ne
    /// perturbe pas la diffusion.
    fn send_to_all(&self, frame: &Frame, except: Option<ViewerId>) -> usize {
        let targets: Vec<(ViewerId, ViewerSender)> = self
            .viewers
            .read()
            .iter()
            .filter(|(id, _)| Some(**id) != except)
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        targets
            .into_iter()
            .filter(|(_, tx)| !tx.is_closed())
            .filter(|(id, tx)| match tx.send(frame.clone()) {
                Ok(()) => true,
                Err(_) => {
                    debug!(viewer = %id, "Skipping closed viewer");
                    false
                }
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrspotify::TrackInfo;
    use serde_json::{Value, json};

    fn snapshot(progress: u64) -> PlaybackSnapshot {
        PlaybackSnapshot {
            is_playing: true,
            progress_ms: progress,
            track: Some(TrackInfo {
                name: "A".to_string(),
                artists: "Artist".to_string(),
                album: "Album".to_string(),
                image: None,
                uri: "spotify:track:A".to_string(),
                duration: 200000,
            }),
            device: None,
        }
    }

    fn connect(hub: &FanoutHub) -> (ViewerId, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        hub.handle(HubEvent::Connect { id, sender: tx }).unwrap();
        (id, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Frame>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(serde_json::from_str(&frame).unwrap());
        }
        frames
    }

    #[test]
    fn test_broadcast_frame_shape() {
        let hub = FanoutHub::new();
        let (_, mut rx) = connect(&hub);

        let outcome = hub.handle(HubEvent::Broadcast(snapshot(1000))).unwrap();
        assert_eq!(outcome, HubOutcome::Broadcast { delivered: 1 });

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "playback");
        assert_eq!(frames[0]["data"]["isPlaying"], true);
        assert_eq!(frames[0]["data"]["progress"], 1000);
    }

    #[test]
    fn test_late_joiner_receives_current_snapshot() {
        let hub = FanoutHub::new();

        // Pas encore de snapshot : rien n'est envoyé
        let (_, mut early) = connect(&hub);
        assert!(drain(&mut early).is_empty());

        hub.handle(HubEvent::Broadcast(snapshot(1000))).unwrap();

        let (tx, mut late) = mpsc::unbounded_channel();
        let outcome = hub
            .handle(HubEvent::Connect {
                id: Uuid::new_v4(),
                sender: tx,
            })
            .unwrap();
        assert_eq!(outcome, HubOutcome::Connected { sent_snapshot: true });

        let frames = drain(&mut late);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["data"]["progress"], 1000);
        // L'ancien viewer n'a reçu que la diffusion
        assert_eq!(drain(&mut early).len(), 1);
    }

    #[test]
    fn test_sync_is_relayed_to_others_only() {
        let hub = FanoutHub::new();
        let (a, mut rx_a) = connect(&hub);
        let (_, mut rx_b) = connect(&hub);
        let (_, mut rx_c) = connect(&hub);

        let text = r#"{"type":"sync","data":{"trackUri":"spotify:track:A","positionMs":1234,"isPlaying":true}}"#;
        let outcome = hub
            .handle(HubEvent::PeerMessage {
                from: a,
                text: text.to_string(),
            })
            .unwrap();
        assert_eq!(outcome, HubOutcome::Relayed { delivered: 2 });

        assert!(drain(&mut rx_a).is_empty());
        for rx in [&mut rx_b, &mut rx_c] {
            let frame = rx.try_recv().unwrap();
            // Relayé octet pour octet
            assert_eq!(&*frame, text);
        }
    }

    #[test]
    fn test_malformed_peer_message_is_reported() {
        let hub = FanoutHub::new();
        let (a, _rx_a) = connect(&hub);
        let (_, mut rx_b) = connect(&hub);

        for text in ["not json", "{\"data\":1}", "[1,2]"] {
            let result = hub.handle(HubEvent::PeerMessage {
                from: a,
                text: text.to_string(),
            });
            assert!(matches!(result, Err(RelayError::MalformedPeerMessage(_))));
        }
        assert!(drain(&mut rx_b).is_empty());

        // Le viewer reste enregistré et peut toujours relayer
        assert_eq!(hub.viewer_count(), 2);
        let outcome = hub
            .handle(HubEvent::PeerMessage {
                from: a,
                text: json!({"type": "sync", "data": {}}).to_string(),
            })
            .unwrap();
        assert_eq!(outcome, HubOutcome::Relayed { delivered: 1 });
    }

    #[test]
    fn test_non_sync_messages_are_ignored() {
        let hub = FanoutHub::new();
        let (a, _rx_a) = connect(&hub);
        let (_, mut rx_b) = connect(&hub);

        let outcome = hub
            .handle(HubEvent::PeerMessage {
                from: a,
                text: json!({"type": "playback_update", "data": {}}).to_string(),
            })
            .unwrap();
        assert_eq!(outcome, HubOutcome::Ignored);
        assert!(drain(&mut rx_b).is_empty());
    }

    #[test]
    fn test_closed_viewers_are_skipped() {
        let hub = FanoutHub::new();
        let (_, rx_a) = connect(&hub);
        let (_, mut rx_b) = connect(&hub);
        drop(rx_a);

        let outcome = hub.handle(HubEvent::Broadcast(snapshot(1))).unwrap();
        assert_eq!(outcome, HubOutcome::Broadcast { delivered: 1 });
        assert_eq!(drain(&mut rx_b).len(), 1);
    }

    #[test]
    fn test_disconnect_removes_viewer() {
        let hub = FanoutHub::new();
        let (a, _rx_a) = connect(&hub);
        let (_, _rx_b) = connect(&hub);
        assert_eq!(hub.viewer_count(), 2);

        assert_eq!(
            hub.handle(HubEvent::Disconnect(a)).unwrap(),
            HubOutcome::Disconnected
        );
        assert_eq!(hub.viewer_count(), 1);

        let outcome = hub.handle(HubEvent::Broadcast(snapshot(1))).unwrap();
        assert_eq!(outcome, HubOutcome::Broadcast { delivered: 1 });
    }

    #[test]
    fn test_broadcasts_keep_order() {
        let hub = FanoutHub::new();
        let (_, mut rx) = connect(&hub);

        for progress in [1, 2, 3] {
            hub.handle(HubEvent::Broadcast(snapshot(progress))).unwrap();
        }

        let progress: Vec<_> = drain(&mut rx)
            .into_iter()
            .map(|f| f["data"]["progress"].as_u64().unwrap())
            .collect();
        assert_eq!(progress, vec![1, 2, 3]);
    }
}
