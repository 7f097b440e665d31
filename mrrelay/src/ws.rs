//! Canal WebSocket des viewers
//!
//! Une connexion = un viewer du [`FanoutHub`](crate::hub::FanoutHub). La tâche
//! d'écriture vide la file du viewer dans la socket ; la boucle de lecture
//! transmet chaque message texte au hub. Les frames binaires UTF-8 sont
//! traitées comme du texte. Un message illisible est journalisé, la connexion
//! reste ouverte.

use crate::gateway::CommandGateway;
use crate::hub::{FanoutHub, Frame, HubEvent};
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Upgrade HTTP → WebSocket
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(gateway): State<CommandGateway>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, gateway))
}

async fn handle_socket(socket: WebSocket, gateway: CommandGateway) {
    let hub = gateway.ctx().hub.clone();
    let id = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();

    if let Err(e) = hub.handle(HubEvent::Connect { id, sender: tx }) {
        warn!(viewer = %id, "Connection refused by hub: {}", e);
        return;
    }

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut writer => break,
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => forward(&hub, id, text.as_str().to_owned()),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => forward(&hub, id, text),
                    Err(_) => warn!(viewer = %id, "Non UTF-8 binary frame ignored ({} bytes)", bytes.len()),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(viewer = %id, "WebSocket error: {}", e);
                    break;
                }
            },
        }
    }

    let _ = hub.handle(HubEvent::Disconnect(id));
    writer.abort();
}

fn forward(hub: &FanoutHub, from: Uuid, text: String) {
    // Déjà journalisé par le hub ; la connexion continue
    if let Err(e) = hub.handle(HubEvent::PeerMessage { from, text }) {
        debug!(viewer = %from, "Peer message dropped: {}", e);
    }
}
