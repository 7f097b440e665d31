//! Viewer WebSocket tests over a real socket

use futures::{SinkExt, StreamExt};
use mrrelay::{AppContext, CommandGateway, RelayServerExt};
use mrserver::{Server, ServerBuilder};
use mrspotify::{SpotifyApi, TokenManager};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SYNC: &str = r#"{"type":"sync","position":1234}"#;

fn context() -> Arc<AppContext> {
    let api = SpotifyApi::builder("id", "secret")
        .accounts_url("http://127.0.0.1:9")
        .redirect_uri("http://127.0.0.1:3001/callback")
        .build()
        .unwrap();
    let tokens = Arc::new(TokenManager::new(api.clone(), None));
    Arc::new(AppContext::new(tokens, Arc::new(api), None))
}

async fn start(ctx: Arc<AppContext>) -> (Server, u16) {
    let mut server = ServerBuilder::new("Test", 0).build();
    server.init_relay(CommandGateway::new(ctx)).await.unwrap();
    server.start().await.unwrap();
    let addr: SocketAddr = server.info().local_addr.unwrap().parse().unwrap();
    (server, addr.port())
}

async fn connect(port: u16, path: &str) -> Client {
    let (client, _) = connect_async(format!("ws://127.0.0.1:{}{}", port, path))
        .await
        .unwrap();
    client
}

/// Attend que le hub ait enregistré `n` viewers
async fn wait_for_viewers(ctx: &AppContext, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while ctx.hub.viewer_count() != n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

async fn next_text(client: &mut Client) -> String {
    let message = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    message.to_text().unwrap().to_string()
}

#[tokio::test]
async fn test_sync_is_relayed_after_malformed_message() {
    let ctx = context();
    let (server, port) = start(ctx.clone()).await;

    let mut sender = connect(port, "/ws").await;
    let mut receiver = connect(port, "/").await;
    wait_for_viewers(&ctx, 2).await;

    sender.send(Message::text("not json")).await.unwrap();
    sender.send(Message::text(SYNC)).await.unwrap();

    assert_eq!(next_text(&mut receiver).await, SYNC);
    assert_eq!(ctx.hub.viewer_count(), 2);

    server.shutdown_token().cancel();
}

#[tokio::test]
async fn test_binary_sync_is_relayed_as_text() {
    let ctx = context();
    let (server, port) = start(ctx.clone()).await;

    let mut sender = connect(port, "/ws").await;
    let mut receiver = connect(port, "/ws").await;
    wait_for_viewers(&ctx, 2).await;

    sender.send(Message::binary(vec![0xff, 0xfe])).await.unwrap();
    sender.send(Message::binary(SYNC.as_bytes().to_vec())).await.unwrap();

    let message = tokio::time::timeout(Duration::from_secs(5), receiver.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(message.is_text());
    assert_eq!(message.to_text().unwrap(), SYNC);

    server.shutdown_token().cancel();
}

#[tokio::test]
async fn test_closed_client_is_unregistered() {
    let ctx = context();
    let (server, port) = start(ctx.clone()).await;

    let mut client = connect(port, "/ws").await;
    wait_for_viewers(&ctx, 1).await;

    client.close(None).await.unwrap();
    wait_for_viewers(&ctx, 0).await;

    server.shutdown_token().cancel();
}
