use mrconfig::Config;
use mrrelay::{AppContext, CommandGateway, RelayServerExt, StatePoller};
use mrserver::{LoggingOptions, ServerBuilder};
use mrspotify::{SpotifyConfigExt, TokenManager};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ========== PHASE 1 : Configuration et infrastructure ==========

    let config = Config::load_config("")?;

    let mut server = ServerBuilder::from_config(&config)?.build();
    server.init_logging(LoggingOptions::from_config(&config)).await;

    server
        .add_route("/info", || async {
            serde_json::json!({"name": "MultiRoom", "version": env!("CARGO_PKG_VERSION")})
        })
        .await;

    info!("📁 Configuration loaded from {}", config.dir());

    // ========== PHASE 2 : Spotify ==========

    let api = config.spotify_api()?;
    let tokens = Arc::new(TokenManager::new(
        api.clone(),
        config.get_spotify_refresh_token()?,
    ));

    if tokens.has_refresh_token().await {
        info!("🔑 Refresh token found, requesting an access token...");
        if let Err(e) = tokens.ensure_valid_access_token().await {
            warn!("⚠️ Initial token refresh failed: {}", e);
        }
    } else {
        warn!("⚠️ No refresh token found!");
        info!(
            "📝 Visit http://localhost:{}/auth/url to authorize",
            server.info().http_port
        );
    }

    // ========== PHASE 3 : Relais ==========

    let ctx = Arc::new(AppContext::new(
        tokens,
        Arc::new(api),
        config.get_site_password()?,
    ));

    server.init_relay(CommandGateway::new(ctx.clone())).await?;

    let interval = Duration::from_millis(config.get_poll_interval_ms()? as u64);
    let poller = Arc::new(StatePoller::new(ctx, interval)).spawn(server.shutdown_token());

    // ========== PHASE 4 : Démarrage du serveur ==========

    info!("🌐 Starting HTTP server...");
    server.start().await?;

    info!("🚀 MultiRoom relay is ready!");
    info!("Press Ctrl+C to stop...");
    server.wait().await;

    let _ = poller.await;
    info!("👋 MultiRoom relay stopped");

    Ok(())
}
