//! Gateway client entry point
//!
//! Run with:
//! ```bash
//! cargo run -p gateway-client
//! ```
//!
//! Configuration is loaded from environment variables.

use gateway_client::{
    gateway_endpoint, CloseReason, Credentials, GatewayEvent, GatewaySession, Presence,
    RestClient, SessionConfig,
};
use gateway_common::{try_init_tracing_with_config, AppConfig, AppError, AppResult, TracingConfig};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(AppError::from(e).exit_code());
        }
    };

    // Initialize tracing
    if let Err(e) = try_init_tracing_with_config(&TracingConfig::from_settings(&config.app)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(config).await {
        error!(error = %e, code = e.error_code(), "Gateway client stopped");
        std::process::exit(e.exit_code());
    }
}

async fn run(config: AppConfig) -> AppResult<()> {
    info!(
        name = %config.app.name,
        env = ?config.app.env,
        "Starting gateway client..."
    );

    let rest = RestClient::new(&config.api).map_err(AppError::http)?;

    let base_url = match &config.gateway.url {
        Some(url) => url.clone(),
        None => rest.gateway_url().await.map_err(AppError::http)?,
    };
    let endpoint = gateway_endpoint(&base_url, config.gateway.version, &config.gateway.encoding)
        .map_err(AppError::http)?;

    match rest.current_user().await {
        Ok(user) => info!(user = %user.display_name(), id = %user.id, "Authenticated"),
        Err(e) if e.is_unauthorized() => return Err(AppError::http(e)),
        Err(e) => warn!(error = %e, "Could not fetch current user"),
    }

    let mut session = GatewaySession::builder()
        .config(SessionConfig::from(&config.gateway))
        .presence(Presence::from(&config.presence))
        .connect(&endpoint, Credentials::new(config.api.token.clone()))
        .await
        .map_err(AppError::gateway)?;

    let Some(mut events) = session.events() else {
        return Err(AppError::internal(anyhow::anyhow!("event stream already taken")));
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };
                match &event.event {
                    GatewayEvent::Ready(ready) => info!(
                        session_id = %ready.session_id,
                        guilds = ready.guilds.len(),
                        "Session ready"
                    ),
                    GatewayEvent::MessageCreate(message) => info!(
                        seq = event.sequence,
                        channel = ?message.channel_id,
                        content = %message.content,
                        "Message received"
                    ),
                    other => info!(seq = event.sequence, event = other.name(), "Event received"),
                }
            }
        }
    }

    if let Some(identity) = session.close().await {
        info!(
            session_id = %identity.session_id,
            seq = identity.last_sequence,
            "Session closed, resumable"
        );
    }

    match events.close_reason() {
        Some(CloseReason::Fatal(e)) => Err(AppError::gateway(e)),
        _ => Ok(()),
    }
}
