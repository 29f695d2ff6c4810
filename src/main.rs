use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imgbot_webhook::config::Config;
use imgbot_webhook::delivery::Hook;
use imgbot_webhook::server::{AppState, build_router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "imgbot_webhook=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();

    if config.in_memory {
        warn!("Using in-memory queues and tables; nothing survives a restart");
    } else {
        info!(data_dir = %config.data_dir.display(), "Using file-backed queues and tables");
    }

    let hook = Hook::new(config.bot(), config.collaborators());
    info!(
        bot_login = %hook.bot().login,
        bot_branch = %hook.bot().branch,
        router_queue = %config.router_queue,
        open_pr_queue = %config.open_pr_queue,
        "Webhook dispatcher configured"
    );

    let app = build_router(AppState::new(hook));

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    info!("listening on {}", config.listen);
    axum::serve(listener, app).await?;
    Ok(())
}
