use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use reel_backend::{build_app, AppState};
use reel_shared::AddrInfo;

use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = reel_backend::cli::CliOpts::parse();

    let my_filter = match cli.debug {
        true => "reel=debug,reel_backend=debug,tower_http=debug",
        false => "reel=info,reel_backend=info,tower_http=info",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| my_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addrinfo = AddrInfo::from_env();

    let appstate = match AppState::new(&cli, &addrinfo).await {
        Ok(state) => state,
        Err(err) => {
            error!("Failed to initialize application state: {}", err);
            return ExitCode::FAILURE;
        }
    };
    let shared_state = Arc::new(RwLock::new(appstate));

    let app = build_app(&shared_state).await;

    let listener = match tokio::net::TcpListener::bind(&addrinfo.as_addr()).await {
        Ok(val) => {
            info!("Listening on {}", addrinfo.as_url());
            val
        }
        Err(err) => {
            error!("Failed to bind to {}: {:?}", addrinfo.as_url(), err);
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = axum::serve(listener, app).await {
        error!("Server error: {:?}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
