use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use booking_engine::{config::Config, controllers, services::ExpiryService, AppState};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting booking engine ({})", config.app.environment);

    let app_state = AppState::new(config.clone()).await?;

    // --- Start background tasks ---

    // Expire pending bookings that outlived the hold window
    let sweep_interval = config.booking.sweep_interval();
    ExpiryService::new(app_state.service.clone()).spawn(sweep_interval);
    info!(
        "Expiry sweep every {:?}, hold window {}s",
        sweep_interval, config.booking.hold_window_seconds
    );

    // --- Start the web server ---

    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(app_state)
        .layer(TraceLayer::new_for_http());

    let ip: std::net::IpAddr = config.app.host.parse()?;
    let addr = SocketAddr::from((ip, config.app.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
