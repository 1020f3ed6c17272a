use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ferry_gateway::{
    config::Config,
    controllers,
    operators::{
        GreenOceanAdapter, MakruzzAdapter, OperatorAdapter, OperatorRegistry, SealinkAdapter,
    },
    AppState,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Andaman ferry gateway");

    let retry = config.ferry.retry_attempts;
    let sealink = Arc::new(SealinkAdapter::new(&config.sealink, retry));

    // Проверка кредов Sealink не фатальна: при недоступном операторе
    // поиск продолжает работать через остальных.
    if let Err(e) = sealink.verify_auth().await {
        warn!(error = %e, "Sealink credential check failed, continuing startup");
    } else {
        info!("Sealink credentials verified");
    }

    let adapters: Vec<Arc<dyn OperatorAdapter>> = vec![
        sealink,
        Arc::new(MakruzzAdapter::new(&config.makruzz, retry)),
        Arc::new(GreenOceanAdapter::new(&config.green_ocean, retry)),
    ];
    let registry = Arc::new(OperatorRegistry::new(adapters));

    let state = AppState::build(config, registry)
        .await
        .expect("Failed to build application state");
    info!(store = %state.config.app.store, "stores initialized");

    // --- Start background tasks ---

    // Sweeper зависших платежей
    let sweep_state = state.clone();
    let sweep_interval = Duration::from_secs(state.config.payment.sweep_interval_seconds);
    task::spawn(async move {
        loop {
            sweep_state.reconciler.sweep_stale_payments().await;
            tokio::time::sleep(sweep_interval).await;
        }
    });

    // --- Start the web server ---

    let app = Router::new()
        .route("/", get(|| async { "Andaman Ferry Gateway v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", state.config.app.host, state.config.app.port)
        .parse()
        .expect("Invalid HOST/PORT configuration");
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app.into_make_service())
        .await
        .unwrap();
}
