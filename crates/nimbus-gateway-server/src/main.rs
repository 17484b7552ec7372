use nimbus_gateway::orchestrator::{ClusterConfig, ClusterOrchestrator};
use nimbus_gateway::state::{MemoryState, RedisConfig, RedisState, StateStore};
use nimbus_gateway::Dispatcher;
use nimbus_gateway_server::config::{self, StateBackend};
use nimbus_gateway_server::{create_app, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let filter = std::env::var("NIMBUS_LOG")
        .unwrap_or_else(|_| "info,nimbus_gateway=debug,nimbus_gateway_server=debug".to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = config::load()?;

    let state: Arc<dyn StateStore> = match &cfg.state {
        StateBackend::Memory => Arc::new(MemoryState::new()),
        StateBackend::Redis { addr } => {
            Arc::new(RedisState::connect(&RedisConfig { addr: addr.clone() }).await?)
        }
    };

    let orchestrator = Arc::new(ClusterOrchestrator::new(&ClusterConfig {
        cluster: cfg.orchestrator_url.clone(),
    }));

    let dispatcher = Arc::new(Dispatcher::new(state, orchestrator));

    // Pick up functions registered before this process started.
    dispatcher.sync_existing_functions().await;

    let app = create_app(AppState { dispatcher });

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    info!("nimbus gateway listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
