use std::sync::Arc;

use clap::Parser;

use aimesh_gateway::config;
use aimesh_gateway::routes;
use aimesh_gateway::state::GatewayState;

#[derive(Parser, Debug)]
#[command(name = "aimesh-gateway", version, about = "AIMesh edge gateway")]
struct Args {
    /// Port to listen on (falls back to PORT, then the configured default)
    #[arg(long, env = "GATEWAY_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,
}

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up BACKEND_ORIGIN, JWT_PUBLIC_KEY, etc.
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();

    tracing_subscriber::fmt::init();
    tracing::info!("Starting AIMesh gateway in {:?} mode", config.environment);

    if let Err(e) = url::Url::parse(&config.backend.origin) {
        panic!("invalid BACKEND_ORIGIN '{}': {}", config.backend.origin, e);
    }
    if config.auth.jwt_public_key.is_empty() {
        tracing::warn!("JWT_PUBLIC_KEY is not set; every guarded route will redirect to login");
    }

    let state = Arc::new(
        GatewayState::from_config(config).expect("failed to build upstream HTTP client"),
    );
    let app = routes::app(state);

    // Allow tests or deployments to override port via env
    let port = args
        .port
        .or_else(|| std::env::var("PORT").ok().and_then(|s| s.parse::<u16>().ok()))
        .unwrap_or(config.server.port);

    let bind_addr = format!("{}:{}", args.bind, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    println!("🚀 AIMesh gateway listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}
