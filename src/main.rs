use miparqueo::config::{Config, Environment};
use miparqueo::{api, InitGate};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;
    let gate = InitGate::new(Arc::new(config.database.clone()), config.init_timeout);

    // Development fails fast on a bad database; production connects on the
    // first data request instead.
    if config.environment == Environment::Development {
        if let Err(e) = gate.ready().await {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    }

    tracing::info!(
        environment = config.environment.as_str(),
        db_type = config.database.kind(),
        "Starting server"
    );

    let app = api::create_router(api::AppState::new(gate, config));

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
