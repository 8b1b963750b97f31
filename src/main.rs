//! crudgate application entry point.
//!
//! Bootstraps the server:
//! 1. Load configuration from environment
//! 2. Connect to Redis
//! 3. Build router with auth + collection routes
//! 4. Apply body limit, CORS, tracing and security headers
//! 5. Start Axum server
//!
//! Also supports the `seed` subcommand for loading demo data.

use crudgate::{
    auth::middleware::AppState, config::Config, middleware::security_headers, routes, seed,
};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

fn print_seed_usage() {
    eprintln!("Usage: crudgate seed [--reset]");
    eprintln!();
    eprintln!("Upsert demo customers (by email) and products (by name).");
    eprintln!("  --reset   delete all customers and products first");
}

async fn run_seed(reset: bool) -> Result<(), String> {
    let redis_url = std::env::var("REDIS_URL").map_err(|_| "REDIS_URL is not set".to_string())?;
    let client =
        redis::Client::open(redis_url.as_str()).map_err(|e| format!("Invalid Redis URL: {}", e))?;
    let mut con = client
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| format!("Failed to connect to Redis: {}", e))?;

    let report = seed::run(&mut con, reset)
        .await
        .map_err(|e| format!("Seeding failed: {}", e))?;

    println!(
        "Customers inserted: {}, updated: {}. Total now: {}",
        report.customers.inserted, report.customers.updated, report.customers.total
    );
    println!(
        "Products inserted: {}, updated: {}. Total now: {}",
        report.products.inserted, report.products.updated, report.products.total
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    // Initialize tracing with env filter support (RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Check for seed subcommand
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && args[1] == "seed" {
        let reset = match args.get(2).map(String::as_str) {
            None => false,
            Some("--reset") if args.len() == 3 => true,
            Some(_) => {
                print_seed_usage();
                std::process::exit(1);
            }
        };

        if let Err(e) = run_seed(reset).await {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // Load config from environment
    let config = Config::from_env().expect("Failed to load config");
    tracing::info!("Starting crudgate on {}", config.bind_addr);

    // Connect to Redis
    let redis_client = redis::Client::open(config.redis_url.as_str()).expect("Invalid Redis URL");

    // Verify Redis connection
    redis_client
        .get_multiplexed_async_connection()
        .await
        .expect("Failed to connect to Redis");

    tracing::info!(
        protected = ?config.protected_collections,
        login_limit_per_min = config.rate_limit_login_per_min,
        "Access gate configured"
    );

    let bind_addr = config.bind_addr;
    let max_body_bytes = config.max_body_bytes;
    let cors = if config.cors_permissive {
        CorsLayer::permissive()
    } else {
        // No allowed origins: every cross-origin request is rejected
        CorsLayer::new()
    };

    // Build shared state
    let state = AppState::new(config, redis_client);

    let app = routes::api_router(&state)
        .layer(axum::extract::DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
        .layer(axum::middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .expect("Failed to bind");
    tracing::info!("Listening on {}", bind_addr);

    // Start server (with_connect_info required for ConnectInfo<SocketAddr> extractors)
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
