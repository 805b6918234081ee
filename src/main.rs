use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use tmdb_agent::AppState;
use tmdb_agent::handlers::{health_check, movie_stream_handler};
use tmdb_agent::init::app_init;

fn create_app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/movie/", axum::routing::post(movie_stream_handler))
        .route("/health", axum::routing::get(health_check))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("🚀 Starting TMDB agent server...");
    dotenv::dotenv().ok();
    let (config, state) = app_init().await?;
    log::info!("✅ Application state initialized");
    let app = create_app_router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("");
    log::info!("🎉 Server started!");
    log::info!("📍 http://{}", addr);
    log::info!("🎬 Movie queries: http://{}/movie/", addr);
    log::info!("❤️  Health: http://{}/health", addr);
    log::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
