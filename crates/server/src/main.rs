//! Folio server entry point.

use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit};
use folio_api::{AppState, api_router};
use folio_common::{Config, LocalStorage, StorageBackend};
use folio_core::{FollowingService, PostService, ProfileService, UserService, VisibilityService};
use folio_db::repositories::{FollowingRepository, PostRepository, UserRepository};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Install the global subscriber. `FOLIO_LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "folio=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("FOLIO_LOG_FORMAT").is_ok_and(|format| format == "json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting folio server...");

    let config = Config::load()?;

    let db = folio_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    folio_db::migrate(&db).await?;
    info!("Migrations completed");

    let db = Arc::new(db);

    tokio::fs::create_dir_all(&config.storage.base_path).await?;
    let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::from_config(&config.storage));
    info!(path = %config.storage.base_path.display(), "Using local storage");

    // Repositories
    let user_repo = UserRepository::new(Arc::clone(&db));
    let following_repo = FollowingRepository::new(Arc::clone(&db));
    let post_repo = PostRepository::new(Arc::clone(&db));

    // Services
    let visibility = VisibilityService::new(following_repo.clone());
    let post_service = PostService::new(post_repo, user_repo.clone(), visibility.clone(), storage);
    let state = AppState {
        user_service: UserService::new(user_repo.clone()),
        following_service: FollowingService::new(following_repo.clone(), user_repo.clone()),
        profile_service: ProfileService::new(
            user_repo,
            following_repo,
            visibility,
            post_service.clone(),
        ),
        post_service,
    };

    let app = Router::new()
        .nest("/api/v1", api_router(state))
        .nest_service(
            &config.storage.base_url,
            ServeDir::new(&config.storage.base_path),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.storage.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
