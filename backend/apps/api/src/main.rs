//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

mod demo;
mod handlers;

use axum::http::{self, HeaderName, Method, header};
use platform::password::Argon2PasswordEncoder;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden::domain::cache::Cache;
use warden::domain::repository::SessionRepository;
use warden::infra::{Expiry, MemoryCache};
use warden::{
    AuthenticationManager, AuthorizationManager, DistributedSessionStore, InProcessSessionStore,
    RedisStore, RetryLimiter, StaticMetadataProvider, WardenConfig, spawn_sweeper,
};

use crate::demo::Directory;
use crate::handlers::AppState;

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,warden=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Session core configuration
    let base = if cfg!(debug_assertions) {
        WardenConfig::development()
    } else {
        WardenConfig::default()
    };
    let config = Arc::new(base.merge_lookup(|key| env::var(key).ok())?);

    let encoder = Argon2PasswordEncoder::new();
    let directory = Directory::seeded(&encoder)?;

    match env::var("WARDEN_REDIS_URL") {
        Ok(redis_url) => {
            let store = Arc::new(RedisStore::connect(&redis_url).await?);
            tracing::info!("Connected to Redis, using distributed sessions");

            let sessions = Arc::new(DistributedSessionStore::new(
                Arc::clone(&store),
                Arc::clone(&config),
            ));
            let limiter = RetryLimiter::shared(store, config.retry.clone());
            serve(sessions, limiter, config, directory, encoder).await
        }
        Err(_) => {
            tracing::info!("WARDEN_REDIS_URL not set, using in-process sessions");

            let sessions = Arc::new(InProcessSessionStore::new(Arc::clone(&config)));
            let limiter = RetryLimiter::in_memory(config.retry.clone());
            serve(sessions, limiter, config, directory, encoder).await
        }
    }
}

async fn serve<S, R>(
    sessions: Arc<S>,
    limiter: RetryLimiter<R>,
    config: Arc<WardenConfig>,
    directory: Directory,
    encoder: Argon2PasswordEncoder,
) -> anyhow::Result<()>
where
    S: SessionRepository + Send + Sync + 'static,
    R: Cache<u32> + Send + Sync + 'static,
{
    // Expiry sweep; errors are logged by the task and never stop the server
    let sweeper = spawn_sweeper(Arc::clone(&sessions), config.scheduler.clone());

    let authorization = AuthorizationManager::new(
        AuthenticationManager::new(sessions, Arc::clone(&config)),
        Arc::new(StaticMetadataProvider::new(demo::catalog())),
        MemoryCache::new(Expiry::AfterWrite(config.authority.sys_expire)),
        Arc::clone(&config),
    );

    let state = AppState {
        authorization: Arc::new(authorization),
        limiter: Arc::new(limiter),
        directory: Arc::new(directory),
        encoder: Arc::new(encoder),
        cookie: config
            .cookie
            .enabled
            .then(|| config.cookie.to_cookie_config()),
    };

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let session_header = HeaderName::try_from(config.session.session_name.as_str())?;

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::ACCEPT,
            session_header,
        ]))
        .allow_credentials(true);

    // Build router
    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], 31113));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    sweeper.abort();
    Ok(())
}
