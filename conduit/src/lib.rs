//! # conduit: a social publishing backend
//!
//! `conduit` is the HTTP backend for a Medium-style publishing platform:
//! user accounts with follow relationships, articles with tags and
//! favorites, and per-article comment threads, exposed as an enveloped JSON
//! API under `/api`.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) with
//! PostgreSQL for persistence and Redis for sessions and distributed locks.
//!
//! The **API layer** ([`api`]) holds the request handlers and the
//! wire-format models, including the view-composition step that turns
//! database rows into viewer-specific responses (profile `following`,
//! article `favorited`, sorted tag lists).
//!
//! The **authentication layer** ([`auth`]) mints JWTs bound to
//! Redis-backed session records. A token is only accepted while its session
//! record is alive, so logout revokes access immediately instead of waiting
//! for the token to expire.
//!
//! The **database layer** ([`db`]) uses the repository pattern: each entity
//! has a repository over a borrowed connection, and handlers decide the
//! connection/transaction scope.
//!
//! The **lock manager** ([`lock`]) serializes writers that race on shared
//! unique values. Article creation, slug-changing updates and email-changing
//! account updates take a short Redis lease keyed by the contested value;
//! the database's unique indexes remain the hard backstop.
//!
//! ## Quick start
//!
//! ```no_run
//! use clap::Parser;
//! use conduit::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = conduit::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     conduit::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database setup
//!
//! Migrations run automatically on startup, or manually:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
//! conduit::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod lock;
pub mod telemetry;
mod types;

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use bon::Builder;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info};

use crate::{auth::session::Sessions, lock::LockManager};
pub use config::Config;
pub use types::{ArticleId, CommentId, TagId, UserId};

/// Application state shared across all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub sessions: Sessions,
    pub locker: LockManager,
}

/// Get the conduit database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.cors.allowed_origins {
        if origin == "*" {
            return Ok(CorsLayer::permissive());
        }
        origins.push(origin.parse::<HeaderValue>()?);
    }

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.cors.allow_credentials)
        .allow_methods(tower_http::cors::AllowMethods::mirror_request())
        .allow_headers(tower_http::cors::AllowHeaders::mirror_request()))
}

/// Build the application router with all endpoints and middleware.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        // Accounts and sessions
        .route("/users", post(api::handlers::users::register))
        .route("/users/login", post(api::handlers::users::login))
        .route("/users/logout", post(api::handlers::users::logout))
        .route(
            "/user",
            get(api::handlers::users::current_user).put(api::handlers::users::update_user),
        )
        // Profiles and the follow graph
        .route("/profiles/{username}", get(api::handlers::profiles::get_profile))
        .route(
            "/profiles/{username}/follow",
            post(api::handlers::profiles::follow_profile).delete(api::handlers::profiles::unfollow_profile),
        )
        // Articles
        .route(
            "/articles",
            get(api::handlers::articles::list_articles).post(api::handlers::articles::create_article),
        )
        .route("/articles/feed", get(api::handlers::articles::feed_articles))
        .route(
            "/articles/{slug}",
            get(api::handlers::articles::get_article)
                .put(api::handlers::articles::update_article)
                .delete(api::handlers::articles::delete_article),
        )
        .route(
            "/articles/{slug}/favorite",
            post(api::handlers::articles::favorite_article).delete(api::handlers::articles::unfavorite_article),
        )
        // Comments
        .route(
            "/articles/{slug}/comments",
            get(api::handlers::comments::list_comments).post(api::handlers::comments::add_comment),
        )
        .route(
            "/articles/{slug}/comments/{id}",
            axum::routing::delete(api::handlers::comments::delete_comment),
        )
        // Tags
        .route("/tags", get(api::handlers::tags::list_tags));

    let cors_layer = create_cors_layer(&state.config)?;

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(cors_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] connects to PostgreSQL and Redis and
///    runs migrations
/// 2. **Serve**: [`Application::serve`] binds the TCP port and handles
///    requests until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting conduit with configuration: {:#?}", config);

        let pool = PgPool::connect(&config.database_url).await?;
        migrator().run(&pool).await?;

        let redis = cache::connect(&config.redis_url).await?;
        let sessions = Sessions::new(redis.clone(), &config);
        let locker = LockManager::new(redis, &config);

        let state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .sessions(sessions)
            .locker(locker)
            .build();

        let router = build_router(state)?;

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("conduit listening on http://{bind_addr}");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
