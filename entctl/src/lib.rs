//! # entctl
//!
//! A multi-tenant entitlement-management service. In front of every API
//! operation runs a strict request pipeline: an authentication chain of
//! configurable strategies resolves *who* is calling, an authorization gate
//! decides *whether* they may invoke the operation, and a pagination contract
//! parser validates *how* results should be paged and sorted. All three are
//! fail-closed: unregistered operations require authentication, rejected
//! credentials abort the chain, and malformed paging parameters are errors
//! rather than silently-corrected values.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use entctl::{Application, Config, config::Args, telemetry};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     telemetry::init_telemetry()?;
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
//! ## Database Setup
//!
//! The application requires a PostgreSQL database and automatically runs
//! migrations on startup; see [`migrator`].
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod identity;
mod openapi;
pub mod pipeline;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::sync::Arc;

use axum::{
    Router,
    http::Method,
    middleware::from_fn_with_state,
    routing::get,
};
use bon::Builder;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::auth::gate::{RequirementRegistry, RoleRequirement};
use crate::auth::principal::Role;
use crate::identity::{IdentityAdapter, OwnerCurator};
use crate::openapi::ApiDoc;
use crate::pipeline::pipeline_middleware;

pub use config::Config;
pub use types::{OwnerId, UserId};

/// Application state shared across all request handlers.
///
/// Holds only read-only configuration and `Arc`-shared collaborators; every
/// per-request value (principal, page context) lives in the request's
/// extension map, never here.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub identity: Arc<dyn IdentityAdapter>,
    pub owners: Arc<dyn OwnerCurator>,
    pub registry: Arc<RequirementRegistry>,
}

/// Get the entctl database migrator
pub fn migrator() -> &'static sqlx::migrate::Migrator {
    &db::MIGRATOR
}

/// The authorization requirements for every routed operation.
///
/// Kept next to [`build_router`] so route registration and requirement
/// registration are reviewed together. An operation missing here falls back
/// to `Authenticated`.
pub fn requirement_registry() -> RequirementRegistry {
    RequirementRegistry::new()
        .register(Method::GET, "/status", RoleRequirement::NoAuthRequired)
        .register(
            Method::GET,
            "/users/{username}",
            RoleRequirement::AnyRole(vec![Role::SuperAdmin, Role::OwnerAdmin]),
        )
        .register(
            Method::GET,
            "/owners",
            RoleRequirement::AnyRole(vec![Role::SuperAdmin, Role::ReadOnly]),
        )
        .register(Method::GET, "/owners/{key}", RoleRequirement::Authenticated)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Build the service router.
///
/// The pipeline is attached with `route_layer` so it sees the matched route
/// template; `/healthz` and the docs are registered afterwards and stay
/// outside the pipeline.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(api::handlers::status::get_status))
        .route("/users/{username}", get(api::handlers::users::get_user))
        .route("/owners", get(api::handlers::owners::list_owners))
        .route("/owners/{key}", get(api::handlers::owners::get_owner))
        .route_layer(from_fn_with_state(state.clone(), pipeline_middleware))
        .route("/healthz", get(healthz))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A fully initialized service: pool connected, migrations applied, router
/// built.
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = db::connect(&config.database).await?;
        db::MIGRATOR.run(&pool).await?;
        db::create_initial_admin_user(&pool, &config.admin_username, config.admin_password.as_deref())
            .await
            .map_err(|e| anyhow::anyhow!(e))?;

        let state = AppState::builder()
            .config(config.clone())
            .identity(Arc::new(db::PgIdentityAdapter::new(pool.clone())))
            .owners(Arc::new(db::PgOwnerCurator::new(pool.clone())))
            .registry(Arc::new(requirement_registry()))
            .build();

        let router = build_router(state);

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Entitlement service listening on http://{bind_addr}");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
