use std::path::Path;

use crate::model::{CrudRepository, DbConnection, ModelManager, Role, entity::UserEntity};
use crate::model::entity::UserEntityCreateUpdate;
use crate::utils::signal::shutdown_signal;
use crate::web::AuthenticatedUser;
use crate::{error::AppResult, web::AppState};
use axum::Router;
use sqlx::migrate::Migrator;
use tokio::net::TcpListener;

pub mod config;
pub use config::{Config, ConfigError, ConfigResult};

pub mod auth;
pub mod error;
pub mod model;
pub mod utils;
pub mod web;

static APPLICATION_NAME: &str = "lms";

pub async fn build_server() -> AppResult<(AppState, Router)> {
    let use_local = cfg!(debug_assertions);
    let config = config::Config::get_or_init(use_local).await;
    let db = DbConnection::connect(config.app().database_uri())?;

    let migrator = Migrator::new(Path::new("./migrations")).await?;
    tracing::debug!("applying migrations...");
    migrator.run(db.pool()).await?;

    build_state(db, config).await
}

pub async fn build_server_with_pool(db: DbConnection) -> AppResult<(AppState, Router)> {
    let config = config::Config::get_or_init(true).await;
    build_state(db, config).await
}

async fn build_state(db: DbConnection, config: &'static Config) -> AppResult<(AppState, Router)> {
    let mm = ModelManager::new(db);
    bootstrap_admin(&mm, config).await?;

    let state = AppState::new(mm, config);
    let app = web::routes::build_app(state.clone());
    Ok((state, app))
}

/// Creates the configured admin account unless its email is already taken.
#[tracing::instrument(skip_all)]
async fn bootstrap_admin(mm: &ModelManager, config: &Config) -> AppResult<()> {
    let Some(admin) = config.admin() else {
        return Ok(());
    };

    if UserEntity::exists_by_email(mm, admin.email()).await? {
        return Ok(());
    }

    let password_hash = auth::hash_password(admin.password())?;
    let created = UserEntity::create(
        mm,
        &AuthenticatedUser::admin(),
        UserEntityCreateUpdate {
            first_name: admin.first_name().to_string(),
            last_name: admin.last_name().to_string(),
            email: admin.email().to_string(),
            password_hash: Some(password_hash),
            role: Role::Admin,
            bio: None,
            phone: None,
            city: None,
            country: None,
        },
    )
    .await?;

    tracing::info!("created admin account {}", created.email());
    Ok(())
}

#[tracing::instrument]
pub async fn setup_workers() -> AppResult<()> {
    let (_, app) = build_server().await?;
    let config = Config::get_or_init(false).await;
    let listener = TcpListener::bind(config.host().bindto()).await?;

    tracing::info!("axum is starting at: {}", config.host().bindto());
    let axum_handle = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    axum_handle.await?;
    Ok(())
}

fn setup_trace() {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

    // load .env file for RUST_LOG etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .with(ErrorLayer::default())
        .init();

    tracing::debug!("tracing initialized.");
}

#[tracing::instrument]
pub async fn run() -> AppResult<()> {
    setup_trace();
    setup_workers().await?;
    Ok(())
}
