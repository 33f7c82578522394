use anyhow::{anyhow, Context, Result};
use axum::Router;
use concierge_api::{build_router, services::Actor, AppState};
use concierge_auth::Authenticator;
use concierge_config::AppConfig;
use concierge_database::initialize_database;
use concierge_integrations::Integrations;
use sqlx::SqlitePool;
use tracing::info;

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::TRACE)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Everything a process needs to serve requests or run a maintenance command.
#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub authenticator: Authenticator,
    state: AppState,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise database")?;

        let authenticator = Authenticator::new(db_pool.clone(), config.auth.clone());
        let integrations = Integrations::from_config(&config.integrations)
            .context("failed to configure integrations")?;

        info!(
            listings = integrations.listings().is_ok(),
            cloudinary = integrations.cloudinary().is_some(),
            stripe = integrations.stripe().is_ok(),
            "integrations ready"
        );

        let state = AppState::new(
            db_pool.clone(),
            authenticator.clone(),
            integrations,
            config.clone(),
        );

        Ok(Self {
            db_pool,
            authenticator,
            state,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Act as the manager linked to a registered account, for CLI commands.
    pub async fn actor_for_email(&self, email: &str) -> Result<Actor> {
        let user = self
            .authenticator
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| anyhow!("no account registered for {email}"))?;

        let manager = self
            .authenticator
            .resolve_manager(&user)
            .await?
            .ok_or_else(|| anyhow!("{email} is not a property manager"))?;

        let is_super_admin = self.authenticator.is_super_admin(email);
        Ok(Actor::new(user, manager, is_super_admin))
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
