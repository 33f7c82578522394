use std::sync::Arc;

use axum::http::HeaderMap;
use concierge_auth::{AuthSession, Authenticator, User};
use concierge_config::{AppConfig, RegionRule};
use concierge_integrations::Integrations;
use sqlx::SqlitePool;

use crate::services::pdf::BusinessInfo;
use crate::services::Actor;
use crate::util::require_bearer;
use crate::ApiError;

#[derive(Clone)]
pub struct AppState {
    pool: SqlitePool,
    authenticator: Authenticator,
    integrations: Arc<Integrations>,
    config: Arc<AppConfig>,
    regions: Arc<Vec<RegionRule>>,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        authenticator: Authenticator,
        integrations: Integrations,
        config: AppConfig,
    ) -> Self {
        let regions = Arc::new(config.region_rules());
        Self {
            pool,
            authenticator,
            integrations: Arc::new(integrations),
            config: Arc::new(config),
            regions,
        }
    }

    pub fn db_pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn integrations(&self) -> &Integrations {
        &self.integrations
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn regions(&self) -> &[RegionRule] {
        &self.regions
    }

    pub fn public_base_url(&self) -> &str {
        self.config.http.public_base_url.trim_end_matches('/')
    }

    pub fn business(&self) -> BusinessInfo {
        BusinessInfo::from(&self.config.business)
    }

    pub async fn authenticate(&self, token: &str) -> Result<(User, AuthSession), ApiError> {
        self.authenticator
            .authenticate_token(token)
            .await
            .map_err(ApiError::from)
    }

    /// Resolve the bearer token to a manager. Signed-in users without a manager row get 403.
    pub async fn actor(&self, headers: &HeaderMap) -> Result<Actor, ApiError> {
        let token = require_bearer(headers)?;
        let (user, _) = self.authenticate(&token).await?;

        let manager = self
            .authenticator
            .resolve_manager(&user)
            .await
            .map_err(ApiError::from)?
            .ok_or_else(|| ApiError::forbidden("This account is not a property manager"))?;

        let is_super_admin = user
            .email
            .as_deref()
            .is_some_and(|email| self.authenticator.is_super_admin(email));
        Ok(Actor::new(user, manager, is_super_admin))
    }
}
