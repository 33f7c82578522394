use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use concierge_config::AuthConfig;
use cuid2::CuidConstructor;
use once_cell::sync::Lazy;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, SqlitePool, Transaction};
use thiserror::Error;
use tracing::{debug, info};

static CUID: Lazy<CuidConstructor> = Lazy::new(CuidConstructor::new);

const PASSWORD_PROVIDER: &str = "password";
// Sessions never outlive a century; larger configured values are capped.
const MAX_SESSION_TTL_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Clone)]
pub struct Authenticator {
    pool: SqlitePool,
    session_ttl: Duration,
    config: AuthConfig,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user already exists")]
    UserExists,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("email and password are required")]
    MissingCredentials,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] argon2::password_hash::Error),
    #[error("session not found")]
    SessionNotFound,
    #[error("session expired")]
    SessionExpired,
    #[error("invalid session token")]
    InvalidSession,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    #[serde(skip_serializing)]
    pub id: i64,
    pub public_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

/// Dashboard role stored on `property_managers.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ManagerRole {
    Admin,
    Manager,
}

impl ManagerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManagerRole::Admin => "admin",
            ManagerRole::Manager => "manager",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(ManagerRole::Admin),
            "manager" => Some(ManagerRole::Manager),
            _ => None,
        }
    }
}

/// A row of `property_managers`, the people allowed into the dashboard.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ManagerProfile {
    #[serde(skip_serializing)]
    pub id: i64,
    pub public_id: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub role: ManagerRole,
    pub created_at: String,
    pub updated_at: String,
}

impl ManagerProfile {
    pub fn is_admin(&self) -> bool {
        self.role == ManagerRole::Admin
    }
}

pub const MANAGER_COLUMNS: &str =
    "id, public_id, email, full_name, phone, company, role, created_at, updated_at";

impl Authenticator {
    pub fn new(pool: SqlitePool, config: AuthConfig) -> Self {
        let session_ttl =
            Duration::seconds(config.session_ttl_seconds.min(MAX_SESSION_TTL_SECONDS) as i64);

        Self {
            pool,
            session_ttl,
            config,
        }
    }

    pub fn is_super_admin(&self, email: &str) -> bool {
        self.config.is_super_admin(email)
    }

    pub async fn register_with_password(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<User, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT id FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&mut *tx)
            .await?;

        if existing.is_some() {
            return Err(AuthError::UserExists);
        }

        let now = Utc::now();
        let password_hash = hash_password(password)?;
        let display_name = display_name
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned);

        let user = insert_user(&mut tx, email.clone(), display_name).await?;

        sqlx::query(
            "INSERT INTO user_identities (user_id, provider, provider_uid, secret, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user.id)
        .bind(PASSWORD_PROVIDER)
        .bind(&email)
        .bind(password_hash)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(user = %user.public_id, "registered password account");
        Ok(user)
    }

    pub async fn login_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email);
        let identity = sqlx::query(
            "SELECT user_id, secret FROM user_identities WHERE provider = ? AND provider_uid = ?",
        )
        .bind(PASSWORD_PROVIDER)
        .bind(&email)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = identity else {
            return Err(AuthError::InvalidCredentials);
        };

        let secret: Option<String> = row.try_get("secret")?;
        let secret = secret.ok_or(AuthError::InvalidCredentials)?;
        let stored_hash = PasswordHash::new(&secret)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &stored_hash)
            .map_err(|_| AuthError::InvalidCredentials)?;

        let user_id: i64 = row.try_get("user_id")?;
        self.fetch_user(user_id).await?;

        self.issue_session(user_id).await
    }

    pub async fn authenticate_token(&self, token: &str) -> Result<(User, AuthSession), AuthError> {
        let row = sqlx::query("SELECT user_id, expires_at FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Err(AuthError::SessionNotFound);
        };

        let user_id: i64 = row.try_get("user_id")?;
        let expires_at: String = row.try_get("expires_at")?;

        let expires_at = DateTime::parse_from_rfc3339(&expires_at)
            .map_err(|_| AuthError::InvalidSession)?
            .with_timezone(&Utc);

        if expires_at <= Utc::now() {
            sqlx::query("DELETE FROM sessions WHERE token = ?")
                .bind(token)
                .execute(&self.pool)
                .await?;
            return Err(AuthError::SessionExpired);
        }

        let user = self.fetch_user(user_id).await?;
        let session = AuthSession {
            token: token.to_owned(),
            user_id,
            expires_at,
        };

        Ok((user, session))
    }

    /// Delete a session. Unknown tokens are ignored.
    pub async fn revoke_session(&self, token: &str) -> Result<(), AuthError> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        debug!(revoked = result.rows_affected(), "revoked session");
        Ok(())
    }

    pub async fn user_profile(&self, user_id: i64) -> Result<User, AuthError> {
        self.fetch_user(user_id).await
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE email = ?")
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;

        match id {
            Some(id) => self.fetch_user(id).await.map(Some),
            None => Ok(None),
        }
    }

    /// Find the manager record belonging to a user, matched by email.
    ///
    /// Allowlisted super-admins without a record get one created with the `admin` role the
    /// first time they are resolved.
    pub async fn resolve_manager(&self, user: &User) -> Result<Option<ManagerProfile>, AuthError> {
        let Some(email) = user.email.as_deref() else {
            return Ok(None);
        };

        if let Some(manager) = self.find_manager_by_email(email).await? {
            return Ok(Some(manager));
        }

        if !self.is_super_admin(email) {
            return Ok(None);
        }

        let now = Utc::now().to_rfc3339();
        let full_name = user
            .display_name
            .clone()
            .unwrap_or_else(|| email.to_owned());

        sqlx::query(
            "INSERT INTO property_managers (public_id, email, full_name, role, created_at, updated_at)
             VALUES (?, ?, ?, 'admin', ?, ?)
             ON CONFLICT(email) DO NOTHING",
        )
        .bind(new_public_id())
        .bind(email)
        .bind(&full_name)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let manager = self.find_manager_by_email(email).await?;
        if let Some(manager) = manager.as_ref() {
            info!(manager = %manager.public_id, "provisioned super-admin manager");
        }
        Ok(manager)
    }

    async fn find_manager_by_email(&self, email: &str) -> Result<Option<ManagerProfile>, AuthError> {
        let manager = sqlx::query_as::<_, ManagerProfile>(&format!(
            "SELECT {MANAGER_COLUMNS} FROM property_managers WHERE email = ? COLLATE NOCASE"
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(manager)
    }

    async fn fetch_user(&self, id: i64) -> Result<User, AuthError> {
        let row = sqlx::query("SELECT id, public_id, email, display_name FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(User {
            id,
            public_id: row.try_get("public_id")?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
        })
    }

    async fn issue_session(&self, user_id: i64) -> Result<AuthSession, AuthError> {
        let token = generate_session_token();
        let now = Utc::now();
        let expires_at = now + self.session_ttl;

        sqlx::query(
            "INSERT INTO sessions (user_id, token, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&token)
        .bind(now.to_rfc3339())
        .bind(expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(AuthSession {
            token,
            user_id,
            expires_at,
        })
    }
}

async fn insert_user(
    tx: &mut Transaction<'_, sqlx::Sqlite>,
    email: String,
    display_name: Option<String>,
) -> Result<User, AuthError> {
    let now = Utc::now().to_rfc3339();
    let public_id = new_public_id();

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (public_id, email, display_name, created_at, updated_at) VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&public_id)
    .bind(&email)
    .bind(display_name.as_deref())
    .bind(&now)
    .bind(&now)
    .fetch_one(&mut **tx)
    .await?;

    Ok(User {
        id,
        public_id,
        email: Some(email),
        display_name,
    })
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn new_public_id() -> String {
    CUID.create_id()
}
