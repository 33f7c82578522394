use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "concierge.toml",
    "config/concierge.toml",
    "crates/config/concierge.toml",
    "../concierge.toml",
    "../config/concierge.toml",
    "../crates/config/concierge.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub regions: Vec<RegionRule>,
    pub integrations: IntegrationsConfig,
    pub business: BusinessConfig,
}

impl AppConfig {
    /// Region rules to categorize addresses with, falling back to the built-in set when the
    /// configuration leaves the list empty.
    pub fn region_rules(&self) -> Vec<RegionRule> {
        if self.regions.is_empty() {
            RegionRule::defaults()
        } else {
            self.regions.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
    /// Base URL of the public site, used to build client portfolio links.
    pub public_base_url: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
            public_base_url: "http://localhost:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://concierge.db".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub session_ttl_seconds: u64,
    /// Accounts with these emails are always treated as administrators.
    pub super_admin_emails: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: 86_400,
            super_admin_emails: Vec::new(),
        }
    }
}

impl AuthConfig {
    /// Case-insensitive allowlist check.
    ///
    /// ```
    /// use concierge_config::AuthConfig;
    ///
    /// let mut auth = AuthConfig::default();
    /// auth.super_admin_emails = vec![" Owner@Example.com ".to_string()];
    /// assert!(auth.is_super_admin("owner@example.com"));
    /// assert!(!auth.is_super_admin("someone@example.com"));
    /// ```
    pub fn is_super_admin(&self, email: &str) -> bool {
        let email = email.trim();
        if email.is_empty() {
            return false;
        }
        self.super_admin_emails
            .iter()
            .any(|candidate| candidate.trim().eq_ignore_ascii_case(email))
    }
}

/// An ordered keyword rule mapping addresses to a named region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRule {
    pub name: String,
    pub keywords: Vec<String>,
}

impl RegionRule {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn defaults() -> Vec<RegionRule> {
        vec![
            RegionRule::new(
                "Miami-Dade",
                &[
                    "miami",
                    "hialeah",
                    "coral gables",
                    "doral",
                    "homestead",
                    "key biscayne",
                    "aventura",
                    " 331",
                    " 330",
                ],
            ),
            RegionRule::new(
                "Broward",
                &[
                    "fort lauderdale",
                    "ft lauderdale",
                    "hollywood",
                    "pembroke pines",
                    "weston",
                    "coral springs",
                    "plantation",
                    "davie",
                    " 333",
                ],
            ),
            RegionRule::new(
                "Palm Beach",
                &[
                    "palm beach",
                    "boca raton",
                    "delray",
                    "jupiter",
                    "wellington",
                    "boynton",
                    " 334",
                ],
            ),
            RegionRule::new("Orlando", &["orlando", "kissimmee", "winter park", " 328"]),
            RegionRule::new(
                "Tampa Bay",
                &[
                    "tampa",
                    "st. petersburg",
                    "st petersburg",
                    "clearwater",
                    " 336",
                    " 337",
                ],
            ),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationsConfig {
    pub listings: ListingApiConfig,
    pub cloudinary: CloudinaryConfig,
    pub stripe: StripeConfig,
}

/// Configuration for the paid listing-scrape API.
///
/// ```
/// use concierge_config::ListingApiConfig;
///
/// let listings = ListingApiConfig::default();
/// assert_eq!(listings.base_url, "https://zillow-com1.p.rapidapi.com");
/// assert_eq!(listings.request_timeout_seconds, 30);
/// assert!(listings.api_key.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingApiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub host: String,
    pub request_timeout_seconds: u64,
}

impl Default for ListingApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://zillow-com1.p.rapidapi.com".to_string(),
            host: "zillow-com1.p.rapidapi.com".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudinaryConfig {
    pub cloud_name: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub folder: String,
    pub base_url: String,
    pub request_timeout_seconds: u64,
}

impl Default for CloudinaryConfig {
    fn default() -> Self {
        Self {
            cloud_name: None,
            api_key: None,
            api_secret: None,
            folder: "properties".to_string(),
            base_url: "https://api.cloudinary.com/v1_1".to_string(),
            request_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub base_url: String,
    pub currency: String,
    pub request_timeout_seconds: u64,
    pub webhook_tolerance_seconds: u64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            webhook_secret: None,
            base_url: "https://api.stripe.com".to_string(),
            currency: "usd".to_string(),
            request_timeout_seconds: 30,
            webhook_tolerance_seconds: 300,
        }
    }
}

/// Company details printed on invoices and quotes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessConfig {
    pub company_name: String,
    pub company_email: Option<String>,
    pub company_address: Option<String>,
}

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            company_name: "Concierge Realty".to_string(),
            company_email: None,
            company_address: None,
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use concierge_config::load;
///
/// std::env::remove_var("CONCIERGE_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let db_max = i64::from(defaults.database.max_connections);
    let session_ttl_i64 = i64::try_from(defaults.auth.session_ttl_seconds).unwrap_or(i64::MAX);

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("http.public_base_url", defaults.http.public_base_url.clone())?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default("database.max_connections", db_max)?
        .set_default("auth.session_ttl_seconds", session_ttl_i64)?
        .set_default("integrations.stripe.currency", defaults.integrations.stripe.currency.clone())?;

    let environment_overrides = config::Environment::with_prefix("CONCIERGE")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("auth.super_admin_emails");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("CONCIERGE_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via CONCIERGE_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.auth.session_ttl_seconds > i64::MAX as u64 {
        config.auth.session_ttl_seconds = i64::MAX as u64;
    }

    debug!(
        http = ?config.http,
        database = %config.database.url,
        regions = config.regions.len(),
        listings_enabled = config.integrations.listings.api_key.is_some(),
        cloudinary_enabled = config.integrations.cloudinary.cloud_name.is_some(),
        stripe_enabled = config.integrations.stripe.secret_key.is_some(),
        "loaded backend configuration"
    );
    Ok(config)
}
