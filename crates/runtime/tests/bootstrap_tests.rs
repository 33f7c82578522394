use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use axum::{body::Body, http::Request, http::StatusCode};
use concierge_config::AppConfig;
use concierge_runtime::{self, BackendServices};
use tempfile::TempDir;
use tokio::time::{sleep, timeout};
use tower::ServiceExt;

fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}", path.to_string_lossy())
}

fn build_config(database_url: String, max_connections: u32) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = database_url;
    config.database.max_connections = max_connections;
    config.auth.super_admin_emails = vec!["owner@example.com".into()];
    config
}

async fn initialise(config: &AppConfig) -> Result<BackendServices> {
    BackendServices::initialise(config)
        .await
        .context("failed to initialise backend services")
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_runs_migrations() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/init.db");
    let config = build_config(sqlite_url(&db_path), 4);

    let services = initialise(&config).await?;
    let table: String = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'invoices'",
    )
    .fetch_one(&services.db_pool)
    .await?;

    assert_eq!("invoices", table);
    assert!(services.state().integrations().stripe().is_err());
    assert!(services.state().integrations().cloudinary().is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_enables_only_fully_configured_integrations() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut config = build_config(sqlite_url(&temp_dir.path().join("cfg.db")), 1);
    config.integrations.cloudinary.cloud_name = Some("demo".into());
    config.integrations.stripe.secret_key = Some("sk_test_runtime".into());

    let services = initialise(&config).await?;
    let integrations = services.state().integrations();
    assert!(integrations.cloudinary().is_none(), "cloudinary lacks credentials");
    assert!(integrations.stripe().is_ok());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn prepare_database_creates_sqlite_directory_if_missing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_dir = temp_dir.path().join("nested");
    let db_path = db_dir.join("prepared.db");
    let config = build_config(sqlite_url(&db_path), 2);

    assert!(!db_dir.exists());

    let services = initialise(&config).await?;
    assert!(db_dir.exists(), "database directory should be created");
    assert!(db_path.exists(), "database file should be created");
    drop(services);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn prepare_database_enables_sqlite_foreign_keys() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/foreign_keys.db");
    let config = build_config(sqlite_url(&db_path), 2);

    let services = initialise(&config).await?;

    let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(&services.db_pool)
        .await?;
    assert_eq!(1, enabled, "foreign key enforcement must be enabled");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn prepare_database_applies_max_connections_setting() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/max_conn.db");
    let max_connections = 3;
    let config = build_config(sqlite_url(&db_path), max_connections);

    let services = initialise(&config).await?;
    assert_eq!(
        max_connections,
        services.db_pool.options().get_max_connections()
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn non_sqlite_urls_fail_without_touching_the_filesystem() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let target_dir = temp_dir.path().join("should_not_exist");
    let malformed_url = format!("postgres://{}/ignored.db", target_dir.to_string_lossy());
    let config = build_config(malformed_url, 1);

    let error = match BackendServices::initialise(&config).await {
        Ok(_) => panic!("expected a non-sqlite URL to be rejected"),
        Err(error) => error,
    };
    assert!(!target_dir.exists());
    assert!(
        format!("{error:#}").contains("failed to initialise database"),
        "unexpected error: {error:#}"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn router_serves_health_from_bootstrapped_state() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = build_config(sqlite_url(&temp_dir.path().join("router.db")), 2);
    let services = initialise(&config).await?;

    let response = services
        .router()
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn actor_for_email_requires_a_manager_account() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = build_config(sqlite_url(&temp_dir.path().join("actor.db")), 2);
    let services = initialise(&config).await?;

    assert!(services.actor_for_email("owner@example.com").await.is_err());

    services
        .authenticator
        .register_with_password("owner@example.com", "pw", None)
        .await?;
    services
        .authenticator
        .register_with_password("guest@example.com", "pw", None)
        .await?;

    let actor = services.actor_for_email("Owner@Example.com").await?;
    assert!(actor.is_admin());

    let guest = services.actor_for_email("guest@example.com").await;
    assert!(guest.is_err(), "accounts without a manager cannot act");
    Ok(())
}

#[test]
fn telemetry_init_tracing_sets_global_subscriber() {
    concierge_runtime::telemetry::init_tracing().expect("first initialisation should succeed");

    let second = concierge_runtime::telemetry::init_tracing();
    assert!(
        second.is_err(),
        "initialising telemetry twice should fail with global subscriber already set"
    );
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(unix), ignore = "requires Unix signal handling")]
async fn shutdown_signal_completes_on_ctrl_c_notification() -> Result<()> {
    let shutdown_task = tokio::spawn(async { concierge_runtime::shutdown_signal().await });

    sleep(Duration::from_millis(50)).await;
    #[cfg(unix)]
    unsafe {
        libc::raise(libc::SIGINT);
    }

    timeout(Duration::from_secs(2), shutdown_task).await??;
    Ok(())
}
