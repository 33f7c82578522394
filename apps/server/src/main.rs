use anyhow::Context;
use clap::{Parser, Subcommand};
use concierge_api::routes::models::ImportListingRequest;
use concierge_api::services::properties as property_service;
use concierge_config::{load as load_config, AppConfig};
use concierge_runtime::{telemetry, BackendServices};
use tokio::net::TcpListener;
use tracing::info;

mod data;

#[derive(Parser)]
#[command(name = "concierge-backend")]
#[command(about = "Concierge backend (serves HTTP by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Apply database migrations and exit
    Migrate,
    /// Create an admin manager account and a small sample portfolio
    SeedData {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Print managers, clients, properties and assignments
    DumpData,
    /// Import a property from a listing URL on behalf of a manager
    ImportListing {
        url: String,
        #[arg(long)]
        manager_email: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing().context("failed to initialise tracing")?;
    let config = load_config().context("failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config).await,
        Commands::Migrate => run_migrations(config).await,
        Commands::SeedData { email, password } => {
            let services = bootstrap(&config).await?;
            let summary = data::seed(&services, &email, &password).await?;
            println!("{summary}");
            Ok(())
        }
        Commands::DumpData => {
            let services = bootstrap(&config).await?;
            data::dump(&services.db_pool).await
        }
        Commands::ImportListing { url, manager_email } => {
            import_listing(config, url, manager_email).await
        }
    }
}

async fn bootstrap(config: &AppConfig) -> anyhow::Result<BackendServices> {
    BackendServices::initialise(config)
        .await
        .context("failed to initialise backend services")
}

async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    info!("starting Concierge backend");

    let services = bootstrap(&config).await?;
    let app = services.router();

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(concierge_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}

async fn run_migrations(config: AppConfig) -> anyhow::Result<()> {
    let pool = concierge_database::initialize_database(&config.database)
        .await
        .context("failed to migrate database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(&pool)
        .await
        .context("failed to read migration history")?;

    println!("Database at {} is up to date ({applied} migrations applied)", config.database.url);
    Ok(())
}

async fn import_listing(config: AppConfig, url: String, manager_email: String) -> anyhow::Result<()> {
    let services = bootstrap(&config).await?;
    let actor = services.actor_for_email(&manager_email).await?;
    let state = services.state();

    let property = property_service::import_from_listing(
        state.db_pool(),
        &actor,
        state.integrations(),
        state.regions(),
        ImportListingRequest {
            listing_url: url,
            listing_agent_id: None,
        },
    )
    .await
    .context("listing import failed")?;

    println!(
        "Imported {} ({}, {}) into region {} as {}",
        property.street, property.city, property.state, property.region, property.public_id
    );
    Ok(())
}
