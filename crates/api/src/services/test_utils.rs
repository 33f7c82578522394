//! Test utilities for service layer testing

use std::str::FromStr;

use concierge_auth::{new_public_id, ManagerProfile, ManagerRole, User, MANAGER_COLUMNS};
use concierge_config::RegionRule;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tempfile::TempDir;

use super::access::Actor;
use super::region::{categorize, PropertyAddress};

/// Creates a migrated database in a temporary directory.
pub async fn create_test_db() -> (SqlitePool, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_url = format!("sqlite://{}", temp_dir.path().join("test.db").display());

    let options = SqliteConnectOptions::from_str(&db_url)
        .expect("valid sqlite url")
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Memory)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("Failed to create test database");

    concierge_database::MIGRATOR
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    (pool, temp_dir)
}

pub struct TestFixtures<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TestFixtures<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn admin(&self, email: &str) -> Actor {
        self.actor(email, ManagerRole::Admin).await
    }

    pub async fn manager(&self, email: &str) -> Actor {
        self.actor(email, ManagerRole::Manager).await
    }

    async fn actor(&self, email: &str, role: ManagerRole) -> Actor {
        let now = chrono::Utc::now().to_rfc3339();
        let user_public_id = new_public_id();
        let user_id: i64 = sqlx::query_scalar(
            "INSERT INTO users (public_id, email, display_name, created_at, updated_at)
             VALUES (?, ?, NULL, ?, ?) RETURNING id",
        )
        .bind(&user_public_id)
        .bind(email)
        .bind(&now)
        .bind(&now)
        .fetch_one(self.pool)
        .await
        .expect("insert user");

        let manager_id: i64 = sqlx::query_scalar(
            "INSERT INTO property_managers (public_id, email, full_name, role, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(new_public_id())
        .bind(email)
        .bind(format!("Manager {email}"))
        .bind(role.as_str())
        .bind(&now)
        .bind(&now)
        .fetch_one(self.pool)
        .await
        .expect("insert manager");

        let manager = sqlx::query_as::<_, ManagerProfile>(&format!(
            "SELECT {MANAGER_COLUMNS} FROM property_managers WHERE id = ?"
        ))
        .bind(manager_id)
        .fetch_one(self.pool)
        .await
        .expect("load manager");

        let user = User {
            id: user_id,
            public_id: user_public_id,
            email: Some(email.to_string()),
            display_name: None,
        };

        Actor::new(user, manager, false)
    }

    /// Inserts a property with the default region rules applied; returns its row id.
    pub async fn property(&self, street: &str, city: &str, zip: &str) -> i64 {
        self.property_with_prices(street, city, zip, None).await
    }

    pub async fn property_with_prices(
        &self,
        street: &str,
        city: &str,
        zip: &str,
        purchase_price: Option<i64>,
    ) -> i64 {
        let now = chrono::Utc::now().to_rfc3339();
        let region = categorize(
            &PropertyAddress::new(street, city, "FL", zip),
            &RegionRule::defaults(),
        );

        sqlx::query_scalar(
            "INSERT INTO properties (public_id, street, city, state, zip, region, purchase_price,
                 monthly_rent, created_at, updated_at)
             VALUES (?, ?, ?, 'FL', ?, ?, ?, 250000, ?, ?) RETURNING id",
        )
        .bind(new_public_id())
        .bind(street)
        .bind(city)
        .bind(zip)
        .bind(region)
        .bind(purchase_price)
        .bind(&now)
        .bind(&now)
        .fetch_one(self.pool)
        .await
        .expect("insert property")
    }

    /// Inserts a client owned by `owner`; returns its row id.
    pub async fn client(&self, owner: &Actor, full_name: &str, slug: &str) -> i64 {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query_scalar(
            "INSERT INTO clients (public_id, manager_id, full_name, email, slug, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(new_public_id())
        .bind(owner.manager_id())
        .bind(full_name)
        .bind(format!("{slug}@example.com"))
        .bind(slug)
        .bind(&now)
        .bind(&now)
        .fetch_one(self.pool)
        .await
        .expect("insert client")
    }

    /// Links a property to a client at the given position.
    pub async fn assign(&self, client_id: i64, property_id: i64, position: i64) {
        sqlx::query(
            "INSERT INTO client_property_assignments (client_id, property_id, position, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(client_id)
        .bind(property_id)
        .bind(position)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(self.pool)
        .await
        .expect("insert assignment");
    }

    pub async fn public_id(&self, table: &str, id: i64) -> String {
        sqlx::query_scalar(&format!("SELECT public_id FROM {table} WHERE id = ?"))
            .bind(id)
            .fetch_one(self.pool)
            .await
            .expect("public id")
    }
}
