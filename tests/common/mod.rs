//! Common test utilities

#![allow(dead_code)]

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use uuid::Uuid;

use installment_ledger::domain::OperationContext;

const SCHEMA: &str = include_str!("../../migrations/0001_installment_ledger.sql");

/// A connected pool plus a freshly seeded tenant
pub struct TestDb {
    pub pool: PgPool,
    pub organization_id: Uuid,
    pub api_key: String,
}

impl TestDb {
    pub fn context(&self) -> OperationContext {
        OperationContext::new().with_organization(self.organization_id)
    }
}

/// Setup test database - apply schema and seed a tenant with its own API key.
///
/// Returns `None` when DATABASE_URL is not set so DB-backed tests skip.
/// Each call gets a new organization, so tests can share one database.
pub async fn setup_test_db() -> Option<TestDb> {
    dotenvy::dotenv().ok();
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping DB-backed test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    // Test binaries run in parallel; serialize schema creation
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    sqlx::query("SELECT pg_advisory_lock(73017)")
        .execute(&mut *conn)
        .await
        .expect("Failed to take schema lock");
    (&mut *conn).execute(SCHEMA).await.expect("Failed to apply schema");
    sqlx::query("SELECT pg_advisory_unlock(73017)")
        .execute(&mut *conn)
        .await
        .expect("Failed to release schema lock");
    drop(conn);

    let organization_id = Uuid::new_v4();
    let api_key = format!("test_key_{}", organization_id.simple());

    // Compute hash in SQL to match what the auth middleware expects
    sqlx::query(
        r#"
        INSERT INTO api_keys (id, name, key_hash, organization_id, is_active)
        VALUES ($1, $2, encode(sha256($3::bytea), 'hex'), $4, TRUE)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind("Test Key")
    .bind(api_key.as_bytes())
    .bind(organization_id)
    .execute(&pool)
    .await
    .expect("Failed to seed API key");

    Some(TestDb {
        pool,
        organization_id,
        api_key,
    })
}

/// Seed an inactive key for the same organization
pub async fn seed_disabled_key(db: &TestDb) -> String {
    let api_key = format!("disabled_{}", Uuid::new_v4().simple());

    sqlx::query(
        r#"
        INSERT INTO api_keys (id, name, key_hash, organization_id, is_active)
        VALUES ($1, 'Disabled Key', encode(sha256($2::bytea), 'hex'), $3, FALSE)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(api_key.as_bytes())
    .bind(db.organization_id)
    .execute(&db.pool)
    .await
    .expect("Failed to seed disabled key");

    api_key
}
