//! Database layer: schema initialization, persisted models and the store
//! contracts the ingestion workflow runs against.
//!
//! The store contracts are traits so tests can substitute in-memory fakes;
//! `PgStore` is the Postgres implementation used in production.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Row};
use tracing::info;

/// A registered sender, keyed by the messaging platform's stable user id.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct User {
    pub id: i64,
    pub telegram_id: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// One purchased item on a receipt, camelCase on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub name: String,
    pub price: f64,
    pub category: String,
}

/// A persisted receipt. Owned by exactly one user; never mutated or deleted
/// by the ingestion workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub id: i64,
    pub user_id: i64,
    pub store_name: String,
    pub transaction_date: Option<String>,
    pub total_amount: f64,
    pub currency: String,
    pub items: Vec<LineItem>,
    pub ai_summary: String,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for Receipt {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            store_name: row.try_get("store_name")?,
            transaction_date: row.try_get("transaction_date")?,
            total_amount: row.try_get("total_amount")?,
            currency: row.try_get("currency")?,
            items: row.try_get::<Json<Vec<LineItem>>, _>("items")?.0,
            ai_summary: row.try_get("ai_summary")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Normalized receipt fields before they have been persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReceipt {
    pub store_name: String,
    pub transaction_date: Option<String>,
    pub total_amount: f64,
    pub currency: String,
    pub items: Vec<LineItem>,
    pub ai_summary: String,
}

/// User lookup and registration.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>>;
    async fn create(&self, external_id: &str, display_name: &str) -> Result<User>;
}

/// Receipt persistence.
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    async fn insert(&self, user_id: i64, receipt: &NewReceipt) -> Result<Receipt>;
}

/// Initialize the database schema.
///
/// The unique index on `profiles.telegram_id` enforces one user record per
/// external identifier; a racing duplicate insert fails with a constraint
/// violation and surfaces as a user-resolution error.
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS profiles (
            id BIGSERIAL PRIMARY KEY,
            telegram_id TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create profiles table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS receipts (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL REFERENCES profiles(id),
            store_name TEXT NOT NULL,
            transaction_date TEXT,
            total_amount DOUBLE PRECISION NOT NULL,
            currency TEXT NOT NULL,
            items JSONB NOT NULL DEFAULT '[]',
            ai_summary TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create receipts table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS receipts_user_id_idx ON receipts(user_id)")
        .execute(pool)
        .await
        .context("Failed to create receipts user index")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Postgres-backed implementation of both store contracts.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, telegram_id, display_name, created_at
             FROM profiles WHERE telegram_id = $1",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up user")
    }

    async fn create(&self, external_id: &str, display_name: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO profiles (telegram_id, display_name)
             VALUES ($1, $2)
             RETURNING id, telegram_id, display_name, created_at",
        )
        .bind(external_id)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create user")?;

        info!(user_id = user.id, external_id = %external_id, "User created");
        Ok(user)
    }
}

#[async_trait]
impl ReceiptStore for PgStore {
    async fn insert(&self, user_id: i64, receipt: &NewReceipt) -> Result<Receipt> {
        let receipt = sqlx::query_as::<_, Receipt>(
            "INSERT INTO receipts
                 (user_id, store_name, transaction_date, total_amount, currency, items, ai_summary)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id, user_id, store_name, transaction_date, total_amount,
                       currency, items, ai_summary, created_at",
        )
        .bind(user_id)
        .bind(&receipt.store_name)
        .bind(&receipt.transaction_date)
        .bind(receipt.total_amount)
        .bind(&receipt.currency)
        .bind(Json(&receipt.items))
        .bind(&receipt.ai_summary)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert receipt")?;

        info!(receipt_id = receipt.id, user_id = user_id, "Receipt created");
        Ok(receipt)
    }
}
