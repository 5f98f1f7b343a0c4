//! Database access for duplicate detection
//!
//! SQLite via sqlx. The detection engine only reads report data and
//! writes cluster rows; report lifecycle writes belong to the
//! surrounding application.

pub mod clusters;
pub mod reports;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Connects with mode=rwc (read, write, create) and ensures the tables
/// used by detection exist.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the report and cluster tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reports (
            id TEXT PRIMARY KEY,
            status TEXT NOT NULL DEFAULT 'PENDING',
            merged_into_id TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS perpetrators (
            id TEXT PRIMARY KEY,
            report_id TEXT NOT NULL REFERENCES reports(id),
            full_name TEXT,
            phone TEXT,
            email TEXT,
            phone_normalized TEXT,
            email_normalized TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS financial_info (
            id TEXT PRIMARY KEY,
            report_id TEXT NOT NULL REFERENCES reports(id),
            iban TEXT,
            iban_normalized TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS crypto_info (
            id TEXT PRIMARY KEY,
            report_id TEXT NOT NULL REFERENCES reports(id),
            wallet_address TEXT,
            wallet_normalized TEXT,
            blockchain TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS duplicate_clusters (
            id TEXT PRIMARY KEY,
            confidence REAL NOT NULL,
            match_type TEXT NOT NULL,
            matching_criteria TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS duplicate_cluster_reports (
            id TEXT PRIMARY KEY,
            cluster_id TEXT NOT NULL REFERENCES duplicate_clusters(id),
            report_id TEXT NOT NULL REFERENCES reports(id),
            similarity REAL NOT NULL,
            is_primary INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(cluster_id, report_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS duplicate_thresholds (
            id TEXT PRIMARY KEY,
            is_default INTEGER NOT NULL DEFAULT 0,
            levenshtein_max INTEGER NOT NULL,
            jaro_winkler_min REAL NOT NULL,
            ngram_jaccard_min REAL NOT NULL,
            vector_similarity_min REAL NOT NULL,
            image_hash_distance_max INTEGER NOT NULL,
            overall_confidence_min REAL NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Equality lookups on normalized identifiers drive exact matching
    for ddl in [
        "CREATE INDEX IF NOT EXISTS idx_perpetrators_phone_normalized ON perpetrators(phone_normalized)",
        "CREATE INDEX IF NOT EXISTS idx_perpetrators_email_normalized ON perpetrators(email_normalized)",
        "CREATE INDEX IF NOT EXISTS idx_financial_info_iban_normalized ON financial_info(iban_normalized)",
        "CREATE INDEX IF NOT EXISTS idx_crypto_info_wallet_normalized ON crypto_info(wallet_normalized)",
        "CREATE INDEX IF NOT EXISTS idx_cluster_reports_report_id ON duplicate_cluster_reports(report_id)",
    ] {
        sqlx::query(ddl).execute(pool).await?;
    }

    tracing::info!("Database tables initialized (reports, clusters, thresholds)");

    Ok(())
}
