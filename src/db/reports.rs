//! Read queries over reports and their identifying sub-records
//!
//! All searches join to `reports` and keep only live statuses
//! (PENDING, APPROVED); rejected, archived and merged reports never
//! participate in duplicate matching. The probe report itself is always
//! excluded.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::ChainType;

/// Perpetrator row matched by normalized phone or email equality
#[derive(Debug, Clone)]
pub struct PerpetratorHit {
    pub report_id: Uuid,
    pub phone_normalized: Option<String>,
    pub email_normalized: Option<String>,
}

/// Candidate perpetrator name for fuzzy matching
#[derive(Debug, Clone)]
pub struct NameCandidate {
    pub report_id: Uuid,
    pub full_name: String,
}

/// Identifying fields loaded from a report's sub-records
#[derive(Debug, Clone, Default)]
pub struct ReportIdentifiers {
    pub perpetrator_name: Option<String>,
    pub perpetrator_phone: Option<String>,
    pub perpetrator_email: Option<String>,
    pub iban: Option<String>,
    pub crypto_wallet: Option<String>,
    pub chain_type: ChainType,
}

fn parse_report_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))
}

/// Find perpetrators of live reports by normalized phone or email
pub async fn find_perpetrators_by_contact(
    pool: &SqlitePool,
    phone_normalized: Option<&str>,
    email_normalized: Option<&str>,
    exclude_report_id: Uuid,
    limit: u32,
) -> Result<Vec<PerpetratorHit>> {
    let rows: Vec<(String, Option<String>, Option<String>)> = sqlx::query_as(
        r#"
        SELECT p.report_id, p.phone_normalized, p.email_normalized
        FROM perpetrators p
        JOIN reports r ON r.id = p.report_id
        WHERE ((?1 IS NOT NULL AND p.phone_normalized = ?1)
            OR (?2 IS NOT NULL AND p.email_normalized = ?2))
          AND p.report_id != ?3
          AND r.status IN ('PENDING', 'APPROVED')
        LIMIT ?4
        "#,
    )
    .bind(phone_normalized)
    .bind(email_normalized)
    .bind(exclude_report_id.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(report_id, phone, email)| {
            Ok(PerpetratorHit {
                report_id: parse_report_id(&report_id)?,
                phone_normalized: phone,
                email_normalized: email,
            })
        })
        .collect()
}

/// Find live reports sharing a normalized IBAN
pub async fn find_reports_by_iban(
    pool: &SqlitePool,
    iban_normalized: &str,
    exclude_report_id: Uuid,
    limit: u32,
) -> Result<Vec<(Uuid, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT f.report_id, f.iban_normalized
        FROM financial_info f
        JOIN reports r ON r.id = f.report_id
        WHERE f.iban_normalized = ?1
          AND f.report_id != ?2
          AND r.status IN ('PENDING', 'APPROVED')
        LIMIT ?3
        "#,
    )
    .bind(iban_normalized)
    .bind(exclude_report_id.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(report_id, iban)| Ok((parse_report_id(&report_id)?, iban)))
        .collect()
}

/// Find live reports sharing a normalized crypto wallet address
pub async fn find_reports_by_wallet(
    pool: &SqlitePool,
    wallet_normalized: &str,
    exclude_report_id: Uuid,
    limit: u32,
) -> Result<Vec<(Uuid, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT c.report_id, c.wallet_normalized
        FROM crypto_info c
        JOIN reports r ON r.id = c.report_id
        WHERE c.wallet_normalized = ?1
          AND c.report_id != ?2
          AND r.status IN ('PENDING', 'APPROVED')
        LIMIT ?3
        "#,
    )
    .bind(wallet_normalized)
    .bind(exclude_report_id.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(report_id, wallet)| Ok((parse_report_id(&report_id)?, wallet)))
        .collect()
}

/// Load named perpetrators of live reports, bounded for the fuzzy scan
pub async fn find_name_candidates(
    pool: &SqlitePool,
    exclude_report_id: Uuid,
    limit: u32,
) -> Result<Vec<NameCandidate>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT p.report_id, p.full_name
        FROM perpetrators p
        JOIN reports r ON r.id = p.report_id
        WHERE p.full_name IS NOT NULL
          AND p.report_id != ?1
          AND r.status IN ('PENDING', 'APPROVED')
        LIMIT ?2
        "#,
    )
    .bind(exclude_report_id.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(report_id, full_name)| {
            Ok(NameCandidate {
                report_id: parse_report_id(&report_id)?,
                full_name,
            })
        })
        .collect()
}

/// Load a report's identifying fields from its sub-records
///
/// Takes the report's first perpetrator (if any), its financial info and
/// its crypto info. Returns `None` when the report does not exist.
pub async fn load_report_identifiers(
    pool: &SqlitePool,
    report_id: Uuid,
) -> Result<Option<ReportIdentifiers>> {
    let id_str = report_id.to_string();

    let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM reports WHERE id = ?")
        .bind(&id_str)
        .fetch_optional(pool)
        .await?;
    if exists.is_none() {
        return Ok(None);
    }

    let perpetrator: Option<(Option<String>, Option<String>, Option<String>)> = sqlx::query_as(
        "SELECT full_name, phone, email FROM perpetrators WHERE report_id = ? LIMIT 1",
    )
    .bind(&id_str)
    .fetch_optional(pool)
    .await?;

    let financial: Option<(Option<String>,)> =
        sqlx::query_as("SELECT iban FROM financial_info WHERE report_id = ? LIMIT 1")
            .bind(&id_str)
            .fetch_optional(pool)
            .await?;

    let crypto: Option<(Option<String>, Option<String>)> = sqlx::query_as(
        "SELECT wallet_address, blockchain FROM crypto_info WHERE report_id = ? LIMIT 1",
    )
    .bind(&id_str)
    .fetch_optional(pool)
    .await?;

    let mut identifiers = ReportIdentifiers::default();
    if let Some((full_name, phone, email)) = perpetrator {
        identifiers.perpetrator_name = full_name;
        identifiers.perpetrator_phone = phone;
        identifiers.perpetrator_email = email;
    }
    if let Some((iban,)) = financial {
        identifiers.iban = iban;
    }
    if let Some((wallet, blockchain)) = crypto {
        identifiers.crypto_wallet = wallet;
        identifiers.chain_type = blockchain
            .as_deref()
            .map(ChainType::from_label)
            .unwrap_or_default();
    }

    Ok(Some(identifiers))
}
