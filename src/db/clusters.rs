//! Duplicate cluster persistence
//!
//! Clusters are durable aggregates: created on the first detected match
//! pair, grown when later reports match a member, confidence raised
//! monotonically. Members are never removed here; moderators resolve or
//! dismiss clusters elsewhere.

use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{DuplicateMatch, MatchType};

/// Existing PENDING cluster holding at least one of the given reports
#[derive(Debug, Clone, PartialEq)]
pub struct PendingClusterHit {
    pub cluster_id: Uuid,
    pub confidence: f64,
}

/// Find a PENDING cluster any of the matched reports already belongs to
///
/// Called again at write time: two concurrent runs matching the same
/// report both land in this lookup, and the loser of the race attaches
/// instead of creating a second cluster in most interleavings.
pub async fn find_pending_cluster(
    pool: &SqlitePool,
    report_ids: &[Uuid],
) -> Result<Option<PendingClusterHit>> {
    if report_ids.is_empty() {
        return Ok(None);
    }

    let placeholders = vec!["?"; report_ids.len()].join(", ");
    let sql = format!(
        r#"
        SELECT c.id, c.confidence
        FROM duplicate_cluster_reports dcr
        JOIN duplicate_clusters c ON c.id = dcr.cluster_id
        WHERE c.status = 'PENDING'
          AND dcr.report_id IN ({placeholders})
        LIMIT 1
        "#
    );

    let mut query = sqlx::query_as::<_, (String, f64)>(&sql);
    for report_id in report_ids {
        query = query.bind(report_id.to_string());
    }

    let row = query.fetch_optional(pool).await?;

    match row {
        None => Ok(None),
        Some((cluster_id, confidence)) => {
            let cluster_id = Uuid::parse_str(&cluster_id)
                .map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))?;
            Ok(Some(PendingClusterHit {
                cluster_id,
                confidence,
            }))
        }
    }
}

/// Attach a report to an existing cluster
///
/// Inserts a non-primary membership row and raises the cluster
/// confidence to `max(existing, similarity)` — confidence never
/// decreases.
pub async fn attach_report(
    pool: &SqlitePool,
    cluster_id: Uuid,
    report_id: Uuid,
    similarity: f64,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO duplicate_cluster_reports (id, cluster_id, report_id, similarity, is_primary)
        VALUES (?, ?, ?, ?, 0)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(cluster_id.to_string())
    .bind(report_id.to_string())
    .bind(similarity)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE duplicate_clusters
        SET confidence = MAX(confidence, ?), updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(similarity)
    .bind(cluster_id.to_string())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!(
        cluster_id = %cluster_id,
        report_id = %report_id,
        similarity = similarity,
        "Added report to cluster"
    );

    Ok(())
}

/// Create a new cluster from a detection run
///
/// Membership: the probe report (non-primary, similarity = the mean of
/// match similarities) plus every matched report at its own similarity,
/// the first one marked primary as the representative.
pub async fn create_cluster(
    pool: &SqlitePool,
    new_report_id: Uuid,
    avg_similarity: f64,
    match_type: MatchType,
    matching_criteria: &Value,
    matches: &[DuplicateMatch],
) -> Result<Uuid> {
    let cluster_id = Uuid::new_v4();
    let criteria_json = serde_json::to_string(matching_criteria)
        .map_err(|e| Error::Internal(format!("Failed to serialize matching criteria: {}", e)))?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO duplicate_clusters (id, confidence, match_type, matching_criteria, status)
        VALUES (?, ?, ?, ?, 'PENDING')
        "#,
    )
    .bind(cluster_id.to_string())
    .bind(avg_similarity)
    .bind(match_type.as_str())
    .bind(&criteria_json)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO duplicate_cluster_reports (id, cluster_id, report_id, similarity, is_primary)
        VALUES (?, ?, ?, ?, 0)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(cluster_id.to_string())
    .bind(new_report_id.to_string())
    .bind(avg_similarity)
    .execute(&mut *tx)
    .await?;

    for (index, m) in matches.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO duplicate_cluster_reports (id, cluster_id, report_id, similarity, is_primary)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(cluster_id.to_string())
        .bind(m.report_id.to_string())
        .bind(m.similarity)
        .bind(index == 0)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::debug!(
        cluster_id = %cluster_id,
        members = matches.len() + 1,
        confidence = avg_similarity,
        "Created duplicate cluster"
    );

    Ok(cluster_id)
}
