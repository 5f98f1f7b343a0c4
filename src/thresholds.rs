//! Threshold profiles and detection configuration
//!
//! Three named, immutable parameter bundles trade precision against
//! recall, with an optional override persisted in the
//! `duplicate_thresholds` table for tuning without redeploys.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Similarity cutoffs for one detection run
///
/// Read-only for the duration of a run. `vector_similarity_min` and
/// `image_hash_distance_max` are reserved for embedding and image-hash
/// comparators that are not implemented; they are carried so stored
/// override rows round-trip intact, but no comparator reads them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DuplicateThresholds {
    /// Max edit distance guideline; the live cutoff is adaptive (≤3 for
    /// short names, ≤5 for long ones)
    pub levenshtein_max: u32,
    /// Min Jaro-Winkler similarity (0-1)
    pub jaro_winkler_min: f64,
    /// Min trigram Jaccard coefficient (0-1)
    pub ngram_jaccard_min: f64,
    /// Min cosine similarity for embeddings (reserved, unused)
    pub vector_similarity_min: f64,
    /// Max Hamming distance for image hashes (reserved, unused)
    pub image_hash_distance_max: u32,
    /// Min confidence for a fuzzy match to count as a duplicate (0-1)
    pub overall_confidence_min: f64,
}

/// Balanced thresholds, ~80% precision / ~70% recall
pub const DEFAULT_THRESHOLDS: DuplicateThresholds = DuplicateThresholds {
    levenshtein_max: 5,
    jaro_winkler_min: 0.85,
    ngram_jaccard_min: 0.70,
    vector_similarity_min: 0.85,
    image_hash_distance_max: 10,
    overall_confidence_min: 0.75,
};

/// High-precision thresholds, ~95% precision / ~50% recall
///
/// Use where false positives are costly, e.g. auto-merge without review.
pub const STRICT_THRESHOLDS: DuplicateThresholds = DuplicateThresholds {
    levenshtein_max: 3,
    jaro_winkler_min: 0.90,
    ngram_jaccard_min: 0.80,
    vector_similarity_min: 0.90,
    image_hash_distance_max: 8,
    overall_confidence_min: 0.85,
};

/// High-recall thresholds, ~60% precision / ~90% recall
///
/// Use when every flagged cluster gets human review.
pub const RELAXED_THRESHOLDS: DuplicateThresholds = DuplicateThresholds {
    levenshtein_max: 7,
    jaro_winkler_min: 0.75,
    ngram_jaccard_min: 0.60,
    vector_similarity_min: 0.75,
    image_hash_distance_max: 15,
    overall_confidence_min: 0.60,
};

/// Named threshold profile selecting the precision/recall tradeoff
///
/// Passed explicitly through the call chain so each detection run stays
/// independently reproducible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdProfile {
    #[default]
    Default,
    Strict,
    Relaxed,
}

impl ThresholdProfile {
    /// Resolve the profile to its parameter bundle
    pub fn thresholds(self) -> DuplicateThresholds {
        match self {
            ThresholdProfile::Default => DEFAULT_THRESHOLDS,
            ThresholdProfile::Strict => STRICT_THRESHOLDS,
            ThresholdProfile::Relaxed => RELAXED_THRESHOLDS,
        }
    }
}

/// Load a threshold override from the database
///
/// Looks up a `duplicate_thresholds` row by explicit id, or the
/// `is_default` row when no id is given. Any query error or missing row
/// falls back to [`DEFAULT_THRESHOLDS`] — configuration failure must
/// never abort a detection run.
pub async fn load_thresholds(pool: &SqlitePool, config_id: Option<&str>) -> DuplicateThresholds {
    match try_load(pool, config_id).await {
        Ok(Some(thresholds)) => thresholds,
        Ok(None) => {
            tracing::debug!(config_id = ?config_id, "No threshold override found, using defaults");
            DEFAULT_THRESHOLDS
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load threshold override, using defaults");
            DEFAULT_THRESHOLDS
        }
    }
}

async fn try_load(
    pool: &SqlitePool,
    config_id: Option<&str>,
) -> sqlx::Result<Option<DuplicateThresholds>> {
    const COLUMNS: &str = "levenshtein_max, jaro_winkler_min, ngram_jaccard_min, \
         vector_similarity_min, image_hash_distance_max, overall_confidence_min";

    let row: Option<(i64, f64, f64, f64, i64, f64)> = match config_id {
        Some(id) => {
            let sql = format!("SELECT {COLUMNS} FROM duplicate_thresholds WHERE id = ?");
            sqlx::query_as(&sql).bind(id).fetch_optional(pool).await?
        }
        None => {
            let sql =
                format!("SELECT {COLUMNS} FROM duplicate_thresholds WHERE is_default = 1 LIMIT 1");
            sqlx::query_as(&sql).fetch_optional(pool).await?
        }
    };

    Ok(row.map(
        |(lev, jaro, ngram, vector, image, confidence)| DuplicateThresholds {
            levenshtein_max: lev as u32,
            jaro_winkler_min: jaro,
            ngram_jaccard_min: ngram,
            vector_similarity_min: vector,
            image_hash_distance_max: image as u32,
            overall_confidence_min: confidence,
        },
    ))
}

/// Performance limits for one detection run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionConfig {
    /// Max rows per exact-match query
    pub exact_match_limit: u32,
    /// Max candidate names scanned by the fuzzy phase
    pub max_candidates: u32,
    /// Wall-clock budget for the fuzzy phase
    pub timeout_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            exact_match_limit: 50,
            max_candidates: 100,
            timeout_ms: 30_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_resolution() {
        assert_eq!(ThresholdProfile::Default.thresholds(), DEFAULT_THRESHOLDS);
        assert_eq!(ThresholdProfile::Strict.thresholds(), STRICT_THRESHOLDS);
        assert_eq!(ThresholdProfile::Relaxed.thresholds(), RELAXED_THRESHOLDS);
    }

    #[test]
    fn test_strict_is_tighter_than_default_than_relaxed() {
        assert!(STRICT_THRESHOLDS.jaro_winkler_min > DEFAULT_THRESHOLDS.jaro_winkler_min);
        assert!(DEFAULT_THRESHOLDS.jaro_winkler_min > RELAXED_THRESHOLDS.jaro_winkler_min);
        assert!(STRICT_THRESHOLDS.ngram_jaccard_min > DEFAULT_THRESHOLDS.ngram_jaccard_min);
        assert!(DEFAULT_THRESHOLDS.ngram_jaccard_min > RELAXED_THRESHOLDS.ngram_jaccard_min);
        assert!(
            STRICT_THRESHOLDS.overall_confidence_min > DEFAULT_THRESHOLDS.overall_confidence_min
        );
        assert!(
            DEFAULT_THRESHOLDS.overall_confidence_min > RELAXED_THRESHOLDS.overall_confidence_min
        );
    }

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        pool
    }

    async fn insert_threshold_row(pool: &SqlitePool, id: &str, is_default: bool, jaro: f64) {
        sqlx::query(
            r#"
            INSERT INTO duplicate_thresholds (
                id, is_default, levenshtein_max, jaro_winkler_min, ngram_jaccard_min,
                vector_similarity_min, image_hash_distance_max, overall_confidence_min
            ) VALUES (?, ?, 4, ?, 0.65, 0.80, 12, 0.70)
            "#,
        )
        .bind(id)
        .bind(is_default)
        .bind(jaro)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_load_thresholds_by_id() {
        let pool = setup_test_db().await;
        insert_threshold_row(&pool, "experiment-a", false, 0.88).await;

        let thresholds = load_thresholds(&pool, Some("experiment-a")).await;
        assert_eq!(thresholds.jaro_winkler_min, 0.88);
        assert_eq!(thresholds.levenshtein_max, 4);
        assert_eq!(thresholds.overall_confidence_min, 0.70);
    }

    #[tokio::test]
    async fn test_load_thresholds_default_flag() {
        let pool = setup_test_db().await;
        insert_threshold_row(&pool, "tuned", true, 0.82).await;

        let thresholds = load_thresholds(&pool, None).await;
        assert_eq!(thresholds.jaro_winkler_min, 0.82);
    }

    #[tokio::test]
    async fn test_load_thresholds_missing_row_falls_back() {
        let pool = setup_test_db().await;

        let thresholds = load_thresholds(&pool, Some("nonexistent")).await;
        assert_eq!(thresholds, DEFAULT_THRESHOLDS);

        let thresholds = load_thresholds(&pool, None).await;
        assert_eq!(thresholds, DEFAULT_THRESHOLDS);
    }

    #[tokio::test]
    async fn test_load_thresholds_query_error_falls_back() {
        // Pool without any tables: the query fails, the fallback holds
        let pool = SqlitePool::connect(":memory:").await.unwrap();

        let thresholds = load_thresholds(&pool, None).await;
        assert_eq!(thresholds, DEFAULT_THRESHOLDS);
    }
}
