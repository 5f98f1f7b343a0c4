//! Duplicate detection orchestration
//!
//! Pipeline for a submitted report: normalize identifying fields, run
//! exact-identifier and fuzzy-name searches, merge to one match per
//! report, then attach to an existing PENDING cluster or create a new
//! one. Detection is best-effort: storage errors propagate to the
//! caller, which logs and continues, because a failed detection must
//! never fail the report submission that triggered it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::{json, Map, Value};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::error::Result;
use crate::fuzzy::match_names;
use crate::normalize::{
    normalize_crypto_wallet, normalize_email, normalize_iban, normalize_phone,
};
use crate::thresholds::{load_thresholds, DetectionConfig, DuplicateThresholds, ThresholdProfile};
use crate::types::{DetectionInput, DetectionResult, DuplicateMatch, MatchType};

/// Minimum trimmed name length for the fuzzy phase to run
const MIN_NAME_LEN: usize = 3;

/// Duplicate detection service
pub struct DuplicateDetector {
    db: SqlitePool,
    config: DetectionConfig,
}

impl DuplicateDetector {
    /// Create a detector with default performance limits
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            config: DetectionConfig::default(),
        }
    }

    /// Create a detector with explicit performance limits
    pub fn with_config(db: SqlitePool, config: DetectionConfig) -> Self {
        Self { db, config }
    }

    /// Detect duplicates for a report using a named threshold profile
    pub async fn detect_duplicates(
        &self,
        input: &DetectionInput,
        profile: ThresholdProfile,
    ) -> Result<DetectionResult> {
        self.detect_with_thresholds(input, &profile.thresholds())
            .await
    }

    /// Detect duplicates using a stored threshold override
    ///
    /// Looks up the `duplicate_thresholds` row by id, or the is-default
    /// row when no id is given; falls back to the default profile when
    /// the override cannot be loaded.
    pub async fn detect_with_override(
        &self,
        input: &DetectionInput,
        config_id: Option<&str>,
    ) -> Result<DetectionResult> {
        let thresholds = load_thresholds(&self.db, config_id).await;
        self.detect_with_thresholds(input, &thresholds).await
    }

    /// Detect duplicates for a report with explicit thresholds
    ///
    /// **Algorithm:**
    /// 1. Normalize phone/email/IBAN/wallet independently; malformed
    ///    fields drop out of exact matching.
    /// 2. Exact-equality searches over live reports, similarity 1.0.
    /// 3. Fuzzy name scan when a usable name is present.
    /// 4. Merge to one match per report, highest similarity wins; exact
    ///    ties become `combined`.
    /// 5. Attach to an existing PENDING cluster or create a new one.
    pub async fn detect_with_thresholds(
        &self,
        input: &DetectionInput,
        thresholds: &DuplicateThresholds,
    ) -> Result<DetectionResult> {
        let phone = input.perpetrator_phone.as_deref().and_then(normalize_phone);
        let email = input.perpetrator_email.as_deref().and_then(normalize_email);
        let iban = input.iban.as_deref().and_then(normalize_iban);
        let wallet = input
            .crypto_wallet
            .as_deref()
            .and_then(|w| normalize_crypto_wallet(w, input.chain_type));

        tracing::debug!(
            report_id = %input.report_id,
            has_phone = phone.is_some(),
            has_email = email.is_some(),
            has_iban = iban.is_some(),
            has_wallet = wallet.is_some(),
            "Normalized identifying fields"
        );

        let mut matches: Vec<DuplicateMatch> = Vec::new();

        if phone.is_some() || email.is_some() {
            let hits = db::reports::find_perpetrators_by_contact(
                &self.db,
                phone.as_deref(),
                email.as_deref(),
                input.report_id,
                self.config.exact_match_limit,
            )
            .await?;

            for hit in hits {
                // Phone takes precedence when a row matches both fields
                let (match_type, key, value) = if phone.is_some()
                    && hit.phone_normalized == phone
                {
                    (
                        MatchType::ExactPhone,
                        "phone",
                        hit.phone_normalized.clone().unwrap_or_default(),
                    )
                } else if email.is_some() && hit.email_normalized == email {
                    (
                        MatchType::ExactEmail,
                        "email",
                        hit.email_normalized.clone().unwrap_or_default(),
                    )
                } else {
                    continue;
                };

                let mut details = Map::new();
                details.insert(key.to_string(), Value::String(value));
                matches.push(DuplicateMatch {
                    report_id: hit.report_id,
                    similarity: 1.0,
                    match_type,
                    match_details: details,
                });
            }
        }

        if let Some(iban) = &iban {
            let hits = db::reports::find_reports_by_iban(
                &self.db,
                iban,
                input.report_id,
                self.config.exact_match_limit,
            )
            .await?;

            for (report_id, matched_iban) in hits {
                let mut details = Map::new();
                details.insert("iban".to_string(), Value::String(matched_iban));
                matches.push(DuplicateMatch {
                    report_id,
                    similarity: 1.0,
                    match_type: MatchType::ExactIban,
                    match_details: details,
                });
            }
        }

        if let Some(wallet) = &wallet {
            let hits = db::reports::find_reports_by_wallet(
                &self.db,
                wallet,
                input.report_id,
                self.config.exact_match_limit,
            )
            .await?;

            for (report_id, matched_wallet) in hits {
                let mut details = Map::new();
                details.insert("wallet".to_string(), Value::String(matched_wallet));
                matches.push(DuplicateMatch {
                    report_id,
                    similarity: 1.0,
                    match_type: MatchType::ExactCrypto,
                    match_details: details,
                });
            }
        }

        if let Some(name) = input.perpetrator_name.as_deref() {
            if name.trim().chars().count() >= MIN_NAME_LEN {
                let fuzzy = self
                    .find_fuzzy_name_matches(name, input.report_id, thresholds)
                    .await?;
                matches.extend(fuzzy);
            }
        }

        let merged = merge_matches(matches);

        if merged.is_empty() {
            tracing::debug!(report_id = %input.report_id, "No duplicates found");
            return Ok(DetectionResult::empty());
        }

        let cluster_id = self
            .attach_or_create_cluster(input.report_id, &merged)
            .await?;

        Ok(DetectionResult {
            has_duplicates: true,
            cluster_id: Some(cluster_id),
            total_matches: merged.len(),
            matches: merged,
        })
    }

    /// Run detection for an already-persisted report
    ///
    /// Loads the report's perpetrator, financial and crypto sub-records
    /// and delegates to [`Self::detect_duplicates`] with the default
    /// profile. An unknown report id yields the empty result, not an
    /// error.
    pub async fn run_for_report(&self, report_id: Uuid) -> Result<DetectionResult> {
        let Some(fields) = db::reports::load_report_identifiers(&self.db, report_id).await? else {
            tracing::debug!(report_id = %report_id, "Report not found, skipping duplicate detection");
            return Ok(DetectionResult::empty());
        };

        let input = DetectionInput {
            report_id,
            perpetrator_name: fields.perpetrator_name,
            perpetrator_phone: fields.perpetrator_phone,
            perpetrator_email: fields.perpetrator_email,
            iban: fields.iban,
            crypto_wallet: fields.crypto_wallet,
            chain_type: fields.chain_type,
        };

        self.detect_duplicates(&input, ThresholdProfile::default())
            .await
    }

    /// Scan live-report names and keep consensus matches above the
    /// overall confidence floor
    async fn find_fuzzy_name_matches(
        &self,
        name: &str,
        exclude_report_id: Uuid,
        thresholds: &DuplicateThresholds,
    ) -> Result<Vec<DuplicateMatch>> {
        let deadline = Instant::now() + Duration::from_millis(self.config.timeout_ms);

        let candidates = db::reports::find_name_candidates(
            &self.db,
            exclude_report_id,
            self.config.max_candidates,
        )
        .await?;

        let mut matches = Vec::new();
        for candidate in candidates {
            if Instant::now() >= deadline {
                tracing::warn!(
                    report_id = %exclude_report_id,
                    timeout_ms = self.config.timeout_ms,
                    "Fuzzy matching budget exhausted, stopping candidate scan"
                );
                break;
            }

            let result = match_names(name, &candidate.full_name, thresholds);
            if result.is_match && result.confidence >= thresholds.overall_confidence_min {
                let mut details = Map::new();
                details.insert("input_name".to_string(), json!(name));
                details.insert("matched_name".to_string(), json!(candidate.full_name));
                details.insert(
                    "jaro_winkler".to_string(),
                    json!(result.methods.jaro_winkler.similarity),
                );
                details.insert("ngram".to_string(), json!(result.methods.ngram.similarity));
                details.insert(
                    "soundex_match".to_string(),
                    json!(result.methods.soundex.matched),
                );
                details.insert(
                    "metaphone".to_string(),
                    json!({
                        "code_a": result.methods.metaphone.code_a,
                        "code_b": result.methods.metaphone.code_b,
                    }),
                );

                matches.push(DuplicateMatch {
                    report_id: candidate.report_id,
                    similarity: result.confidence,
                    match_type: MatchType::FuzzyName,
                    match_details: details,
                });
            }
        }

        Ok(matches)
    }

    /// Join an existing PENDING cluster or create a new one
    async fn attach_or_create_cluster(
        &self,
        new_report_id: Uuid,
        matches: &[DuplicateMatch],
    ) -> Result<Uuid> {
        let matched_ids: Vec<Uuid> = matches.iter().map(|m| m.report_id).collect();
        let avg_similarity =
            matches.iter().map(|m| m.similarity).sum::<f64>() / matches.len() as f64;

        // Re-query at write time: a concurrent run may have clustered one
        // of these reports since the search phase
        if let Some(existing) = db::clusters::find_pending_cluster(&self.db, &matched_ids).await? {
            db::clusters::attach_report(&self.db, existing.cluster_id, new_report_id, avg_similarity)
                .await?;
            tracing::info!(
                cluster_id = %existing.cluster_id,
                report_id = %new_report_id,
                "Attached report to existing duplicate cluster"
            );
            return Ok(existing.cluster_id);
        }

        let matching_criteria = json!({
            "matches": matches
                .iter()
                .map(|m| {
                    json!({
                        "report_id": m.report_id,
                        "match_type": m.match_type,
                        "similarity": m.similarity,
                    })
                })
                .collect::<Vec<_>>(),
        });

        let cluster_id = db::clusters::create_cluster(
            &self.db,
            new_report_id,
            avg_similarity,
            matches[0].match_type,
            &matching_criteria,
            matches,
        )
        .await?;

        tracing::info!(
            cluster_id = %cluster_id,
            report_id = %new_report_id,
            matches = matches.len(),
            "Created duplicate cluster"
        );

        Ok(cluster_id)
    }
}

/// Collapse matches to one per report id
///
/// The highest similarity wins; an exact tie merges into the synthetic
/// `combined` type with the union of both detail maps. The result is
/// sorted by similarity descending, so the first entry is the top-ranked
/// match.
fn merge_matches(matches: Vec<DuplicateMatch>) -> Vec<DuplicateMatch> {
    let mut by_report: HashMap<Uuid, DuplicateMatch> = HashMap::new();

    for m in matches {
        match by_report.entry(m.report_id) {
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(m);
            }
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                if m.similarity > existing.similarity {
                    *existing = m;
                } else if m.similarity == existing.similarity {
                    existing.match_type = MatchType::Combined;
                    existing.match_details.extend(m.match_details);
                }
            }
        }
    }

    let mut merged: Vec<DuplicateMatch> = by_report.into_values().collect();
    merged.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    merged
}
