//! Shared value types for duplicate detection
//!
//! Inputs, per-run match records, and the result shape returned to the
//! report-creation workflow.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Blockchain family of a crypto wallet address
///
/// Controls which shape validation applies during normalization. `Other`
/// falls back to trim + lowercase with no shape check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChainType {
    Btc,
    Eth,
    #[default]
    Other,
}

impl ChainType {
    /// Parse a stored blockchain label; unknown values fall back to `Other`
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_uppercase().as_str() {
            "BTC" => ChainType::Btc,
            "ETH" => ChainType::Eth,
            _ => ChainType::Other,
        }
    }
}

/// How a candidate report matched the probe report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    ExactPhone,
    ExactEmail,
    ExactIban,
    ExactCrypto,
    FuzzyName,
    /// Synthetic type for equal-similarity matches on more than one signal
    Combined,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::ExactPhone => "exact_phone",
            MatchType::ExactEmail => "exact_email",
            MatchType::ExactIban => "exact_iban",
            MatchType::ExactCrypto => "exact_crypto",
            MatchType::FuzzyName => "fuzzy_name",
            MatchType::Combined => "combined",
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single matched report within one detection run
///
/// Exact matches carry similarity 1.0; fuzzy matches carry the consensus
/// confidence of the name comparison.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateMatch {
    /// Matched report UUID
    pub report_id: Uuid,
    /// Similarity in [0, 1]
    pub similarity: f64,
    /// Strongest signal that produced this match
    pub match_type: MatchType,
    /// Structured justification (matched values, metric breakdown)
    pub match_details: Map<String, Value>,
}

/// Outcome of a detection run
#[derive(Debug, Clone, Serialize)]
pub struct DetectionResult {
    pub has_duplicates: bool,
    /// Cluster the probe report was attached to, if any match was found
    pub cluster_id: Option<Uuid>,
    /// Merged matches, one per report, sorted by similarity descending
    pub matches: Vec<DuplicateMatch>,
    pub total_matches: usize,
}

impl DetectionResult {
    /// The "unique report" outcome
    pub fn empty() -> Self {
        Self {
            has_duplicates: false,
            cluster_id: None,
            matches: Vec::new(),
            total_matches: 0,
        }
    }
}

/// Identifying fields of the report being checked for duplicates
///
/// All fields except `report_id` are optional raw values; normalization
/// happens inside the detector and a malformed field is simply excluded
/// from exact matching.
#[derive(Debug, Clone, Default)]
pub struct DetectionInput {
    pub report_id: Uuid,
    pub perpetrator_name: Option<String>,
    pub perpetrator_phone: Option<String>,
    pub perpetrator_email: Option<String>,
    pub iban: Option<String>,
    pub crypto_wallet: Option<String>,
    pub chain_type: ChainType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_type_from_label() {
        assert_eq!(ChainType::from_label("BTC"), ChainType::Btc);
        assert_eq!(ChainType::from_label("eth"), ChainType::Eth);
        assert_eq!(ChainType::from_label("SOL"), ChainType::Other);
        assert_eq!(ChainType::from_label(""), ChainType::Other);
    }

    #[test]
    fn test_match_type_serialization() {
        let json = serde_json::to_string(&MatchType::ExactIban).unwrap();
        assert_eq!(json, "\"exact_iban\"");
        assert_eq!(MatchType::Combined.as_str(), "combined");
    }
}
