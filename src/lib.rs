//! Duplicate fraud-report detection engine
//!
//! Decides whether a newly submitted report describes the same incident
//! or perpetrator as an existing one:
//! - deterministic exact matching on normalized identifiers (phone,
//!   email, IBAN, crypto wallet),
//! - probabilistic fuzzy name matching combining five string/phonetic
//!   algorithms into one consensus decision,
//! - grouping of matches into confidence-scored, persisted clusters for
//!   moderator review.
//!
//! The entry point is [`DuplicateDetector`]: call
//! [`DuplicateDetector::detect_duplicates`] with a report's identifying
//! fields, or [`DuplicateDetector::run_for_report`] to load the fields
//! from storage first.

pub mod db;
pub mod detector;
pub mod error;
pub mod fuzzy;
pub mod normalize;
pub mod thresholds;
pub mod types;

pub use detector::DuplicateDetector;
pub use error::{Error, Result};
pub use thresholds::{DetectionConfig, DuplicateThresholds, ThresholdProfile};
pub use types::{ChainType, DetectionInput, DetectionResult, DuplicateMatch, MatchType};
