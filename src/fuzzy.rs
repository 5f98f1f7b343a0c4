//! Fuzzy name matching for near-duplicate detection
//!
//! No single string metric is robust to every typo class: transpositions
//! favor Jaro-Winkler, insertions/deletions favor Levenshtein, phonetic
//! respellings favor Soundex. `match_names` therefore takes a majority
//! vote across the metrics, with a high-confidence escape hatch.
//!
//! Levenshtein and Jaro-Winkler come from the `strsim` crate; trigram
//! Jaccard, Soundex and Metaphone are implemented here.

use std::collections::HashSet;

use serde::Serialize;

use crate::thresholds::DuplicateThresholds;

/// Metric weights for the blended confidence score
const WEIGHT_LEVENSHTEIN: f64 = 0.3;
const WEIGHT_JARO_WINKLER: f64 = 0.3;
const WEIGHT_NGRAM: f64 = 0.3;
const WEIGHT_SOUNDEX: f64 = 0.1;

/// Confidence at which a pair matches regardless of individual votes
const CONFIDENCE_ESCAPE_HATCH: f64 = 0.85;

/// Jaccard coefficient over padded character trigrams
///
/// Both strings are lowercased and padded with two boundary spaces on
/// each side before extracting 3-grams. Returns 1.0 when both gram sets
/// are empty, 0.0 when only one is.
pub fn trigram_jaccard(a: &str, b: &str) -> f64 {
    ngram_jaccard(a, b, 3)
}

fn ngram_jaccard(a: &str, b: &str, n: usize) -> f64 {
    let grams_a = ngrams(&a.to_lowercase(), n);
    let grams_b = ngrams(&b.to_lowercase(), n);

    if grams_a.is_empty() && grams_b.is_empty() {
        return 1.0;
    }
    if grams_a.is_empty() || grams_b.is_empty() {
        return 0.0;
    }

    let intersection = grams_a.intersection(&grams_b).count();
    let union = grams_a.union(&grams_b).count();

    intersection as f64 / union as f64
}

fn ngrams(s: &str, n: usize) -> HashSet<String> {
    let pad = " ".repeat(n - 1);
    let padded: Vec<char> = format!("{pad}{s}{pad}").chars().collect();

    padded
        .windows(n)
        .map(|w| w.iter().collect::<String>())
        .collect()
}

/// Soundex phonetic code: first letter plus three digit classes
///
/// Vowels and H/W/Y carry no digit and reset repeat-suppression, so
/// consonants of the same class separated by a vowel encode twice.
/// Returns `"0000"` for input with no ASCII letters.
pub fn soundex(s: &str) -> String {
    let letters: Vec<char> = s
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase())
        .collect();

    if letters.is_empty() {
        return "0000".to_string();
    }

    let mut code = String::with_capacity(4);
    code.push(letters[0]);
    let mut prev = soundex_class(letters[0]);

    for &c in &letters[1..] {
        if code.len() >= 4 {
            break;
        }
        let class = soundex_class(c);
        if class == '0' {
            prev = '0';
            continue;
        }
        if class != prev {
            code.push(class);
            prev = class;
        }
    }

    while code.len() < 4 {
        code.push('0');
    }
    code
}

fn soundex_class(c: char) -> char {
    match c {
        'B' | 'F' | 'P' | 'V' => '1',
        'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => '2',
        'D' | 'T' => '3',
        'L' => '4',
        'M' | 'N' => '5',
        'R' => '6',
        _ => '0',
    }
}

/// Simplified Metaphone phonetic code
///
/// Collapses duplicate letters, then applies the English digraph and
/// letter substitution rules (CH→X, PH→F, TH→0, SH→X, silent GH,
/// silent post-vowel H, C→S before I/E, D→T, V→F, X→KS, Z→S; vowels
/// kept only at the start, W/Y kept only after a vowel, B silent after
/// a final M, K silent after C).
pub fn metaphone(s: &str) -> String {
    let letters: Vec<char> = s
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase())
        .collect();

    if letters.is_empty() {
        return String::new();
    }

    // Collapse runs of the same letter
    let mut dedup: Vec<char> = Vec::with_capacity(letters.len());
    for &c in &letters {
        if dedup.last() != Some(&c) {
            dedup.push(c);
        }
    }

    let mut out = String::new();
    let mut i = 0;
    while i < dedup.len() {
        let c = dedup[i];
        let next = dedup.get(i + 1).copied();
        let prev = if i > 0 { Some(dedup[i - 1]) } else { None };
        let prev_is_vowel = matches!(prev, Some('A' | 'E' | 'I' | 'O' | 'U'));

        match c {
            'A' | 'E' | 'I' | 'O' | 'U' => {
                if i == 0 {
                    out.push(c);
                }
            }
            'B' => {
                // Silent B after M at end of word (lamb, comb)
                if !(i == dedup.len() - 1 && prev == Some('M')) {
                    out.push('B');
                }
            }
            'C' => match next {
                Some('H') => {
                    out.push('X');
                    i += 1;
                }
                Some('I') | Some('E') => out.push('S'),
                _ => out.push('K'),
            },
            'D' => out.push('T'),
            'G' => {
                if next == Some('H') {
                    i += 1;
                }
                out.push('K');
            }
            'H' => {
                if !prev_is_vowel {
                    out.push('H');
                }
            }
            'K' => {
                if prev != Some('C') {
                    out.push('K');
                }
            }
            'P' => {
                if next == Some('H') {
                    out.push('F');
                    i += 1;
                } else {
                    out.push('P');
                }
            }
            'Q' => out.push('K'),
            'S' => {
                if next == Some('H') {
                    out.push('X');
                    i += 1;
                } else {
                    out.push('S');
                }
            }
            'T' => {
                if next == Some('H') {
                    out.push('0');
                    i += 1;
                } else {
                    out.push('T');
                }
            }
            'V' => out.push('F'),
            'W' | 'Y' => {
                if prev_is_vowel {
                    out.push(c);
                }
            }
            'X' => out.push_str("KS"),
            'Z' => out.push('S'),
            _ => out.push(c),
        }

        i += 1;
    }

    out
}

/// Levenshtein pass/fail check
#[derive(Debug, Clone, Serialize)]
pub struct DistanceCheck {
    pub distance: usize,
    pub threshold: usize,
    pub passed: bool,
}

/// Similarity-metric check against a minimum threshold
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityCheck {
    pub similarity: f64,
    pub threshold: f64,
    pub passed: bool,
}

/// Phonetic code equality check
#[derive(Debug, Clone, Serialize)]
pub struct PhoneticCheck {
    pub code_a: String,
    pub code_b: String,
    pub matched: bool,
}

/// Per-algorithm breakdown of one name comparison
#[derive(Debug, Clone, Serialize)]
pub struct MethodBreakdown {
    pub levenshtein: DistanceCheck,
    pub jaro_winkler: SimilarityCheck,
    pub ngram: SimilarityCheck,
    pub soundex: PhoneticCheck,
    pub metaphone: PhoneticCheck,
}

/// Consensus decision for one name pair
#[derive(Debug, Clone, Serialize)]
pub struct NameMatchResult {
    pub is_match: bool,
    /// Blended confidence in [0, 1]
    pub confidence: f64,
    pub methods: MethodBreakdown,
}

/// Compare two names with all metrics and combine into one decision
///
/// **Algorithm:**
/// 1. Lowercase + trim both names; identical strings short-circuit to
///    a full-confidence match.
/// 2. Levenshtein pass/fail uses an adaptive cutoff: ≤3 edits when the
///    longer string is at most 10 chars, else ≤5.
/// 3. Confidence = 0.3·normalized-Levenshtein + 0.3·Jaro-Winkler +
///    0.3·trigram-Jaccard + 0.1·Soundex-equality.
/// 4. Match when at least 2 of {Levenshtein, Jaro-Winkler, trigram}
///    pass, or Soundex agrees and at least 1 of the others passes, or
///    confidence reaches 0.85.
pub fn match_names(name_a: &str, name_b: &str, thresholds: &DuplicateThresholds) -> NameMatchResult {
    let a = name_a.trim().to_lowercase();
    let b = name_b.trim().to_lowercase();

    let soundex_a = soundex(&a);
    let soundex_b = soundex(&b);
    let metaphone_a = metaphone(&a);
    let metaphone_b = metaphone(&b);

    if a == b {
        return NameMatchResult {
            is_match: true,
            confidence: 1.0,
            methods: MethodBreakdown {
                levenshtein: DistanceCheck {
                    distance: 0,
                    threshold: 0,
                    passed: true,
                },
                jaro_winkler: SimilarityCheck {
                    similarity: 1.0,
                    threshold: thresholds.jaro_winkler_min,
                    passed: true,
                },
                ngram: SimilarityCheck {
                    similarity: 1.0,
                    threshold: thresholds.ngram_jaccard_min,
                    passed: true,
                },
                soundex: PhoneticCheck {
                    matched: soundex_a == soundex_b,
                    code_a: soundex_a,
                    code_b: soundex_b,
                },
                metaphone: PhoneticCheck {
                    matched: metaphone_a == metaphone_b,
                    code_a: metaphone_a,
                    code_b: metaphone_b,
                },
            },
        };
    }

    let max_len = a.chars().count().max(b.chars().count());
    // Adaptive cutoff: short names tolerate fewer edits
    let lev_threshold = if max_len <= 10 { 3 } else { 5 };

    let lev_distance = strsim::levenshtein(&a, &b);
    let jaro_winkler = strsim::jaro_winkler(&a, &b);
    let ngram = trigram_jaccard(&a, &b);

    let lev_passed = lev_distance <= lev_threshold;
    let jaro_passed = jaro_winkler >= thresholds.jaro_winkler_min;
    let ngram_passed = ngram >= thresholds.ngram_jaccard_min;
    let soundex_matched = soundex_a == soundex_b;
    let metaphone_matched = metaphone_a == metaphone_b;

    let lev_normalized = (1.0 - lev_distance as f64 / max_len as f64).max(0.0);

    let confidence = lev_normalized * WEIGHT_LEVENSHTEIN
        + jaro_winkler * WEIGHT_JARO_WINKLER
        + ngram * WEIGHT_NGRAM
        + if soundex_matched { WEIGHT_SOUNDEX } else { 0.0 };

    let passed_count = [lev_passed, jaro_passed, ngram_passed]
        .iter()
        .filter(|&&p| p)
        .count();
    let is_match = passed_count >= 2
        || (soundex_matched && passed_count >= 1)
        || confidence >= CONFIDENCE_ESCAPE_HATCH;

    NameMatchResult {
        is_match,
        confidence,
        methods: MethodBreakdown {
            levenshtein: DistanceCheck {
                distance: lev_distance,
                threshold: lev_threshold,
                passed: lev_passed,
            },
            jaro_winkler: SimilarityCheck {
                similarity: jaro_winkler,
                threshold: thresholds.jaro_winkler_min,
                passed: jaro_passed,
            },
            ngram: SimilarityCheck {
                similarity: ngram,
                threshold: thresholds.ngram_jaccard_min,
                passed: ngram_passed,
            },
            soundex: PhoneticCheck {
                matched: soundex_matched,
                code_a: soundex_a,
                code_b: soundex_b,
            },
            metaphone: PhoneticCheck {
                matched: metaphone_matched,
                code_a: metaphone_a,
                code_b: metaphone_b,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thresholds::ThresholdProfile;

    #[test]
    fn test_trigram_jaccard_identical() {
        assert_eq!(trigram_jaccard("john smith", "john smith"), 1.0);
    }

    #[test]
    fn test_trigram_jaccard_disjoint() {
        let sim = trigram_jaccard("aaaa", "zzzz");
        assert!(sim < 0.2, "expected near-zero, got {sim}");
    }

    #[test]
    fn test_trigram_jaccard_case_insensitive() {
        assert_eq!(trigram_jaccard("John", "JOHN"), 1.0);
    }

    #[test]
    fn test_soundex_codes() {
        assert_eq!(soundex("Robert"), "R163");
        assert_eq!(soundex("Rupert"), "R163");
        assert_eq!(soundex("Smith"), "S530");
        assert_eq!(soundex("Smyth"), "S530");
        assert_eq!(soundex(""), "0000");
        assert_eq!(soundex("123"), "0000");
    }

    #[test]
    fn test_soundex_vowel_resets_suppression() {
        // C and K share class 2; the vowel between them lets both encode
        assert_eq!(soundex("Cake"), "C200");
        assert_eq!(soundex("Ck"), "C000");
    }

    #[test]
    fn test_metaphone_digraphs() {
        assert_eq!(metaphone("Philip"), "FLP"); // PH -> F
        assert_eq!(metaphone("Thomas"), "0MS"); // TH -> 0
        assert_eq!(metaphone("Church"), "XRX"); // CH -> X
        assert_eq!(metaphone("Shane"), "XN"); // SH -> X
        assert_eq!(metaphone(""), "");
    }

    #[test]
    fn test_metaphone_collapses_duplicates() {
        assert_eq!(metaphone("Anna"), metaphone("Ana"));
    }

    #[test]
    fn test_match_names_identical() {
        let thresholds = ThresholdProfile::Default.thresholds();
        let result = match_names("John Smith", "John Smith", &thresholds);
        assert!(result.is_match);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_match_names_identical_after_normalization() {
        let thresholds = ThresholdProfile::Default.thresholds();
        let result = match_names("  JOHN SMITH ", "john smith", &thresholds);
        assert!(result.is_match);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_match_names_single_typo() {
        let thresholds = ThresholdProfile::Default.thresholds();
        let result = match_names("John Smith", "Jon Smith", &thresholds);
        assert!(result.is_match);
        assert!(
            result.confidence > 0.7 && result.confidence < 1.0,
            "confidence was {}",
            result.confidence
        );
        assert!(result.methods.levenshtein.passed);
        assert_eq!(result.methods.levenshtein.distance, 1);
    }

    #[test]
    fn test_match_names_unrelated() {
        let thresholds = ThresholdProfile::Default.thresholds();
        let result = match_names("Alice Brown", "Zed Johnson", &thresholds);
        assert!(!result.is_match);
        assert!(result.confidence < 0.5);
    }

    #[test]
    fn test_match_names_breakdown_populated() {
        let thresholds = ThresholdProfile::Default.thresholds();
        let result = match_names("Peter Novak", "Petr Novak", &thresholds);
        assert_eq!(result.methods.soundex.code_a.len(), 4);
        assert_eq!(result.methods.soundex.code_b.len(), 4);
        assert!(!result.methods.metaphone.code_a.is_empty());
    }

    #[test]
    fn test_profile_monotonicity() {
        // Anything strict accepts, default accepts; anything default
        // accepts, relaxed accepts.
        let strict = ThresholdProfile::Strict.thresholds();
        let default = ThresholdProfile::Default.thresholds();
        let relaxed = ThresholdProfile::Relaxed.thresholds();

        let pairs = [
            ("John Smith", "Jon Smith"),
            ("John Smith", "John Smyth"),
            ("Maria Kovacova", "Maria Kovac"),
            ("Alice Brown", "Zed Johnson"),
            ("Peter Novak", "Petra Novakova"),
        ];

        for (a, b) in pairs {
            let strict_match = match_names(a, b, &strict).is_match;
            let default_match = match_names(a, b, &default).is_match;
            let relaxed_match = match_names(a, b, &relaxed).is_match;

            if strict_match {
                assert!(default_match, "{a} / {b}: strict matched but default did not");
            }
            if default_match {
                assert!(relaxed_match, "{a} / {b}: default matched but relaxed did not");
            }
        }
    }
}
