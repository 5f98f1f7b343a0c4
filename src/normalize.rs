//! Normalization of unique identifiers for exact duplicate matching
//!
//! Every normalizer is a pure function returning the canonical form of an
//! identifier, or `None` when the raw value fails its shape validation.
//! `None` means "unusable for exact matching" — it is never treated as a
//! wildcard and never matches another `None`.

use crate::types::ChainType;

/// Normalize a phone number to a bare digit string
///
/// Strips all non-digit characters and one leading international `00`.
/// Fewer than 9 remaining digits is rejected as not a usable number.
///
/// `"+421 911 123 456"` and `"00421-911-123-456"` both normalize to
/// `"421911123456"`.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = digits.strip_prefix("00").unwrap_or(&digits);

    if digits.len() < 9 {
        return None;
    }

    Some(digits.to_string())
}

/// Normalize an email address to trimmed lowercase
///
/// Accepts only a `local@domain.tld` shape: no whitespace, exactly one
/// `@`, and a dot inside the domain with characters on both sides.
pub fn normalize_email(raw: &str) -> Option<String> {
    let trimmed = raw.trim().to_lowercase();
    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return None;
    }

    let (local, domain) = trimmed.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }

    // A dot strictly inside the domain (not first or last character)
    let has_inner_dot = domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i < domain.len() - 1);
    if !has_inner_dot {
        return None;
    }

    Some(trimmed)
}

/// Normalize an IBAN: strip whitespace, uppercase
///
/// `"SK31 1200 0000 1987 4263 7541"` normalizes to
/// `"SK3112000000198742637541"`. Shape is 2 letters + 2 digits + 1-30
/// alphanumerics; anything else is rejected.
pub fn normalize_iban(raw: &str) -> Option<String> {
    let normalized: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect();

    if !(5..=34).contains(&normalized.len()) {
        return None;
    }

    let chars: Vec<char> = normalized.chars().collect();
    let country_ok = chars[..2].iter().all(|c| c.is_ascii_uppercase());
    let check_ok = chars[2..4].iter().all(|c| c.is_ascii_digit());
    let rest_ok = chars[4..]
        .iter()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());

    if country_ok && check_ok && rest_ok {
        Some(normalized)
    } else {
        None
    }
}

/// Normalize a crypto wallet address for the given chain
///
/// - Ethereum addresses (`0x` + 40 hex) keep their original case because
///   the EIP-55 checksum is case-significant.
/// - Bitcoin addresses (legacy `1`/`3` base58 or `bc1` bech32) are shape
///   validated and lowercased.
/// - Unknown chains get trim + lowercase with no shape check.
pub fn normalize_crypto_wallet(raw: &str, chain: ChainType) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    match chain {
        ChainType::Eth => {
            let hex = trimmed.strip_prefix("0x")?;
            if hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
                Some(trimmed.to_string())
            } else {
                None
            }
        }
        ChainType::Btc => {
            if is_btc_legacy(trimmed) || is_btc_bech32(trimmed) {
                Some(trimmed.to_lowercase())
            } else {
                None
            }
        }
        ChainType::Other => Some(trimmed.to_lowercase()),
    }
}

fn is_btc_legacy(addr: &str) -> bool {
    let mut chars = addr.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };
    if first != '1' && first != '3' {
        return false;
    }
    let rest: Vec<char> = chars.collect();
    (25..=34).contains(&rest.len()) && rest.iter().all(|&c| is_base58(c))
}

fn is_btc_bech32(addr: &str) -> bool {
    match addr.strip_prefix("bc1") {
        Some(rest) => {
            (39..=59).contains(&rest.len())
                && rest
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        }
        None => false,
    }
}

/// Base58 alphabet: no 0, O, I, l
fn is_base58(c: char) -> bool {
    matches!(c, '1'..='9' | 'a'..='k' | 'm'..='z' | 'A'..='H' | 'J'..='N' | 'P'..='Z')
}

/// Normalize a license plate: strip spaces and dashes, uppercase
///
/// `"BA 123 XY"` and `"ba-123-xy"` both normalize to `"BA123XY"`.
pub fn normalize_license_plate(raw: &str) -> Option<String> {
    let normalized: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .collect();

    let shape_ok = (3..=10).contains(&normalized.len())
        && normalized
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());

    if shape_ok {
        Some(normalized)
    } else {
        None
    }
}

/// Normalize a VIN: strip whitespace, uppercase
///
/// A VIN is exactly 17 characters from `[A-Z0-9]` excluding I, O, Q.
pub fn normalize_vin(raw: &str) -> Option<String> {
    let normalized: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect();

    if normalized.len() != 17 {
        return None;
    }

    let shape_ok = normalized.chars().all(|c| {
        c.is_ascii_digit() || (c.is_ascii_uppercase() && !matches!(c, 'I' | 'O' | 'Q'))
    });

    if shape_ok {
        Some(normalized)
    } else {
        None
    }
}

/// Normalize a company registration number: strip whitespace and leading
/// zeros, digits only
pub fn normalize_company_id(raw: &str) -> Option<String> {
    let stripped: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let normalized = stripped.trim_start_matches('0');

    if !normalized.is_empty() && normalized.chars().all(|c| c.is_ascii_digit()) {
        Some(normalized.to_string())
    } else {
        None
    }
}

/// Raw identifying fields of a report, before normalization
#[derive(Debug, Clone, Default)]
pub struct RawIdentifiers {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub iban: Option<String>,
    pub crypto_wallet: Option<String>,
    pub chain_type: ChainType,
    pub license_plate: Option<String>,
    pub vin: Option<String>,
    pub company_id: Option<String>,
}

/// Canonical forms of all identifying fields
///
/// `None` fields were missing or malformed and take no part in exact
/// matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedFields {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub iban: Option<String>,
    pub crypto_wallet: Option<String>,
    pub license_plate: Option<String>,
    pub vin: Option<String>,
    pub company_id: Option<String>,
}

/// Normalize every identifying field of a report independently
///
/// One field's normalization failure never blocks the others.
pub fn normalize_all(raw: &RawIdentifiers) -> NormalizedFields {
    NormalizedFields {
        phone: raw.phone.as_deref().and_then(normalize_phone),
        email: raw.email.as_deref().and_then(normalize_email),
        iban: raw.iban.as_deref().and_then(normalize_iban),
        crypto_wallet: raw
            .crypto_wallet
            .as_deref()
            .and_then(|w| normalize_crypto_wallet(w, raw.chain_type)),
        license_plate: raw.license_plate.as_deref().and_then(normalize_license_plate),
        vin: raw.vin.as_deref().and_then(normalize_vin),
        company_id: raw.company_id.as_deref().and_then(normalize_company_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone_formats() {
        // Same canonical digits regardless of spacing, dashes, prefixes
        assert_eq!(
            normalize_phone("+421 911 123 456"),
            Some("421911123456".to_string())
        );
        assert_eq!(
            normalize_phone("00421-911-123-456"),
            Some("421911123456".to_string())
        );
        assert_eq!(
            normalize_phone("421911123456"),
            Some("421911123456".to_string())
        );
    }

    #[test]
    fn test_normalize_phone_too_short() {
        assert_eq!(normalize_phone("12345678"), None);
        assert_eq!(normalize_phone(""), None);
        assert_eq!(normalize_phone("abc"), None);
        // 00 prefix stripped before the length check
        assert_eq!(normalize_phone("001234567"), None);
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  John.Doe@Example.COM  "),
            Some("john.doe@example.com".to_string())
        );
        assert_eq!(normalize_email("not-an-email"), None);
        assert_eq!(normalize_email("a@b"), None);
        assert_eq!(normalize_email("a@.b"), None);
        assert_eq!(normalize_email("a b@example.com"), None);
        assert_eq!(normalize_email("a@@example.com"), None);
        assert_eq!(
            normalize_email("x@sub.example.co.uk"),
            Some("x@sub.example.co.uk".to_string())
        );
    }

    #[test]
    fn test_normalize_iban() {
        assert_eq!(
            normalize_iban("SK31 1200 0000 1987 4263 7541"),
            Some("SK3112000000198742637541".to_string())
        );
        assert_eq!(
            normalize_iban("sk3112000000198742637541"),
            Some("SK3112000000198742637541".to_string())
        );
        assert_eq!(normalize_iban("1234"), None);
        assert_eq!(normalize_iban("SKXX1200"), None);
        assert_eq!(normalize_iban(""), None);
    }

    #[test]
    fn test_normalize_crypto_wallet_eth() {
        let addr = "0xAb5801a7D398351b8bE11C439e05C5B3259aec9B";
        // Case preserved (EIP-55 checksum)
        assert_eq!(
            normalize_crypto_wallet(addr, ChainType::Eth),
            Some(addr.to_string())
        );
        assert_eq!(normalize_crypto_wallet("0x1234", ChainType::Eth), None);
        assert_eq!(
            normalize_crypto_wallet("Ab5801a7D398351b8bE11C439e05C5B3259aec9B", ChainType::Eth),
            None
        );
    }

    #[test]
    fn test_normalize_crypto_wallet_btc() {
        assert_eq!(
            normalize_crypto_wallet("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", ChainType::Btc),
            Some("1a1zp1ep5qgefi2dmptftl5slmv7divfna".to_string())
        );
        assert_eq!(
            normalize_crypto_wallet(
                "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq",
                ChainType::Btc
            ),
            Some("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq".to_string())
        );
        // 0, O, I, l are not base58
        assert_eq!(
            normalize_crypto_wallet("1A0zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", ChainType::Btc),
            None
        );
        assert_eq!(normalize_crypto_wallet("xyz", ChainType::Btc), None);
    }

    #[test]
    fn test_normalize_crypto_wallet_other() {
        // Unknown chain: trim + lowercase, no shape check
        assert_eq!(
            normalize_crypto_wallet("  SomeAddress123  ", ChainType::Other),
            Some("someaddress123".to_string())
        );
        assert_eq!(normalize_crypto_wallet("   ", ChainType::Other), None);
    }

    #[test]
    fn test_normalize_license_plate() {
        assert_eq!(
            normalize_license_plate("BA 123 XY"),
            Some("BA123XY".to_string())
        );
        assert_eq!(
            normalize_license_plate("ba-123-xy"),
            Some("BA123XY".to_string())
        );
        assert_eq!(normalize_license_plate("A1"), None);
        assert_eq!(normalize_license_plate("ABCDEFGHIJK"), None);
    }

    #[test]
    fn test_normalize_vin() {
        assert_eq!(
            normalize_vin("1hgbh41jxmn109186"),
            Some("1HGBH41JXMN109186".to_string())
        );
        assert_eq!(normalize_vin("1HGBH41JXMN10918"), None); // 16 chars
        assert_eq!(normalize_vin("IHGBH41JXMN109186"), None); // contains I
    }

    #[test]
    fn test_normalize_company_id() {
        assert_eq!(normalize_company_id("0012345678"), Some("12345678".to_string()));
        assert_eq!(normalize_company_id("12 345 678"), Some("12345678".to_string()));
        assert_eq!(normalize_company_id("12345X"), None);
        assert_eq!(normalize_company_id("000"), None);
    }

    #[test]
    fn test_idempotence() {
        // Re-normalizing a canonical value is a no-op, for every normalizer
        let cases: Vec<(fn(&str) -> Option<String>, &str)> = vec![
            (normalize_phone, "+421 911 123 456"),
            (normalize_email, "  John.Doe@Example.COM  "),
            (normalize_iban, "SK31 1200 0000 1987 4263 7541"),
            (normalize_license_plate, "BA 123 XY"),
            (normalize_vin, "1hgbh41jxmn109186"),
            (normalize_company_id, "0012345678"),
        ];
        for (f, raw) in cases {
            let once = f(raw).unwrap();
            assert_eq!(f(&once), Some(once.clone()), "not idempotent for {raw:?}");
        }

        for chain in [ChainType::Btc, ChainType::Eth, ChainType::Other] {
            let raw = match chain {
                ChainType::Btc => "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq",
                ChainType::Eth => "0xAb5801a7D398351b8bE11C439e05C5B3259aec9B",
                ChainType::Other => "  Whatever123  ",
            };
            let once = normalize_crypto_wallet(raw, chain).unwrap();
            assert_eq!(normalize_crypto_wallet(&once, chain), Some(once.clone()));
        }
    }

    #[test]
    fn test_normalize_all_independent_fields() {
        let raw = RawIdentifiers {
            phone: Some("bad".to_string()),
            email: Some("john@example.com".to_string()),
            iban: Some("SK31 1200 0000 1987 4263 7541".to_string()),
            ..Default::default()
        };
        let fields = normalize_all(&raw);
        // One field failing does not block the others
        assert_eq!(fields.phone, None);
        assert_eq!(fields.email, Some("john@example.com".to_string()));
        assert_eq!(
            fields.iban,
            Some("SK3112000000198742637541".to_string())
        );
        assert_eq!(fields.vin, None);
    }
}
