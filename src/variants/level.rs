// 🏗️ Level variants - floor words prefixed onto base addresses
// A numeric level like "2" becomes "SECOND 10 HIGH STREET"; only
// floors -1 through 6 are recognised

use crate::base::BaseAddresses;
use crate::variants::{AddressVariant, VariantLabel, VariantSource};

// ============================================================================
// GENERATOR
// ============================================================================

pub fn render_level_variants(base: &BaseAddresses) -> Vec<AddressVariant> {
    let mut variants = Vec::new();
    for address in &base.full {
        if address.base_address.is_empty() {
            continue;
        }
        let number = match parse_level_token(&address.level) {
            Some(number) => number,
            None => continue,
        };
        let word = match level_word(number) {
            Some(word) => word,
            None => continue,
        };
        // Floor-level rows carry no property metadata
        variants.push(AddressVariant {
            uprn: address.uprn,
            postcode: address.postcode.clone(),
            address: format!("{} {}", word, address.base_address),
            source: VariantSource::CustomLevel,
            variant_label: VariantLabel::CustomLevel,
            is_primary: false,
            logical_status: None,
            official_flag: None,
            blpu_state: None,
            postal_address_code: None,
            parent_uprn: None,
            hierarchy: None,
        });
    }
    variants
}

// ============================================================================
// LEVEL PARSING
// ============================================================================

/// First comma-separated token of the raw level field, accepted only if
/// it is entirely an optionally-signed integer. No whitespace trimming:
/// " 2" is free text, not a floor number.
fn parse_level_token(level: &str) -> Option<i64> {
    let token = level.split(',').next()?;
    let digits = token.strip_prefix('-').unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn level_word(number: i64) -> Option<&'static str> {
    match number {
        -1 => Some("BASEMENT"),
        0 => Some("GROUND"),
        1 => Some("FIRST"),
        2 => Some("SECOND"),
        3 => Some("THIRD"),
        4 => Some("FOURTH"),
        5 => Some("FIFTH"),
        6 => Some("SIXTH"),
        _ => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================
