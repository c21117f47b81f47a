// 📑 Classification selection - one code per property
// Prefers the canonical scheme, then the freshest record

use crate::records::Classification;
use chrono::NaiveDate;
use std::cmp::Reverse;
use std::collections::HashMap;

pub const CANONICAL_SCHEME: &str = "AddressBase Premium Classification Scheme";

/// Pick a single classification code per property. Canonical-scheme
/// records beat others, then later end dates (an open interval never
/// expires), then later updates. First record wins remaining ties.
pub fn best_classifications(classifications: &[Classification]) -> HashMap<u64, String> {
    let mut best: HashMap<u64, (Preference, &str)> = HashMap::new();
    for classification in classifications {
        let candidate = preference(classification);
        match best.get(&classification.uprn) {
            Some((current, _)) if candidate >= *current => {}
            _ => {
                best.insert(
                    classification.uprn,
                    (candidate, classification.classification_code.as_str()),
                );
            }
        }
    }
    best.into_iter()
        .map(|(uprn, (_, code))| (uprn, code.to_string()))
        .collect()
}

type Preference = (u8, Reverse<NaiveDate>, Reverse<NaiveDate>);

fn preference(classification: &Classification) -> Preference {
    (
        u8::from(classification.class_scheme != CANONICAL_SCHEME),
        Reverse(classification.end_date.unwrap_or(NaiveDate::MAX)),
        Reverse(classification.last_update_date.unwrap_or(NaiveDate::MIN)),
    )
}

// ============================================================================
// TESTS
// ============================================================================
