// 🛣️ Street Resolver - Best descriptor per street and language
// Lookup prefers the caller's language, then falls back to the best
// descriptor in any language as a whole row

use crate::records::StreetDescriptor;
use chrono::NaiveDate;
use std::collections::HashMap;

// ============================================================================
// RESOLVED STREET NAMES
// ============================================================================

/// The street-level text attached to a base address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreetNames {
    pub street_description: String,
    pub locality: String,
    pub town_name: String,
}

impl StreetNames {
    fn from_descriptor(descriptor: &StreetDescriptor) -> Self {
        StreetNames {
            street_description: descriptor.street_description.clone(),
            locality: descriptor.locality.clone(),
            town_name: descriptor.town_name.clone(),
        }
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

pub struct ResolvedStreets {
    by_language: HashMap<(u64, String), StreetNames>,
    any_language: HashMap<u64, StreetNames>,
}

impl ResolvedStreets {
    /// Pick the best descriptor per (usrn, language) and per usrn overall.
    ///
    /// "Best" orders by validity end date (an open interval never expires,
    /// so it sorts first) and then by most recent update. Ties keep the
    /// first record seen, so resolution is stable for a given input order.
    pub fn resolve(descriptors: &[StreetDescriptor]) -> Self {
        let mut best_by_language: HashMap<(u64, String), &StreetDescriptor> = HashMap::new();
        let mut best_any: HashMap<u64, &StreetDescriptor> = HashMap::new();

        for descriptor in descriptors {
            let key = (descriptor.usrn, descriptor.language.clone());
            match best_by_language.get(&key) {
                Some(current) if freshness(descriptor) <= freshness(current) => {}
                _ => {
                    best_by_language.insert(key, descriptor);
                }
            }

            match best_any.get(&descriptor.usrn) {
                Some(current) if freshness(descriptor) <= freshness(current) => {}
                _ => {
                    best_any.insert(descriptor.usrn, descriptor);
                }
            }
        }

        ResolvedStreets {
            by_language: best_by_language
                .into_iter()
                .map(|(key, descriptor)| (key, StreetNames::from_descriptor(descriptor)))
                .collect(),
            any_language: best_any
                .into_iter()
                .map(|(usrn, descriptor)| (usrn, StreetNames::from_descriptor(descriptor)))
                .collect(),
        }
    }

    /// Resolve street text for a property record: same language first,
    /// then the any-language best.
    pub fn lookup(&self, usrn: u64, language: &str) -> Option<&StreetNames> {
        self.by_language
            .get(&(usrn, language.to_string()))
            .or_else(|| self.any_language.get(&usrn))
    }
}

fn freshness(descriptor: &StreetDescriptor) -> (NaiveDate, NaiveDate) {
    (
        descriptor.end_date.unwrap_or(NaiveDate::MAX),
        descriptor.last_update_date.unwrap_or(NaiveDate::MIN),
    )
}

// ============================================================================
// TESTS
// ============================================================================
