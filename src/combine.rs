// 🔗 Combine and dedupe - merge variant streams into the final flatfile
// Collapses textual duplicates per property, joins classification codes
// and delivery point references, and enforces the no-loss guarantee

use crate::error::PipelineError;
use crate::variants::AddressVariant;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ============================================================================
// OUTPUT ROW
// ============================================================================

/// One row of the matcher-facing flatfile. Field order is the column
/// order; `address_concat` is the name the downstream matcher expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatfileRow {
    pub uprn: u64,
    pub postcode: String,
    pub address_concat: String,
    pub source: String,
    pub variant_label: String,
    pub is_primary: bool,
    pub classification_code: Option<String>,
    pub udprn: Option<u64>,
    pub logical_status: Option<u8>,
    pub official_flag: Option<String>,
    pub blpu_state: Option<u8>,
    pub postal_address_code: Option<String>,
    pub parent_uprn: Option<u64>,
    pub hierarchy_level: Option<String>,
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Key form for duplicate detection: internal whitespace collapsed to
/// single spaces, trimmed, uppercased. The stored text is untouched.
pub fn normalize_address(address: &str) -> String {
    address
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

// ============================================================================
// COMBINE
// ============================================================================

/// Merge all variant streams, drop duplicates per (uprn, normalized
/// text), join per-property lookups, and sort. Fails before anything is
/// written if the distinct UPRN count no longer matches the input.
pub fn combine_and_dedupe(
    variants: Vec<AddressVariant>,
    classifications: &HashMap<u64, String>,
    delivery_references: &HashMap<u64, u64>,
    expected_uprns: &HashSet<u64>,
) -> Result<Vec<FlatfileRow>, PipelineError> {
    let mut index: HashMap<(u64, String), usize> = HashMap::new();
    let mut kept: Vec<AddressVariant> = Vec::new();

    for variant in variants {
        let key = (variant.uprn, normalize_address(&variant.address));
        match index.get(&key) {
            Some(&slot) if dedupe_rank(&variant) < dedupe_rank(&kept[slot]) => {
                kept[slot] = variant;
            }
            Some(_) => {}
            None => {
                index.insert(key, kept.len());
                kept.push(variant);
            }
        }
    }

    let output_uprns: HashSet<u64> = kept.iter().map(|variant| variant.uprn).collect();
    if output_uprns.len() != expected_uprns.len() {
        return Err(PipelineError::IntegrityViolation {
            input_uprns: expected_uprns.len(),
            output_uprns: output_uprns.len(),
        });
    }

    kept.sort_by(|a, b| {
        (a.uprn, !a.is_primary, a.source.precedence(), &a.address).cmp(&(
            b.uprn,
            !b.is_primary,
            b.source.precedence(),
            &b.address,
        ))
    });

    let rows = kept
        .into_iter()
        .map(|variant| FlatfileRow {
            classification_code: classifications.get(&variant.uprn).cloned(),
            udprn: delivery_references.get(&variant.uprn).copied(),
            uprn: variant.uprn,
            postcode: variant.postcode,
            address_concat: variant.address,
            source: variant.source.name().to_string(),
            variant_label: variant.variant_label.name().to_string(),
            is_primary: variant.is_primary,
            logical_status: variant.logical_status.map(|status| status.code()),
            official_flag: variant.official_flag,
            blpu_state: variant.blpu_state,
            postal_address_code: variant.postal_address_code,
            parent_uprn: variant.parent_uprn,
            hierarchy_level: variant.hierarchy.map(|level| level.code().to_string()),
        })
        .collect();

    Ok(rows)
}

/// Duplicate winner: primary rows first, then source precedence, then
/// whichever arrived first.
fn dedupe_rank(variant: &AddressVariant) -> (u8, u8) {
    (u8::from(!variant.is_primary), variant.source.precedence())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::LogicalStatus;
    use crate::variants::{VariantLabel, VariantSource};

    fn create_test_variant(
        uprn: u64,
        address: &str,
        source: VariantSource,
        is_primary: bool,
    ) -> AddressVariant {
        let variant_label = match source {
            VariantSource::Lpi => VariantLabel::Approved,
            VariantSource::Organisation => VariantLabel::BusinessCurrent,
            VariantSource::DeliveryPoint => VariantLabel::Delivery,
            VariantSource::CustomLevel => VariantLabel::CustomLevel,
        };
        AddressVariant {
            uprn,
            postcode: "AB1 2CD".to_string(),
            address: address.to_string(),
            source,
            variant_label,
            is_primary,
            logical_status: Some(LogicalStatus::Approved),
            official_flag: None,
            blpu_state: None,
            postal_address_code: None,
            parent_uprn: None,
            hierarchy: None,
        }
    }

    fn no_lookups() -> (HashMap<u64, String>, HashMap<u64, u64>) {
        (HashMap::new(), HashMap::new())
    }

    #[test]
    fn test_primary_row_survives_deduplication() {
        let variants = vec![
            create_test_variant(100, "10 HIGH STREET AB1 2CD", VariantSource::DeliveryPoint, false),
            create_test_variant(100, "10 HIGH STREET AB1 2CD", VariantSource::Lpi, true),
        ];
        let (classifications, references) = no_lookups();
        let expected = HashSet::from([100]);

        let rows = combine_and_dedupe(variants, &classifications, &references, &expected)
            .expect("combine should succeed");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source, "LPI");
        assert!(rows[0].is_primary);
    }

    #[test]
    fn test_whitespace_and_case_collapse_into_one_row() {
        let variants = vec![
            create_test_variant(100, "10  high   street AB1 2CD", VariantSource::Lpi, true),
            create_test_variant(100, "10 HIGH STREET AB1 2CD", VariantSource::DeliveryPoint, false),
        ];
        let (classifications, references) = no_lookups();
        let expected = HashSet::from([100]);

        let rows = combine_and_dedupe(variants, &classifications, &references, &expected)
            .expect("combine should succeed");

        // The first-seen primary wins and keeps its original spelling
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].address_concat, "10  high   street AB1 2CD");
    }

    #[test]
    fn test_source_precedence_breaks_non_primary_ties() {
        let variants = vec![
            create_test_variant(100, "10 HIGH STREET AB1 2CD", VariantSource::CustomLevel, false),
            create_test_variant(100, "10 HIGH STREET AB1 2CD", VariantSource::Organisation, false),
        ];
        let (classifications, references) = no_lookups();
        let expected = HashSet::from([100]);

        let rows = combine_and_dedupe(variants, &classifications, &references, &expected)
            .expect("combine should succeed");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source, "ORGANISATION");
    }

    #[test]
    fn test_lookups_join_onto_every_row() {
        let variants = vec![
            create_test_variant(100, "10 HIGH STREET AB1 2CD", VariantSource::Lpi, true),
            create_test_variant(100, "ACME LTD 10 HIGH STREET AB1 2CD", VariantSource::Organisation, false),
        ];
        let classifications = HashMap::from([(100, "RD04".to_string())]);
        let references = HashMap::from([(100, 5001)]);
        let expected = HashSet::from([100]);

        let rows = combine_and_dedupe(variants, &classifications, &references, &expected)
            .expect("combine should succeed");

        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.classification_code.as_deref(), Some("RD04"));
            assert_eq!(row.udprn, Some(5001));
        }
    }

    #[test]
    fn test_lost_property_is_a_fatal_error() {
        let variants = vec![create_test_variant(
            100,
            "10 HIGH STREET AB1 2CD",
            VariantSource::Lpi,
            true,
        )];
        let (classifications, references) = no_lookups();
        let expected = HashSet::from([100, 200]);

        let result = combine_and_dedupe(variants, &classifications, &references, &expected);
        assert!(matches!(
            result,
            Err(PipelineError::IntegrityViolation {
                input_uprns: 2,
                output_uprns: 1,
            })
        ));
    }

    #[test]
    fn test_rows_sort_by_property_then_primary_then_source() {
        let variants = vec![
            create_test_variant(200, "20 LOW ROAD AB1 2CD", VariantSource::Lpi, true),
            create_test_variant(100, "CAFE 10 HIGH STREET AB1 2CD", VariantSource::Organisation, false),
            create_test_variant(100, "10 HIGH STREET AB1 2CD", VariantSource::Lpi, true),
        ];
        let (classifications, references) = no_lookups();
        let expected = HashSet::from([100, 200]);

        let rows = combine_and_dedupe(variants, &classifications, &references, &expected)
            .expect("combine should succeed");

        assert_eq!(rows[0].uprn, 100);
        assert!(rows[0].is_primary);
        assert_eq!(rows[1].uprn, 100);
        assert_eq!(rows[1].source, "ORGANISATION");
        assert_eq!(rows[2].uprn, 200);
    }

    #[test]
    fn test_normalize_address_collapses_and_uppercases() {
        assert_eq!(normalize_address("  10  High\tStreet "), "10 HIGH STREET");
        assert_eq!(normalize_address(""), "");
    }
}
