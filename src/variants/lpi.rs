// LPI variants - one per distinct base address

use crate::base::{BaseAddresses, LogicalStatus};
use crate::variants::{AddressVariant, VariantLabel, VariantSource};

/// Every distinct base address becomes a variant. Approved records are
/// the primary representation of their property; every other status is
/// a labelled non-primary variant.
pub fn render_lpi_variants(base: &BaseAddresses) -> Vec<AddressVariant> {
    base.distinct
        .iter()
        .map(|address| AddressVariant {
            uprn: address.uprn,
            postcode: address.postcode.clone(),
            address: address.base_address.clone(),
            source: VariantSource::Lpi,
            variant_label: VariantLabel::for_status(address.status),
            is_primary: address.status == LogicalStatus::Approved,
            logical_status: Some(address.status),
            official_flag: Some(address.official_flag.clone()),
            blpu_state: address.blpu_state,
            postal_address_code: Some(address.postal_address_code.clone()),
            parent_uprn: address.parent_uprn,
            hierarchy: Some(address.hierarchy),
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{BaseAddress, HierarchyLevel};

    fn create_test_base(uprn: u64, status: LogicalStatus, text: &str) -> BaseAddress {
        BaseAddress {
            uprn,
            base_address: text.to_string(),
            postcode: "AB1 2CD".to_string(),
            status,
            official_flag: "Y".to_string(),
            blpu_state: Some(2),
            postal_address_code: "D".to_string(),
            parent_uprn: None,
            hierarchy: HierarchyLevel::Standalone,
            level: String::new(),
            start_date: None,
            end_date: None,
            last_update_date: None,
        }
    }

    #[test]
    fn test_approved_becomes_primary() {
        let base = BaseAddresses {
            full: Vec::new(),
            distinct: vec![
                create_test_base(100, LogicalStatus::Approved, "10 HIGH STREET AB1 2CD"),
                create_test_base(100, LogicalStatus::Historical, "10A HIGH ST AB1 2CD"),
            ],
            best_current: Vec::new(),
        };

        let variants = render_lpi_variants(&base);

        assert_eq!(variants.len(), 2);
        assert!(variants[0].is_primary);
        assert_eq!(variants[0].variant_label, VariantLabel::Approved);
        assert!(!variants[1].is_primary);
        assert_eq!(variants[1].variant_label, VariantLabel::Historical);
    }

    #[test]
    fn test_metadata_is_carried_through() {
        let base = BaseAddresses {
            full: Vec::new(),
            distinct: vec![create_test_base(
                100,
                LogicalStatus::Alternative,
                "10 HIGH STREET AB1 2CD",
            )],
            best_current: Vec::new(),
        };

        let variants = render_lpi_variants(&base);

        assert_eq!(variants[0].source, VariantSource::Lpi);
        assert_eq!(variants[0].logical_status, Some(LogicalStatus::Alternative));
        assert_eq!(variants[0].official_flag.as_deref(), Some("Y"));
        assert_eq!(variants[0].hierarchy, Some(HierarchyLevel::Standalone));
    }
}
