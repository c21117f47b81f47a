// 📮 Delivery point variants - Royal Mail style address renderings
// Every postcoded delivery point record becomes a variant; a separate
// best-record pass picks the delivery point reference per property

use crate::format::join_nonempty;
use crate::records::DeliveryPoint;
use crate::variants::{AddressVariant, VariantLabel, VariantSource};
use chrono::NaiveDate;
use std::cmp::Reverse;
use std::collections::HashMap;

// ============================================================================
// GENERATOR
// ============================================================================

pub fn render_delivery_variants(delivery_points: &[DeliveryPoint]) -> Vec<AddressVariant> {
    let mut variants = Vec::new();
    for point in delivery_points {
        if point.postcode.trim().is_empty() {
            continue;
        }
        variants.push(AddressVariant {
            uprn: point.uprn,
            postcode: point.postcode.trim().to_string(),
            address: render_delivery_address(point),
            source: VariantSource::DeliveryPoint,
            variant_label: VariantLabel::Delivery,
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

/// Premises first, then the thoroughfare and locality chain, postcode last.
fn render_delivery_address(point: &DeliveryPoint) -> String {
    let premises = join_nonempty(&[
        point.department_name.trim(),
        point.organisation_name.trim(),
        point.sub_building_name.trim(),
        point.building_name.trim(),
        point.building_number.trim(),
    ]);
    join_nonempty(&[
        &premises,
        point.dependent_thoroughfare.trim(),
        point.thoroughfare.trim(),
        point.double_dependent_locality.trim(),
        point.dependent_locality.trim(),
        point.post_town.trim(),
        point.postcode.trim(),
    ])
}

// ============================================================================
// BEST RECORD SELECTION
// ============================================================================

/// Map each property to the delivery point reference of its best record:
/// latest end date (an open interval never expires), then latest update.
pub fn best_delivery_references(delivery_points: &[DeliveryPoint]) -> HashMap<u64, u64> {
    let mut best: HashMap<u64, (Preference, u64)> = HashMap::new();
    for point in delivery_points {
        let udprn = match point.udprn {
            Some(udprn) => udprn,
            None => continue,
        };
        let candidate = preference(point);
        match best.get(&point.uprn) {
            Some((current, _)) if candidate >= *current => {}
            _ => {
                best.insert(point.uprn, (candidate, udprn));
            }
        }
    }
    best.into_iter().map(|(uprn, (_, udprn))| (uprn, udprn)).collect()
}

type Preference = (Reverse<NaiveDate>, Reverse<NaiveDate>);

fn preference(point: &DeliveryPoint) -> Preference {
    (
        Reverse(point.end_date.unwrap_or(NaiveDate::MAX)),
        Reverse(point.last_update_date.unwrap_or(NaiveDate::MIN)),
    )
}

// ============================================================================
// TESTS
// ============================================================================
