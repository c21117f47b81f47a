// 🏢 Organisation variants - business names joined to base addresses
// Current names attach to the best current address; historical names
// are matched to the single best-fitting address for their interval

use crate::base::{BaseAddress, BaseAddresses};
use crate::format::join_nonempty;
use crate::records::Organisation;
use crate::variants::{AddressVariant, VariantLabel, VariantSource};
use chrono::NaiveDate;
use std::cmp::Reverse;
use std::collections::HashMap;

// ============================================================================
// NAME CANDIDATES
// ============================================================================

/// One business name with its validity interval. A record contributes
/// its trading name and, when different, its legal name.
#[derive(Debug, Clone)]
struct NameCandidate {
    uprn: u64,
    name: String,
    legal: bool,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

fn name_candidates(organisation: &Organisation) -> Vec<NameCandidate> {
    let mut candidates = Vec::new();
    let name = organisation.organisation.trim();
    let legal_name = organisation.legal_name.trim();

    if !name.is_empty() {
        candidates.push(NameCandidate {
            uprn: organisation.uprn,
            name: name.to_string(),
            legal: false,
            start_date: organisation.start_date,
            end_date: organisation.end_date,
        });
    }
    if !legal_name.is_empty() && legal_name != name {
        candidates.push(NameCandidate {
            uprn: organisation.uprn,
            name: legal_name.to_string(),
            legal: true,
            start_date: organisation.start_date,
            end_date: organisation.end_date,
        });
    }

    candidates
}

// ============================================================================
// GENERATOR
// ============================================================================

pub fn render_organisation_variants(
    organisations: &[Organisation],
    base: &BaseAddresses,
) -> Vec<AddressVariant> {
    let best_current: HashMap<u64, &BaseAddress> = base
        .best_current
        .iter()
        .map(|address| (address.uprn, address))
        .collect();

    let mut distinct_by_uprn: HashMap<u64, Vec<&BaseAddress>> = HashMap::new();
    for address in &base.distinct {
        distinct_by_uprn.entry(address.uprn).or_default().push(address);
    }

    let mut variants = Vec::new();
    for organisation in organisations {
        for candidate in name_candidates(organisation) {
            if candidate.end_date.is_none() {
                // Still trading: attach to the property's best current address
                if let Some(address) = best_current.get(&candidate.uprn) {
                    let label = if candidate.legal {
                        VariantLabel::BusinessCurrentLegal
                    } else {
                        VariantLabel::BusinessCurrent
                    };
                    variants.push(make_variant(&candidate, address, label));
                }
            } else if let Some(address) =
                match_historical(&candidate, distinct_by_uprn.get(&candidate.uprn))
            {
                let label = if candidate.legal {
                    VariantLabel::BusinessHistoricalLegal
                } else {
                    VariantLabel::BusinessHistorical
                };
                variants.push(make_variant(&candidate, address, label));
            }
        }
    }

    variants
}

/// Pick the single address a historical name belongs with: overlapping
/// intervals first, then status rank, then the latest update. If nothing
/// overlaps the candidate still gets the best-ranked address, never a
/// cross product.
fn match_historical<'a>(
    candidate: &NameCandidate,
    addresses: Option<&Vec<&'a BaseAddress>>,
) -> Option<&'a BaseAddress> {
    let addresses = addresses?;
    addresses.iter().copied().min_by_key(|address| {
        (
            u8::from(!intervals_overlap(candidate, address)),
            address.status.rank(),
            Reverse(address.last_update_date.unwrap_or(NaiveDate::MIN)),
        )
    })
}

/// Interval overlap between a name candidate and an address record. A
/// record missing a date on one side cannot satisfy a bound on that
/// side; a missing bound on the address side is unbounded.
fn intervals_overlap(candidate: &NameCandidate, address: &BaseAddress) -> bool {
    let ends_after_start = match (address.start_date, candidate.end_date) {
        (None, _) => true,
        (Some(address_start), Some(candidate_end)) => candidate_end >= address_start,
        (Some(_), None) => false,
    };
    let starts_before_end = match (address.end_date, candidate.start_date) {
        (None, _) => true,
        (Some(address_end), Some(candidate_start)) => candidate_start <= address_end,
        (Some(_), None) => false,
    };
    ends_after_start && starts_before_end
}

fn make_variant(
    candidate: &NameCandidate,
    address: &BaseAddress,
    label: VariantLabel,
) -> AddressVariant {
    AddressVariant {
        uprn: candidate.uprn,
        postcode: address.postcode.clone(),
        address: join_nonempty(&[&candidate.name, &address.base_address]),
        source: VariantSource::Organisation,
        variant_label: label,
        is_primary: false,
        logical_status: Some(address.status),
        official_flag: Some(address.official_flag.clone()),
        blpu_state: address.blpu_state,
        postal_address_code: Some(address.postal_address_code.clone()),
        parent_uprn: address.parent_uprn,
        hierarchy: Some(address.hierarchy),
    }
}

// ============================================================================
// TESTS
// ============================================================================
