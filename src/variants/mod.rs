// 🏷️ Address Variants - Alternate renderings per property
// Four generators feed the combine stage: LPI, organisation,
// delivery point, floor level

pub mod delivery;
pub mod level;
pub mod lpi;
pub mod organisation;

use crate::base::{HierarchyLevel, LogicalStatus};
use serde::{Deserialize, Serialize};

// ============================================================================
// VARIANT SOURCE
// ============================================================================

/// Which generator produced a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariantSource {
    Lpi,
    Organisation,
    DeliveryPoint,
    CustomLevel,
}

impl VariantSource {
    /// Source tag as written to the flatfile.
    pub fn name(&self) -> &'static str {
        match self {
            VariantSource::Lpi => "LPI",
            VariantSource::Organisation => "ORGANISATION",
            VariantSource::DeliveryPoint => "DELIVERY_POINT",
            VariantSource::CustomLevel => "CUSTOM_LEVEL",
        }
    }

    /// Tie-break order at dedupe time when primary flags are equal.
    pub fn precedence(&self) -> u8 {
        match self {
            VariantSource::Lpi => 0,
            VariantSource::Organisation => 1,
            VariantSource::DeliveryPoint => 2,
            VariantSource::CustomLevel => 3,
        }
    }
}

// ============================================================================
// VARIANT LABEL
// ============================================================================

/// Human-readable provenance label for a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariantLabel {
    Approved,
    Alternative,
    Provisional,
    Historical,
    BusinessCurrent,
    BusinessCurrentLegal,
    BusinessHistorical,
    BusinessHistoricalLegal,
    Delivery,
    CustomLevel,
}

impl VariantLabel {
    pub fn name(&self) -> &'static str {
        match self {
            VariantLabel::Approved => "APPROVED",
            VariantLabel::Alternative => "ALTERNATIVE",
            VariantLabel::Provisional => "PROVISIONAL",
            VariantLabel::Historical => "HISTORICAL",
            VariantLabel::BusinessCurrent => "BUSINESS_CURRENT",
            VariantLabel::BusinessCurrentLegal => "BUSINESS_CURRENT_LEGAL",
            VariantLabel::BusinessHistorical => "BUSINESS_HISTORICAL",
            VariantLabel::BusinessHistoricalLegal => "BUSINESS_HISTORICAL_LEGAL",
            VariantLabel::Delivery => "DELIVERY",
            VariantLabel::CustomLevel => "CUSTOM_LEVEL",
        }
    }

    /// The label an LPI variant carries for its logical status.
    pub fn for_status(status: LogicalStatus) -> Self {
        match status {
            LogicalStatus::Approved => VariantLabel::Approved,
            LogicalStatus::Alternative => VariantLabel::Alternative,
            LogicalStatus::Provisional => VariantLabel::Provisional,
            LogicalStatus::Historical => VariantLabel::Historical,
        }
    }
}

// ============================================================================
// ADDRESS VARIANT
// ============================================================================

/// One candidate rendered address string for a property. Immutable once
/// generated; only the combine stage may drop or merge variants.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressVariant {
    pub uprn: u64,
    pub postcode: String,
    pub address: String,
    pub source: VariantSource,
    pub variant_label: VariantLabel,
    pub is_primary: bool,

    // Property metadata, absent for sources that carry none
    pub logical_status: Option<LogicalStatus>,
    pub official_flag: Option<String>,
    pub blpu_state: Option<u8>,
    pub postal_address_code: Option<String>,
    pub parent_uprn: Option<u64>,
    pub hierarchy: Option<HierarchyLevel>,
}
