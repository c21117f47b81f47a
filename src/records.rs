// 📋 Source Records - Typed rows for the six ABP tables
// One struct per record type produced by the split step

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// BLPU (record type 21)
// ============================================================================

/// Basic Land and Property Unit: one row per property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blpu {
    pub uprn: u64,

    pub blpu_state: Option<u8>,

    /// Set when this property sits inside another one (a flat in a block)
    pub parent_uprn: Option<u64>,

    /// Postal eligibility flag; "N" marks a non-postal property
    pub addressbase_postal: String,

    pub postcode_locator: String,
}

// ============================================================================
// LPI (record type 24)
// ============================================================================

/// Land and Property Identifier: how a property's address has been
/// labelled over time. Many rows per property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lpi {
    pub uprn: u64,

    pub lpi_key: String,

    pub language: String,

    /// ABP logical status code: 1 approved, 3 alternative, 6 provisional,
    /// 8 historical. Anything else is dropped by the base builder.
    pub logical_status: u8,

    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub last_update_date: Option<NaiveDate>,

    // Secondary addressable object (the flat within the building)
    pub sao_start_number: Option<i32>,
    pub sao_start_suffix: String,
    pub sao_end_number: Option<i32>,
    pub sao_end_suffix: String,
    pub sao_text: String,

    // Primary addressable object (the building itself)
    pub pao_start_number: Option<i32>,
    pub pao_start_suffix: String,
    pub pao_end_number: Option<i32>,
    pub pao_end_suffix: String,
    pub pao_text: String,

    pub usrn: u64,

    /// Free-text floor level, e.g. "2,PARTIAL" or "GROUND FLOOR"
    pub level: String,

    pub official_flag: String,
}

// ============================================================================
// STREET DESCRIPTOR (record type 15)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreetDescriptor {
    pub usrn: u64,

    pub street_description: String,

    pub locality: String,

    pub town_name: String,

    pub language: String,

    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub last_update_date: Option<NaiveDate>,
}

// ============================================================================
// ORGANISATION (record type 31)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organisation {
    pub uprn: u64,

    pub organisation: String,

    pub legal_name: String,

    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

// ============================================================================
// DELIVERY POINT (record type 28)
// ============================================================================

/// Royal Mail delivery point address for a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryPoint {
    pub uprn: u64,

    /// Royal Mail's own identifier for the delivery point
    pub udprn: Option<u64>,

    pub organisation_name: String,
    pub department_name: String,
    pub sub_building_name: String,
    pub building_name: String,
    pub building_number: String,
    pub dependent_thoroughfare: String,
    pub thoroughfare: String,
    pub double_dependent_locality: String,
    pub dependent_locality: String,
    pub post_town: String,
    pub postcode: String,

    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub last_update_date: Option<NaiveDate>,
}

// ============================================================================
// CLASSIFICATION (record type 32)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub uprn: u64,

    pub classification_code: String,

    pub class_scheme: String,

    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub last_update_date: Option<NaiveDate>,
}
