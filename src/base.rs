// 🏠 Base Addresses - Property records joined to streets
// Builds the full / distinct / best-current relations one run owns

use crate::format::{format_base_address, format_component};
use crate::records::{Blpu, Lpi};
use crate::streets::{ResolvedStreets, StreetNames};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

// ============================================================================
// LOGICAL STATUS
// ============================================================================

/// ABP logical status of an address record. Codes outside this set are
/// dropped before any address is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalStatus {
    Approved,
    Alternative,
    Provisional,
    Historical,
}

impl LogicalStatus {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(LogicalStatus::Approved),
            3 => Some(LogicalStatus::Alternative),
            6 => Some(LogicalStatus::Provisional),
            8 => Some(LogicalStatus::Historical),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            LogicalStatus::Approved => 1,
            LogicalStatus::Alternative => 3,
            LogicalStatus::Provisional => 6,
            LogicalStatus::Historical => 8,
        }
    }

    /// Preference rank: lower is more authoritative.
    pub fn rank(&self) -> u8 {
        match self {
            LogicalStatus::Approved => 0,
            LogicalStatus::Alternative => 1,
            LogicalStatus::Provisional => 2,
            LogicalStatus::Historical => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LogicalStatus::Approved => "APPROVED",
            LogicalStatus::Alternative => "ALTERNATIVE",
            LogicalStatus::Provisional => "PROVISIONAL",
            LogicalStatus::Historical => "HISTORICAL",
        }
    }

    pub fn is_current(&self) -> bool {
        !matches!(self, LogicalStatus::Historical)
    }
}

// ============================================================================
// HIERARCHY LEVEL
// ============================================================================

/// Where a property sits in the parent/child hierarchy. Derived from
/// parent linkage on every run, never stored independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HierarchyLevel {
    /// Has a parent UPRN (a flat inside a block)
    Child,
    /// Another property references it as parent
    Parent,
    /// Neither child nor parent
    Standalone,
}

impl HierarchyLevel {
    pub fn code(&self) -> &'static str {
        match self {
            HierarchyLevel::Child => "C",
            HierarchyLevel::Parent => "P",
            HierarchyLevel::Standalone => "S",
        }
    }
}

// ============================================================================
// BASE ADDRESS
// ============================================================================

/// One LPI joined to its BLPU and resolved street, with the rendered
/// address text.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseAddress {
    pub uprn: u64,
    pub base_address: String,
    pub postcode: String,
    pub status: LogicalStatus,
    pub official_flag: String,
    pub blpu_state: Option<u8>,
    pub postal_address_code: String,
    pub parent_uprn: Option<u64>,
    pub hierarchy: HierarchyLevel,
    pub level: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub last_update_date: Option<NaiveDate>,
}

/// The builder's product. `full` keeps every retained record, `distinct`
/// is deduplicated on (uprn, rendered text), `best_current` holds at most
/// one non-historical row per UPRN.
pub struct BaseAddresses {
    pub full: Vec<BaseAddress>,
    pub distinct: Vec<BaseAddress>,
    pub best_current: Vec<BaseAddress>,
}

// ============================================================================
// BUILDER
// ============================================================================

pub fn build_base_addresses(
    blpus: &[Blpu],
    lpis: &[Lpi],
    streets: &ResolvedStreets,
) -> BaseAddresses {
    let blpu_by_uprn: HashMap<u64, &Blpu> = blpus.iter().map(|blpu| (blpu.uprn, blpu)).collect();
    let parent_uprns: HashSet<u64> = blpus.iter().filter_map(|blpu| blpu.parent_uprn).collect();
    let empty_street = StreetNames::default();

    let mut full = Vec::new();
    for lpi in lpis {
        let Some(status) = LogicalStatus::from_code(lpi.logical_status) else {
            continue;
        };
        let Some(blpu) = blpu_by_uprn.get(&lpi.uprn) else {
            continue;
        };
        // Non-postal properties never form an address
        if blpu.addressbase_postal == "N" {
            continue;
        }

        let street = streets.lookup(lpi.usrn, &lpi.language).unwrap_or(&empty_street);

        let sao = format_component(
            &lpi.sao_text,
            lpi.sao_start_number,
            &lpi.sao_start_suffix,
            lpi.sao_end_number,
            &lpi.sao_end_suffix,
        );
        let pao = format_component(
            &lpi.pao_text,
            lpi.pao_start_number,
            &lpi.pao_start_suffix,
            lpi.pao_end_number,
            &lpi.pao_end_suffix,
        );
        let base_address = format_base_address(
            &sao,
            &pao,
            &street.street_description,
            &street.locality,
            &street.town_name,
            &blpu.postcode_locator,
        );

        let hierarchy = if blpu.parent_uprn.is_some() {
            HierarchyLevel::Child
        } else if parent_uprns.contains(&lpi.uprn) {
            HierarchyLevel::Parent
        } else {
            HierarchyLevel::Standalone
        };

        full.push(BaseAddress {
            uprn: lpi.uprn,
            base_address,
            postcode: blpu.postcode_locator.clone(),
            status,
            official_flag: lpi.official_flag.clone(),
            blpu_state: blpu.blpu_state,
            postal_address_code: blpu.addressbase_postal.clone(),
            parent_uprn: blpu.parent_uprn,
            hierarchy,
            level: lpi.level.clone(),
            start_date: lpi.start_date,
            end_date: lpi.end_date,
            last_update_date: lpi.last_update_date,
        });
    }

    let distinct = dedupe_on_text(&full);
    let best_current = pick_best_current(&distinct);

    BaseAddresses {
        full,
        distinct,
        best_current,
    }
}

/// Drop empty renderings, then keep one row per (uprn, text). On a text
/// collision the more authoritative status wins, then the latest update.
fn dedupe_on_text(full: &[BaseAddress]) -> Vec<BaseAddress> {
    let mut index: HashMap<(u64, String), usize> = HashMap::new();
    let mut distinct: Vec<BaseAddress> = Vec::new();

    for address in full {
        if address.base_address.is_empty() {
            continue;
        }
        let key = (address.uprn, address.base_address.clone());
        match index.get(&key) {
            Some(&at) => {
                if preference(address) < preference(&distinct[at]) {
                    distinct[at] = address.clone();
                }
            }
            None => {
                index.insert(key, distinct.len());
                distinct.push(address.clone());
            }
        }
    }

    distinct
}

/// At most one non-historical address per UPRN, by status rank then
/// recency.
fn pick_best_current(distinct: &[BaseAddress]) -> Vec<BaseAddress> {
    let mut index: HashMap<u64, usize> = HashMap::new();
    let mut best: Vec<BaseAddress> = Vec::new();

    for address in distinct {
        if !address.status.is_current() {
            continue;
        }
        match index.get(&address.uprn) {
            Some(&at) => {
                if preference(address) < preference(&best[at]) {
                    best[at] = address.clone();
                }
            }
            None => {
                index.insert(address.uprn, best.len());
                best.push(address.clone());
            }
        }
    }

    best
}

fn preference(address: &BaseAddress) -> (u8, Reverse<NaiveDate>) {
    (
        address.status.rank(),
        Reverse(address.last_update_date.unwrap_or(NaiveDate::MIN)),
    )
}

// ============================================================================
// TESTS
// ============================================================================
