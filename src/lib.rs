// ABP Flatfile Pipeline - Core Library
// Exposes all modules for use in the CLI and tests

pub mod base;
pub mod chunks;
pub mod classify;
pub mod combine;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod flatfile;
pub mod format;
pub mod inspect;
pub mod pipeline;
pub mod records;
pub mod settings;
pub mod split;
pub mod streets;
pub mod tables;
pub mod variants;

// Re-export commonly used types
pub use base::{build_base_addresses, BaseAddress, BaseAddresses, HierarchyLevel, LogicalStatus};
pub use combine::{combine_and_dedupe, normalize_address, FlatfileRow};
pub use error::PipelineError;
pub use flatfile::{transform_to_flatfile, FlatfileReport, FlatfileStats};
pub use pipeline::{run, Step};
pub use records::{Blpu, Classification, DeliveryPoint, Lpi, Organisation, StreetDescriptor};
pub use settings::Settings;
pub use streets::ResolvedStreets;
pub use variants::{AddressVariant, VariantLabel, VariantSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
