//! Zone placement for dynamically provisioned volumes.
//!
//! The eligible zones of a volume are resolved from the zones allowed by an admin on the
//! StorageClass, the zones available in the cluster and the zones or regions requested by the
//! claim's selector. A single zone is then chosen from the eligible zones using the claim name.

mod context;
mod error;
mod index;
mod picker;
mod provider;
mod resolver;
pub mod selector;
mod volume;

/// Exports from the context module.
pub use context::{parse_zones, AdminZones, Parameters, ZoneParams};
/// Exports from the error module.
pub use error::Error;
/// Exports from the picker module.
pub use picker::choose_zone_for_volume;
/// Exports from the provider module.
pub use provider::{ProviderError, StaticTopology, ZoneProvider};
/// Exports from the resolver module.
pub use resolver::ZoneResolver;
/// Exports from the volume module.
pub use volume::{generate_volume_name, round_up_size, timeout_for_volume};

/// A set of zone names, always iterated in sorted order.
pub type ZoneSet = std::collections::BTreeSet<String>;
