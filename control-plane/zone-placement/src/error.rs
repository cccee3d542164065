use crate::{provider::ProviderError, selector::SelectorError};
use snafu::Snafu;

/// Zone placement error variants.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), context(suffix(false)))]
pub enum Error {
    /// Both the `zone` and `zones` StorageClass parameters were configured.
    #[snafu(display("Both zone and zones StorageClass parameters must not be used at the same time"))]
    ConflictingZoneParameters {},
    /// The `zones` StorageClass parameter is not a valid comma separated list.
    #[snafu(display(
        "Comma separated list of zones ({:?}) must not contain an empty zone",
        zones
    ))]
    InvalidZoneList { zones: String },
    /// The claim's selector references labels or operators which are not allowed.
    #[snafu(display("Invalid claim selector: {}", source))]
    InvalidSelector { source: SelectorError },
    /// The topology provider failed to list the available zones.
    #[snafu(display("Failed to list the available zones: {}", source))]
    ListZones { source: ProviderError },
    /// The topology provider failed to convert a zone into its region.
    #[snafu(display("Failed to convert zone ({}) to a region: {}", zone, source))]
    ZoneToRegion { zone: String, source: ProviderError },
    /// No zone is left once all the constraints are applied.
    #[snafu(display("Could not find availability zone: combination of StorageClass parameters and selector of this claim cannot be satisfied by this cluster"))]
    Unsatisfiable {},
}
