use crate::ZoneSet;
use async_trait::async_trait;
use std::{collections::BTreeMap, sync::Arc};

/// Error returned by a `ZoneProvider`, kept as the source of the placement error.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// The cluster topology as seen by the zone placement.
/// Implementations may perform I/O; bounding their duration is left to the caller.
#[async_trait]
pub trait ZoneProvider: Send + Sync {
    /// List all zones which are currently usable in the cluster.
    async fn list_zones(&self) -> Result<ZoneSet, ProviderError>;
    /// Get the region which the given zone belongs to.
    async fn zone_region(&self, zone: &str) -> Result<String, ProviderError>;
}

#[async_trait]
impl<T: ZoneProvider + ?Sized> ZoneProvider for Arc<T> {
    async fn list_zones(&self) -> Result<ZoneSet, ProviderError> {
        (**self).list_zones().await
    }
    async fn zone_region(&self, zone: &str) -> Result<String, ProviderError> {
        (**self).zone_region(zone).await
    }
}

/// A fixed topology, mapping each zone to its region.
#[derive(Debug, Default, Clone)]
pub struct StaticTopology {
    zones: BTreeMap<String, String>,
}
impl StaticTopology {
    /// Return a new `Self` from the given (zone, region) pairs.
    pub fn new<Z: Into<String>, R: Into<String>>(zones: impl IntoIterator<Item = (Z, R)>) -> Self {
        Self {
            zones: zones
                .into_iter()
                .map(|(zone, region)| (zone.into(), region.into()))
                .collect(),
        }
    }
    /// Add the given zone to the region.
    #[must_use]
    pub fn with_zone(mut self, zone: impl Into<String>, region: impl Into<String>) -> Self {
        self.zones.insert(zone.into(), region.into());
        self
    }
}

#[async_trait]
impl ZoneProvider for StaticTopology {
    async fn list_zones(&self) -> Result<ZoneSet, ProviderError> {
        Ok(self.zones.keys().cloned().collect())
    }
    async fn zone_region(&self, zone: &str) -> Result<String, ProviderError> {
        self.zones
            .get(zone)
            .cloned()
            .ok_or_else(|| format!("zone {zone:?} is not part of the topology").into())
    }
}
