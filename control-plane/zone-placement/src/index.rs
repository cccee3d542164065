use crate::{
    error::{Error, ListZones, ZoneToRegion},
    provider::ZoneProvider,
    ZoneSet,
};
use snafu::ResultExt;
use std::collections::HashMap;
use tracing::trace;

/// Caches the zones of the cluster and the regions they belong to.
/// Providers don't offer a region to zones lookup, so the index is built by walking through
/// all the zones and looking up each zone's region.
/// Nothing is ever invalidated: the index lives as long as a single placement request.
#[derive(Debug, Default)]
pub(crate) struct RegionZoneIndex {
    all_zones: Option<ZoneSet>,
    regions: Option<HashMap<String, ZoneSet>>,
}

impl RegionZoneIndex {
    /// Get all the available zones, listing them from the provider on first use only.
    pub(crate) async fn all_zones<P: ZoneProvider + ?Sized>(
        &mut self,
        provider: &P,
    ) -> Result<&ZoneSet, Error> {
        let zones = match self.all_zones.take() {
            Some(zones) => zones,
            None => {
                let zones = provider.list_zones().await.context(ListZones)?;
                trace!(?zones, "Listed all available zones");
                zones
            }
        };
        Ok(self.all_zones.insert(zones))
    }

    /// Get the zones of the given region.
    /// A region which has no zones, for example one which no longer exists, yields an empty set.
    pub(crate) async fn zones_for_region<P: ZoneProvider + ?Sized>(
        &mut self,
        provider: &P,
        region: &str,
    ) -> Result<ZoneSet, Error> {
        let regions = self.region_index(provider).await?;
        Ok(regions.get(region).cloned().unwrap_or_default())
    }

    /// Get the union of the zones of all the given regions.
    pub(crate) async fn zones_for_regions<P: ZoneProvider + ?Sized>(
        &mut self,
        provider: &P,
        regions: &ZoneSet,
    ) -> Result<ZoneSet, Error> {
        let index = self.region_index(provider).await?;
        Ok(regions
            .iter()
            .filter_map(|region| index.get(region))
            .flatten()
            .cloned()
            .collect())
    }

    async fn region_index<P: ZoneProvider + ?Sized>(
        &mut self,
        provider: &P,
    ) -> Result<&HashMap<String, ZoneSet>, Error> {
        let regions = match self.regions.take() {
            Some(regions) => regions,
            None => self.build(provider).await?,
        };
        Ok(self.regions.insert(regions))
    }

    /// Build the region to zones map.
    /// If any zone fails the lookup, nothing is kept and the next use tries again.
    async fn build<P: ZoneProvider + ?Sized>(
        &mut self,
        provider: &P,
    ) -> Result<HashMap<String, ZoneSet>, Error> {
        let zones = self.all_zones(provider).await?.clone();
        let mut regions = HashMap::<String, ZoneSet>::new();
        for zone in zones {
            let region = provider
                .zone_region(&zone)
                .await
                .context(ZoneToRegion { zone: &zone })?;
            regions.entry(region).or_default().insert(zone);
        }
        trace!(?regions, "Built the region to zones index");
        Ok(regions)
    }
}
