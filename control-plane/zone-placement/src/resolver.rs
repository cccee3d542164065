use crate::{
    context::{parse_zones, AdminZones, ZoneParams},
    error::{Error, InvalidSelector},
    index::RegionZoneIndex,
    picker::choose_zone_for_volume,
    provider::ZoneProvider,
    selector::{self, Operator, TopologyKey},
    ZoneSet,
};
use k8s_openapi::{
    api::core::v1::PersistentVolumeClaim, apimachinery::pkg::apis::meta::v1::LabelSelector,
};
use snafu::ResultExt;
use tracing::{debug, trace, warn};

/// Calculates the zones which satisfy the zones allowed by an admin on the StorageClass, the
/// zones currently available in the cluster and the zones or regions requested through the
/// claim's selector.
///
/// A resolver serves a single placement request: the available zones and the region index
/// are fetched from the provider at most once and reused throughout the resolution.
pub struct ZoneResolver<P> {
    selector: Option<LabelSelector>,
    provider: P,
    admin_zones: AdminZones,
    index: RegionZoneIndex,
}

impl<P: ZoneProvider> ZoneResolver<P> {
    /// Return a new `Self` for the given claim selector.
    pub fn new(selector: Option<LabelSelector>, provider: P) -> Self {
        Self {
            selector,
            provider,
            admin_zones: AdminZones::Unset,
            index: RegionZoneIndex::default(),
        }
    }
    /// Return a new `Self` for the selector of the given claim.
    pub fn for_claim(claim: &PersistentVolumeClaim, provider: P) -> Self {
        let selector = claim.spec.as_ref().and_then(|spec| spec.selector.clone());
        Self::new(selector, provider)
    }
    /// Configure the zones allowed by the StorageClass parameters.
    pub fn with_params(mut self, params: ZoneParams) -> Result<Self, Error> {
        match params.into_admin_zones() {
            AdminZones::Unset => {}
            AdminZones::Single(zone) => self.set_zone(zone)?,
            AdminZones::List(zones) => self.set_admin_zones(AdminZones::List(zones))?,
        }
        Ok(self)
    }

    /// Set the `zone` StorageClass parameter.
    /// Fails if the `zones` parameter was already set.
    pub fn set_zone(&mut self, zone: impl Into<String>) -> Result<(), Error> {
        self.set_admin_zones(AdminZones::Single(zone.into()))
    }
    /// Set the `zones` StorageClass parameter, a comma separated list of zones.
    /// Fails if the `zone` parameter was already set or if the list is malformed, in which case
    /// the current configuration is kept.
    pub fn set_zones(&mut self, zones: &str) -> Result<(), Error> {
        if matches!(self.admin_zones, AdminZones::Single(_)) {
            return Err(Error::ConflictingZoneParameters {});
        }
        let zones = parse_zones(zones)?;
        self.set_admin_zones(AdminZones::List(zones))
    }
    fn set_admin_zones(&mut self, zones: AdminZones) -> Result<(), Error> {
        match (&self.admin_zones, &zones) {
            (AdminZones::Single(_), AdminZones::List(_))
            | (AdminZones::List(_), AdminZones::Single(_)) => {
                Err(Error::ConflictingZoneParameters {})
            }
            _ => {
                self.admin_zones = zones;
                Ok(())
            }
        }
    }
    /// Get the zones configured by an admin.
    pub fn admin_zones(&self) -> &AdminZones {
        &self.admin_zones
    }

    /// Get the zones which satisfy all the constraints.
    ///
    /// The constraints are applied in a fixed order: the zone and region equality labels, the
    /// `In` zone and region expressions and lastly the `NotIn` zone and region expressions.
    /// Each expression is applied on its own, so several expressions on the same key must all
    /// be satisfied.
    /// Fails if no zone is left.
    pub async fn resolve(&mut self) -> Result<ZoneSet, Error> {
        let mut zones = match self.admin_zones.zones() {
            Some(zones) => zones,
            None => self.index.all_zones(&self.provider).await?.clone(),
        };
        let selector = self.selector.as_ref();

        if selector::validate(selector).context(InvalidSelector)? {
            trace!(?zones, "No zone or region requested by the claim selector");
            return Self::satisfied(zones);
        }

        if let Some(zone) = selector::match_label(selector, TopologyKey::Zone) {
            zones.retain(|z| z == zone);
            trace!(%zone, ?zones, "Applied the zone label");
        }
        if let Some(region) = selector::match_label(selector, TopologyKey::Region) {
            let region_zones = self.index.zones_for_region(&self.provider, region).await?;
            zones = &zones & &region_zones;
            trace!(%region, ?zones, "Applied the region label");
        }

        for included in selector::match_expressions(selector, TopologyKey::Zone, Operator::In)
            .unwrap_or_default()
        {
            zones = &zones & &included;
            trace!(?included, ?zones, "Applied the zone inclusion");
        }
        for regions in selector::match_expressions(selector, TopologyKey::Region, Operator::In)
            .unwrap_or_default()
        {
            let included = self.index.zones_for_regions(&self.provider, &regions).await?;
            zones = &zones & &included;
            trace!(?regions, ?zones, "Applied the region inclusion");
        }

        for excluded in selector::match_expressions(selector, TopologyKey::Zone, Operator::NotIn)
            .unwrap_or_default()
        {
            zones = &zones - &excluded;
            trace!(?excluded, ?zones, "Applied the zone exclusion");
        }
        for regions in selector::match_expressions(selector, TopologyKey::Region, Operator::NotIn)
            .unwrap_or_default()
        {
            let excluded = self.index.zones_for_regions(&self.provider, &regions).await?;
            zones = &zones - &excluded;
            trace!(?regions, ?zones, "Applied the region exclusion");
        }

        Self::satisfied(zones)
    }

    /// Resolve the eligible zones and choose the zone for the volume of the given claim.
    pub async fn choose_zone(&mut self, claim_name: &str) -> Result<String, Error> {
        let zones = self.resolve().await?;
        choose_zone_for_volume(&zones, claim_name).ok_or(Error::Unsatisfiable {})
    }

    fn satisfied(zones: ZoneSet) -> Result<ZoneSet, Error> {
        if zones.is_empty() {
            warn!("No zone satisfies both the StorageClass parameters and the claim selector");
            return Err(Error::Unsatisfiable {});
        }
        debug!(?zones, "Resolved the eligible zones");
        Ok(zones)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        index::tests::{topology, CountingTopology},
        provider::StaticTopology,
        selector::tests::{expr, expressions, labels, zones, REGION, ZONE},
    };
    use k8s_openapi::api::core::v1::PersistentVolumeClaimSpec;
    use std::{
        collections::HashMap,
        sync::{atomic::Ordering, Arc},
    };

    fn resolver(selector: Option<LabelSelector>) -> ZoneResolver<StaticTopology> {
        ZoneResolver::new(selector, topology())
    }

    #[tokio::test]
    async fn empty_selector() {
        for selector in [None, Some(LabelSelector::default()), Some(labels(&[]))] {
            let mut all = resolver(selector.clone());
            assert_eq!(all.resolve().await.unwrap().len(), 5);

            let mut single = resolver(selector.clone());
            single.set_zone("us-west-1a").unwrap();
            assert_eq!(single.resolve().await.unwrap(), zones(&["us-west-1a"]));

            // admin zones are not checked against the available ones
            let mut list = resolver(selector);
            list.set_zones("x,y").unwrap();
            assert_eq!(list.resolve().await.unwrap(), zones(&["x", "y"]));
        }

        let mut empty = ZoneResolver::new(None, StaticTopology::default());
        let error = empty.resolve().await.unwrap_err();
        assert!(matches!(error, Error::Unsatisfiable {}));
    }

    #[tokio::test]
    async fn conflicting_admin_zones() {
        let mut r = resolver(None);
        r.set_zone("a").unwrap();
        let error = r.set_zones("a,b").unwrap_err();
        assert!(matches!(error, Error::ConflictingZoneParameters {}));
        assert_eq!(r.admin_zones(), &AdminZones::Single("a".to_string()));

        let mut r = resolver(None);
        r.set_zones("a,b").unwrap();
        let error = r.set_zone("a").unwrap_err();
        assert!(matches!(error, Error::ConflictingZoneParameters {}));
        assert_eq!(r.admin_zones().zones(), Some(zones(&["a", "b"])));

        let mut r = resolver(None);
        r.set_zones("a,b").unwrap();
        let error = r.set_zones("a,,b").unwrap_err();
        assert!(matches!(error, Error::InvalidZoneList { .. }));
        assert_eq!(r.admin_zones().zones(), Some(zones(&["a", "b"])));
        r.set_zones("c").unwrap();
        assert_eq!(r.admin_zones().zones(), Some(zones(&["c"])));
    }

    #[tokio::test]
    async fn invalid_selector() {
        let selectors = vec![
            expressions(vec![expr("topology.kubernetes.io/zone", "In", &["a"])]),
            expressions(vec![expr(ZONE, "Exists", &["a"])]),
            expressions(vec![expr(ZONE, "In", &[])]),
            labels(&[("app", "db")]),
        ];
        for selector in selectors {
            let mut r = resolver(Some(selector));
            r.set_zone("us-east-1a").unwrap();
            let error = r.resolve().await.unwrap_err();
            assert!(matches!(error, Error::InvalidSelector { .. }), "{error}");
        }

        let mut r = resolver(Some(labels(&[("app", "db")])));
        let error = r.resolve().await.unwrap_err();
        assert!(error.to_string().contains("\"app\""), "{error}");
    }

    #[tokio::test]
    async fn admin_zones_with_inclusion() {
        let mut r = resolver(Some(expressions(vec![expr(
            ZONE,
            "In",
            &["us-east-1a", "us-east-1b"],
        )])));
        r.set_zones("us-east-1a,us-east-1b,us-east-1c").unwrap();
        assert_eq!(
            r.resolve().await.unwrap(),
            zones(&["us-east-1a", "us-east-1b"])
        );
    }

    #[tokio::test]
    async fn zone_exclusion() {
        let provider = StaticTopology::new([("a", "r1"), ("b", "r1"), ("c", "r2"), ("d", "r2")]);
        let mut r = ZoneResolver::new(
            Some(expressions(vec![expr(ZONE, "NotIn", &["b"])])),
            provider,
        );
        assert_eq!(r.resolve().await.unwrap(), zones(&["a", "c", "d"]));
    }

    #[tokio::test]
    async fn region_without_zones() {
        let mut r = resolver(Some(expressions(vec![expr(REGION, "In", &["ap-south-1"])])));
        let error = r.resolve().await.unwrap_err();
        assert!(matches!(error, Error::Unsatisfiable {}));
    }

    #[tokio::test]
    async fn expressions_are_and_ed() {
        // each expression is an OR of its values, all of them must be satisfied
        let mut r = resolver(Some(expressions(vec![
            expr(ZONE, "In", &["us-east-1a", "us-east-1b", "us-west-1a"]),
            expr(ZONE, "In", &["us-east-1b", "us-west-1a", "eu-west-1a"]),
        ])));
        assert_eq!(
            r.resolve().await.unwrap(),
            zones(&["us-east-1b", "us-west-1a"])
        );

        let mut r = resolver(Some(expressions(vec![
            expr(REGION, "In", &["us-east-1", "us-west-1"]),
            expr(REGION, "In", &["us-west-1", "eu-west-1"]),
        ])));
        assert_eq!(r.resolve().await.unwrap(), zones(&["us-west-1a"]));

        let mut r = resolver(Some(expressions(vec![
            expr(ZONE, "NotIn", &["us-east-1a"]),
            expr(ZONE, "NotIn", &["us-east-1b"]),
            expr(REGION, "NotIn", &["eu-west-1"]),
        ])));
        assert_eq!(
            r.resolve().await.unwrap(),
            zones(&["us-east-1c", "us-west-1a"])
        );
    }

    #[tokio::test]
    async fn labels_and_expressions() {
        let mut selector = expressions(vec![
            expr(ZONE, "In", &["us-east-1a", "us-east-1b", "us-west-1a"]),
            expr(ZONE, "NotIn", &["us-east-1a"]),
        ]);
        selector.match_labels = labels(&[(REGION, "us-east-1")]).match_labels;
        let mut r = resolver(Some(selector));
        assert_eq!(r.resolve().await.unwrap(), zones(&["us-east-1b"]));

        let mut r = resolver(Some(labels(&[(ZONE, "us-east-1c"), (REGION, "us-west-1")])));
        let error = r.resolve().await.unwrap_err();
        assert!(matches!(error, Error::Unsatisfiable {}));

        let mut r = resolver(Some(labels(&[(ZONE, "us-east-1c")])));
        r.set_zones("us-east-1a,us-east-1c").unwrap();
        assert_eq!(r.resolve().await.unwrap(), zones(&["us-east-1c"]));
    }

    #[tokio::test]
    async fn region_index_built_once() {
        let provider = Arc::new(CountingTopology::new(topology()));
        let mut selector = expressions(vec![
            expr(REGION, "In", &["us-east-1", "us-west-1"]),
            expr(REGION, "NotIn", &["us-west-1"]),
        ]);
        selector.match_labels = labels(&[(REGION, "us-east-1")]).match_labels;

        let mut r = ZoneResolver::new(Some(selector), provider.clone());
        assert_eq!(
            r.resolve().await.unwrap(),
            zones(&["us-east-1a", "us-east-1b", "us-east-1c"])
        );
        assert_eq!(provider.lists.load(Ordering::SeqCst), 1);
        assert_eq!(provider.lookups.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn provider_failures() {
        let provider = CountingTopology::new(topology()).failing_list();
        let mut r = ZoneResolver::new(None, provider);
        let error = r.resolve().await.unwrap_err();
        assert!(matches!(error, Error::ListZones { .. }));

        // admin zones don't need the available zones, only the region index does
        let provider = CountingTopology::new(topology()).failing_zone("eu-west-1a");
        let mut r = ZoneResolver::new(
            Some(expressions(vec![expr(REGION, "NotIn", &["eu-west-1"])])),
            provider,
        );
        r.set_zone("us-east-1a").unwrap();
        let error = r.resolve().await.unwrap_err();
        assert!(matches!(error, Error::ZoneToRegion { .. }));
        assert!(error.to_string().contains("eu-west-1a"), "{error}");
    }

    #[tokio::test]
    async fn claim_and_params() {
        let claim = PersistentVolumeClaim {
            spec: Some(PersistentVolumeClaimSpec {
                selector: Some(expressions(vec![expr(ZONE, "NotIn", &["us-east-1a"])])),
                ..Default::default()
            }),
            ..Default::default()
        };
        let args = HashMap::from([
            ("zones".to_string(), "us-east-1a,us-east-1b".to_string()),
            (
                "csi.storage.k8s.io/pvc/name".to_string(),
                "data-db-0".to_string(),
            ),
        ]);
        let params = ZoneParams::try_from(&args).unwrap();
        let claim_name = params.claim_name().unwrap_or_default().to_string();

        let mut r = ZoneResolver::for_claim(&claim, topology())
            .with_params(params)
            .unwrap();
        assert_eq!(r.choose_zone(&claim_name).await.unwrap(), "us-east-1b");

        let mut r = ZoneResolver::new(None, topology());
        r.set_zone("us-east-1a").unwrap();
        let error = r
            .with_params(ZoneParams::try_from(&args).unwrap())
            .err()
            .unwrap();
        assert!(matches!(error, Error::ConflictingZoneParameters {}));
    }
}
