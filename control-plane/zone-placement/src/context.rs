use crate::{
    error::{Error, InvalidZoneList},
    ZoneSet,
};
use std::collections::HashMap;
use strum_macros::{AsRefStr, Display, EnumString};

/// The volume creation parameters which drive the zone placement.
#[derive(AsRefStr, EnumString, Display)]
#[strum(serialize_all = "camelCase")]
pub enum Parameters {
    /// Restricts the volumes of the StorageClass to a single zone.
    Zone,
    /// Restricts the volumes of the StorageClass to a comma separated list of zones.
    Zones,
    #[strum(serialize = "csi.storage.k8s.io/pvc/name")]
    PvcName,
}

/// The zones configured by an admin on the StorageClass.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub enum AdminZones {
    /// Any available zone may be used.
    #[default]
    Unset,
    /// The `zone` parameter.
    Single(String),
    /// The `zones` parameter.
    List(ZoneSet),
}
impl AdminZones {
    /// Get the configured zones, if any.
    pub fn zones(&self) -> Option<ZoneSet> {
        match self {
            Self::Unset => None,
            Self::Single(zone) => Some(ZoneSet::from([zone.clone()])),
            Self::List(zones) => Some(zones.clone()),
        }
    }
}

/// Parse a comma separated list of zones into a set.
/// Surrounding whitespace is trimmed and empty zones are rejected.
pub fn parse_zones(zones: &str) -> Result<ZoneSet, Error> {
    zones
        .split(',')
        .map(|zone| match zone.trim() {
            "" => InvalidZoneList { zones }.fail(),
            zone => Ok(zone.to_string()),
        })
        .collect()
}

/// Zone placement parameters, parsed from the volume creation parameters.
#[derive(Debug, Default, Clone)]
pub struct ZoneParams {
    admin_zones: AdminZones,
    claim_name: Option<String>,
}
impl ZoneParams {
    /// Get the zones configured by the `Parameters::Zone` or `Parameters::Zones` values.
    pub fn admin_zones(&self) -> &AdminZones {
        &self.admin_zones
    }
    /// Get the `Parameters::PvcName` value.
    pub fn claim_name(&self) -> Option<&str> {
        self.claim_name.as_deref()
    }
    pub(crate) fn into_admin_zones(self) -> AdminZones {
        self.admin_zones
    }
}
impl TryFrom<&HashMap<String, String>> for ZoneParams {
    type Error = Error;

    fn try_from(args: &HashMap<String, String>) -> Result<Self, Self::Error> {
        let zone = args.get(Parameters::Zone.as_ref());
        let zones = args.get(Parameters::Zones.as_ref());

        let admin_zones = match (zone, zones) {
            (Some(_), Some(_)) => return Err(Error::ConflictingZoneParameters {}),
            (Some(zone), None) => AdminZones::Single(zone.to_string()),
            (None, Some(zones)) => AdminZones::List(parse_zones(zones)?),
            (None, None) => AdminZones::Unset,
        };

        Ok(Self {
            admin_zones,
            claim_name: args.get(Parameters::PvcName.as_ref()).cloned(),
        })
    }
}
