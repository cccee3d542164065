use crate::ZoneSet;
use tracing::{debug, warn};

const FNV32_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1 hash (multiply, then xor).
fn fnv1_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV32_OFFSET_BASIS, |hash, byte| {
        hash.wrapping_mul(FNV32_PRIME) ^ u32::from(*byte)
    })
}

/// Split a statefulset-style claim name `<claim>-<set>-<ordinal>` into the string to hash and
/// its ordinal.
/// Only the part after the last dash of the prefix is hashed so that all the claims of the same
/// statefulset member land in the same zone. Names which look like `<name>-<ordinal>` still get
/// spread by their ordinal.
fn hash_parts(name: &str) -> (&str, u32) {
    let Some((prefix, ordinal)) = name.rsplit_once('-') else {
        return (name, 0);
    };
    if ordinal.is_empty() || !ordinal.bytes().all(|b| b.is_ascii_digit()) {
        return (name, 0);
    }
    let Ok(ordinal) = ordinal.parse::<u32>() else {
        return (name, 0);
    };
    let hashed = prefix.rsplit_once('-').map_or(prefix, |(_, set)| set);
    (hashed, ordinal)
}

/// Choose a zone for a volume from the given eligible zones, based on the claim name.
///
/// Volumes are round-robin-ed across the zones using the hash of the claim name. When the name
/// ends with `-<integer>`, as statefulset claims do, the prefix is hashed and the integer is
/// added to the hash, so consecutive members spread across consecutive zones.
/// The zones are indexed in sorted order, making the choice reproducible for the same
/// zones and name.
///
/// An empty name yields a random zone: callers which need a reproducible choice must always
/// provide a name.
/// Returns `None` only when there are no zones to choose from.
pub fn choose_zone_for_volume(zones: &ZoneSet, name: &str) -> Option<String> {
    if zones.is_empty() {
        return None;
    }
    let (hash, ordinal) = if name.is_empty() {
        warn!("No claim name defined during volume create; choosing a random zone");
        (rand::random::<u32>(), 0)
    } else {
        let (hashed, ordinal) = hash_parts(name);
        if hashed != name {
            debug!(claim.name = %name, ordinal, "Detected statefulset-style claim name");
        }
        (fnv1_32(hashed.as_bytes()), ordinal)
    };

    let index = hash.wrapping_add(ordinal) % zones.len() as u32;
    let zone = zones.iter().nth(index as usize).cloned();
    debug!(claim.name = %name, ?zone, ?zones, "Chose zone for volume");
    zone
}
