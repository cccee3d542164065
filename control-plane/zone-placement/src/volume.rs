use std::time::Duration;

const GIB: u64 = 1024 * 1024 * 1024;

/// Get how many allocation units are needed to hold a volume of the given size.
/// Eg: a 1500MiB volume needs 2 units when allocating in 1GiB units.
/// # Panics
/// If `unit` is zero.
pub fn round_up_size(size: u64, unit: u64) -> u64 {
    size / unit + u64::from(size % unit != 0)
}

/// Generate the backing volume name for a persistent volume: `<cluster>-dynamic-<pv>`.
/// When that doesn't fit within `max_len`, the `<cluster>-dynamic` prefix is cut so that the
/// whole pv name is kept.
pub fn generate_volume_name(cluster: &str, pv: &str, max_len: usize) -> String {
    let mut prefix = format!("{cluster}-dynamic");
    if pv.len() + 1 + prefix.len() > max_len {
        let mut keep = max_len.saturating_sub(pv.len() + 1);
        while !prefix.is_char_boundary(keep) {
            keep -= 1;
        }
        prefix.truncate(keep);
    }
    format!("{prefix}-{pv}")
}

/// Get the time allowed for a helper to work through a volume of the given capacity: the
/// `increment` per whole GiB, but never less than the `minimum`.
pub fn timeout_for_volume(minimum: Duration, increment: Duration, capacity: u64) -> Duration {
    let gib = u32::try_from(capacity / GIB).unwrap_or(u32::MAX);
    increment.saturating_mul(gib).max(minimum)
}
