//! Deterministic naming for replicas.
//!
//! Pod `<owner>-<idx>` and hostname `<prefix>-<idx>` are a bijection on
//! `[0, replicas)` for a fixed owner name and prefix.

/// Separator joining a base name with a replica index.
const NAME_INDEX_SEP: &str = "-";

/// Name of the replica at `idx`, derived from the owner's name.
pub fn pod_name(owner_name: &str, idx: u32) -> String {
    format!("{}{}{}", owner_name, NAME_INDEX_SEP, idx)
}

/// Hostname of the replica at `idx`, derived from the owner's prefix.
pub fn pod_hostname(prefix: &str, idx: u32) -> String {
    format!("{}{}{}", prefix, NAME_INDEX_SEP, idx)
}

/// Parse the replica index out of a pod name's trailing `-<digits>` suffix.
/// Returns `None` for names this controller cannot have authored; callers
/// treat those pods as foreign and skip them.
pub fn index_of(pod_name: &str) -> Option<u32> {
    pod_name.rsplit(NAME_INDEX_SEP).next()?.parse().ok()
}
