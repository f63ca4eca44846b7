//! Store key layout and ownership selection for netset-owned objects.

use pkg_constants::labels::APP_LABEL;
use pkg_constants::state as keys;
use pkg_types::meta::ObjectMeta;
use pkg_types::netset::NetSet;

pub(crate) fn netset_key(namespace: &str, name: &str) -> String {
    format!("{}{}/{}", keys::NETSET_PREFIX, namespace, name)
}

pub(crate) fn pod_key(namespace: &str, name: &str) -> String {
    format!("{}{}/{}", keys::POD_PREFIX, namespace, name)
}

pub(crate) fn ipclaim_key(namespace: &str, name: &str) -> String {
    format!("{}{}/{}", keys::IPCLAIM_PREFIX, namespace, name)
}

pub(crate) fn vpcipclaim_key(namespace: &str, name: &str) -> String {
    format!("{}{}/{}", keys::VPCIPCLAIM_PREFIX, namespace, name)
}

pub(crate) fn pod_ns_prefix(namespace: &str) -> String {
    format!("{}{}/", keys::POD_PREFIX, namespace)
}

pub(crate) fn ipclaim_ns_prefix(namespace: &str) -> String {
    format!("{}{}/", keys::IPCLAIM_PREFIX, namespace)
}

pub(crate) fn vpcipclaim_ns_prefix(namespace: &str) -> String {
    format!("{}{}/", keys::VPCIPCLAIM_PREFIX, namespace)
}

/// True when `meta` carries the set's app label, i.e. the object belongs
/// to this NetSet.
pub(crate) fn owned_by(meta: &ObjectMeta, set: &NetSet) -> bool {
    meta.labels.get(APP_LABEL) == Some(&set.meta.name)
}
