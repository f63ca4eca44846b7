use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::meta::{Object, ObjectMeta, StatusObject};
use crate::pod::PodSpec;

// --- Pod template ---

/// Template every replica is instantiated from. Labels and annotations are
/// merged with the controller-computed ones at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodTemplate {
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    pub spec: PodSpec,
}

// --- NetSet spec ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetSetSpec {
    pub replicas: u32,
    /// Explicit IPs for the replicas. When non-empty, `replicas` must not
    /// exceed the number of addresses. Mutually exclusive with `ip_pool`.
    #[serde(default)]
    pub ips: Vec<String>,
    /// Named pool plain IP claims draw from. Only valid off-VPC.
    #[serde(default)]
    pub ip_pool: String,
    /// Whether the set runs on a VPC; selects the claim kind and finalizer.
    #[serde(default)]
    pub on_vpc: bool,
    /// Bandwidth limit in Mbps. Only the SR-IOV (non-VPC) path honors it.
    #[serde(default)]
    pub mbps: u32,
    /// Replica hostnames are `<hostname_prefix>-<index>`.
    pub hostname_prefix: String,
    /// Raise and tear down pods one by one, in index order.
    #[serde(default)]
    pub sequence: bool,
    pub template: PodTemplate,
}

// --- NetSet status ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetSetStatus {
    /// Number of pods brought up by the controller.
    pub ready_count: u32,
    /// IP addresses claimed for this set. Set semantics, order irrelevant.
    pub claimed_ips: Vec<String>,
    /// Human-readable progress message.
    #[serde(default)]
    pub message: String,
}

// --- NetSet ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetSet {
    pub meta: ObjectMeta,
    pub spec: NetSetSpec,
    /// None until the controller initializes it on first reconcile.
    #[serde(default)]
    pub status: Option<NetSetStatus>,
}

impl Object for NetSet {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

impl StatusObject for NetSet {
    fn copy_status_from(&mut self, src: &Self) {
        self.status = src.status.clone();
    }
}
