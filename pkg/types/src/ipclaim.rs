use serde::{Deserialize, Serialize};

use crate::meta::{Object, ObjectMeta, StatusObject};

// --- Plain IP claim ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpClaimSpec {
    /// Pool the address is drawn from.
    #[serde(default)]
    pub ip_pool: String,
    /// Requested bandwidth limit in Mbps (SR-IOV only).
    #[serde(default)]
    pub mbps: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpClaimStatus {
    /// Allocated address. Empty until the allocator fulfills the claim.
    #[serde(default)]
    pub ip: String,
}

/// Request-and-fulfillment object correlating one replica to one allocated
/// IP address. Named identically to its pod.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpClaim {
    pub meta: ObjectMeta,
    pub spec: IpClaimSpec,
    #[serde(default)]
    pub status: IpClaimStatus,
}

impl IpClaim {
    pub fn is_fulfilled(&self) -> bool {
        !self.status.ip.is_empty()
    }
}

impl Object for IpClaim {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

impl StatusObject for IpClaim {
    fn copy_status_from(&mut self, src: &Self) {
        self.status = src.status.clone();
    }
}

// --- VPC IP claim ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpcIpClaimSpec {
    /// Name of the pod the claim is bound to.
    pub pod: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VpcIpClaimStatus {
    /// Allocated address. Empty until the VPC allocator fulfills the claim.
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub nic_mac: String,
    #[serde(default)]
    pub nic_id: String,
    #[serde(default)]
    pub instance_id: String,
}

/// VPC variant of the IP claim. The VPC allocator also reports the network
/// interface backing the address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpcIpClaim {
    pub meta: ObjectMeta,
    pub spec: VpcIpClaimSpec,
    #[serde(default)]
    pub status: VpcIpClaimStatus,
}

impl VpcIpClaim {
    pub fn is_fulfilled(&self) -> bool {
        !self.status.ip.is_empty()
    }
}

impl Object for VpcIpClaim {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

impl StatusObject for VpcIpClaim {
    fn copy_status_from(&mut self, src: &Self) {
        self.status = src.status.clone();
    }
}
