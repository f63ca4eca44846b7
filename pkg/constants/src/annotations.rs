//! Pod annotation keys carrying claim-derived connectivity metadata.
//!
//! Written once at pod creation; never rewritten by the controller.

/// VPC IP address assigned to the pod.
pub const VPC_IP: &str = "vpc.netset.io/ip";

/// MAC address of the VPC network interface backing the pod.
pub const VPC_NIC_MAC: &str = "vpc.netset.io/nic-mac";

/// Identifier of the VPC network interface backing the pod.
pub const VPC_NIC_ID: &str = "vpc.netset.io/nic-id";

/// Identifier of the VPC instance hosting the interface.
pub const VPC_INSTANCE_ID: &str = "vpc.netset.io/instance-id";

/// Marks the VPC IP as retained across pod restarts.
pub const VPC_IP_RETAIN: &str = "vpc.netset.io/ip-retain";

/// SR-IOV IP address assigned to the pod (non-VPC mode).
pub const SRIOV_IP: &str = "sriov.netset.io/ip";

/// SR-IOV VLAN id. Reserved; written empty until the claim status carries it.
pub const SRIOV_VLAN: &str = "sriov.netset.io/vlan";

/// SR-IOV route. Reserved; written empty until the claim status carries it.
pub const SRIOV_ROUTE: &str = "sriov.netset.io/route";

/// SR-IOV netmask. Reserved; written empty until the claim status carries it.
pub const SRIOV_MASK: &str = "sriov.netset.io/mask";

/// SR-IOV bandwidth limit. Reserved; written empty until the claim status carries it.
pub const SRIOV_MBPS: &str = "sriov.netset.io/mbps";
