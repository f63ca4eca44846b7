//! State store key layout.

/// etcd-style key prefix for NetSet objects (`<prefix><namespace>/<name>`).
pub const NETSET_PREFIX: &str = "/registry/netsets/";

/// Key prefix for pod objects.
pub const POD_PREFIX: &str = "/registry/pods/";

/// Key prefix for plain IP claim objects.
pub const IPCLAIM_PREFIX: &str = "/registry/ipclaims/";

/// Key prefix for VPC IP claim objects.
pub const VPCIPCLAIM_PREFIX: &str = "/registry/vpcipclaims/";

/// Key holding the persisted resource-version counter.
pub const RESOURCE_VERSION_KEY: &str = "/registry/meta/resource-version";
