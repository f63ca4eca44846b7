//! Finalizers blocking NetSet deletion until dependent cleanup completes.

/// Finalizer for NetSets whose pods hold plain IP claims.
pub const IPCLAIM_FINALIZER: &str = "ipclaim.finalizer.netset.io";

/// Finalizer for NetSets whose pods hold VPC IP claims.
/// VPC claims carry their own finalizers for releasing IPs through the VPC
/// API; this one only gates the NetSet itself.
pub const VPCIPCLAIM_FINALIZER: &str = "vpcipclaim.finalizer.netset.io";
