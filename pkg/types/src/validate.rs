use anyhow::{Result, bail};

use crate::netset::NetSet;

/// Validate a Kubernetes-style resource name.
/// Rules: lowercase `[a-z0-9-]`, max 63 chars, no leading/trailing hyphens.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("name must not be empty");
    }
    if name.len() > 63 {
        bail!("name '{}' exceeds 63 characters (got {})", name, name.len());
    }
    if name.starts_with('-') || name.ends_with('-') {
        bail!("name '{}' must not start or end with a hyphen", name);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        bail!(
            "name '{}' must contain only lowercase letters, digits, and hyphens [a-z0-9-]",
            name
        );
    }
    Ok(())
}

/// Validate a NetSet before reconciling it.
///
/// Explicit IPs must cover the replica count, explicit IPs and a named pool
/// are mutually exclusive, and the pool / bandwidth knobs only make sense
/// off-VPC.
pub fn validate_netset(set: &NetSet) -> Result<()> {
    validate_name(&set.meta.name)?;
    validate_name(&set.spec.hostname_prefix)?;
    let spec = &set.spec;
    if !spec.ips.is_empty() {
        if !spec.ip_pool.is_empty() {
            bail!("ips and ip_pool are mutually exclusive");
        }
        if spec.replicas as usize > spec.ips.len() {
            bail!(
                "replicas ({}) exceeds the number of explicit ips ({})",
                spec.replicas,
                spec.ips.len()
            );
        }
    }
    if spec.on_vpc {
        if !spec.ip_pool.is_empty() {
            bail!("ip_pool is only valid off-VPC");
        }
        if spec.mbps != 0 {
            bail!("mbps is only honored on the SR-IOV (non-VPC) path");
        }
    }
    Ok(())
}
