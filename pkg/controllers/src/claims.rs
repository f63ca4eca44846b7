//! Get-or-create logic for the two IP claim kinds, and claimed-IP
//! bookkeeping on the owning NetSet.
//!
//! Both kinds follow the same shape: `Ok(None)` means "just created" or
//! "exists but unfulfilled", deliberately indistinguishable, because the
//! caller's move is the same either way: stop this batch and wait for the
//! claim watch to re-trigger reconciliation.

use anyhow::Context;
use tracing::info;

use crate::registry;
use pkg_constants::labels::APP_LABEL;
use pkg_state::client::StateStore;
use pkg_state::error::StateError;
use pkg_types::ipclaim::{IpClaim, IpClaimSpec, VpcIpClaim, VpcIpClaimSpec};
use pkg_types::meta::{ObjectMeta, OwnerRef};
use pkg_types::netset::NetSet;

/// Metadata for an object owned by `set`: app-labeled and carrying a
/// controller owner reference.
fn owned_meta(set: &NetSet, name: &str) -> ObjectMeta {
    let mut meta = ObjectMeta::new(name, &set.meta.namespace);
    meta.labels
        .insert(APP_LABEL.to_string(), set.meta.name.clone());
    meta.owner = Some(OwnerRef {
        kind: "NetSet".to_string(),
        name: set.meta.name.clone(),
        uid: set.meta.uid.clone(),
        controller: true,
    });
    meta
}

/// Resolve the plain IP claim for `pod_name`, creating it if absent.
/// `Ok(None)` means the claim is not ready yet.
pub async fn get_or_create_ip_claim(
    store: &StateStore,
    set: &NetSet,
    pod_name: &str,
) -> anyhow::Result<Option<IpClaim>> {
    let key = registry::ipclaim_key(&set.meta.namespace, pod_name);
    match store.get::<IpClaim>(&key).await? {
        Some(claim) if claim.is_fulfilled() => Ok(Some(claim)),
        Some(_) => Ok(None),
        None => {
            info!(
                "Creating IPClaim for {}.{} on pool {}",
                set.meta.namespace, pod_name, set.spec.ip_pool
            );
            let mut claim = IpClaim {
                meta: owned_meta(set, pod_name),
                spec: IpClaimSpec {
                    ip_pool: set.spec.ip_pool.clone(),
                    mbps: set.spec.mbps,
                },
                status: Default::default(),
            };
            store
                .create(&key, &mut claim)
                .await
                .context("failed to create ipclaim")?;
            Ok(None)
        }
    }
}

/// Resolve the VPC IP claim for `pod_name`, creating it if absent.
/// `Ok(None)` means the claim is not ready yet.
pub async fn get_or_create_vpc_ip_claim(
    store: &StateStore,
    set: &NetSet,
    pod_name: &str,
) -> anyhow::Result<Option<VpcIpClaim>> {
    let key = registry::vpcipclaim_key(&set.meta.namespace, pod_name);
    match store.get::<VpcIpClaim>(&key).await? {
        Some(claim) if claim.is_fulfilled() => Ok(Some(claim)),
        Some(_) => Ok(None),
        None => {
            info!(
                "Creating VPCIPClaim for {}.{}",
                set.meta.namespace, pod_name
            );
            let mut claim = VpcIpClaim {
                meta: owned_meta(set, pod_name),
                spec: VpcIpClaimSpec {
                    pod: pod_name.to_string(),
                },
                status: Default::default(),
            };
            store
                .create(&key, &mut claim)
                .await
                .context("failed to create vpcipclaim")?;
            Ok(None)
        }
    }
}

/// Append `ip` to the set's claimed IPs if absent. No-op when present.
pub async fn record_claimed_ip(
    store: &StateStore,
    set: &mut NetSet,
    ip: &str,
) -> anyhow::Result<()> {
    let status = set.status.get_or_insert_with(Default::default);
    if status.claimed_ips.iter().any(|s| s == ip) {
        return Ok(());
    }
    status.claimed_ips.push(ip.to_string());
    let key = registry::netset_key(&set.meta.namespace, &set.meta.name);
    store
        .update_status(&key, set)
        .await
        .context("failed to record claimed ip")?;
    Ok(())
}

/// Delete every plain IP claim owned by `set` and release their addresses
/// from the claimed-IP set. No claims found counts as success.
pub async fn delete_ip_claims(store: &StateStore, set: &mut NetSet) -> anyhow::Result<()> {
    let prefix = registry::ipclaim_ns_prefix(&set.meta.namespace);
    let all: Vec<IpClaim> = store.list_prefix(&prefix).await?;
    let mut released = Vec::new();
    for claim in all.iter().filter(|c| registry::owned_by(&c.meta, set)) {
        info!("Deleting IPClaim {}", claim.meta.name);
        let key = registry::ipclaim_key(&claim.meta.namespace, &claim.meta.name);
        if let Err(e) = store.delete(&key).await {
            let e = anyhow::Error::from(e);
            // A claim that vanished underneath us is already clean
            if !StateError::is_not_found(&e) {
                return Err(e.context("failed to delete ipclaim"));
            }
        }
        released.push(claim.status.ip.clone());
    }
    release_claimed_ips(store, set, &released).await
}

/// Delete every VPC IP claim owned by `set` and release their addresses
/// from the claimed-IP set. No claims found counts as success.
pub async fn delete_vpc_ip_claims(store: &StateStore, set: &mut NetSet) -> anyhow::Result<()> {
    let prefix = registry::vpcipclaim_ns_prefix(&set.meta.namespace);
    let all: Vec<VpcIpClaim> = store.list_prefix(&prefix).await?;
    let mut released = Vec::new();
    for claim in all.iter().filter(|c| registry::owned_by(&c.meta, set)) {
        info!("Deleting VPCIPClaim {}", claim.meta.name);
        let key = registry::vpcipclaim_key(&claim.meta.namespace, &claim.meta.name);
        if let Err(e) = store.delete(&key).await {
            let e = anyhow::Error::from(e);
            // A claim that vanished underneath us is already clean
            if !StateError::is_not_found(&e) {
                return Err(e.context("failed to delete vpcipclaim"));
            }
        }
        released.push(claim.status.ip.clone());
    }
    release_claimed_ips(store, set, &released).await
}

/// Drop every released address from the claimed-IP set, persisting only
/// if the set actually shrank.
async fn release_claimed_ips(
    store: &StateStore,
    set: &mut NetSet,
    released: &[String],
) -> anyhow::Result<()> {
    let Some(status) = set.status.as_mut() else {
        return Ok(());
    };
    let kept: Vec<String> = status
        .claimed_ips
        .iter()
        .filter(|ip| !released.contains(ip))
        .cloned()
        .collect();
    if kept.len() == status.claimed_ips.len() {
        return Ok(());
    }
    status.claimed_ips = kept;
    let key = registry::netset_key(&set.meta.namespace, &set.meta.name);
    store
        .update_status(&key, set)
        .await
        .context("failed to release claimed ips")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_types::netset::{NetSetSpec, NetSetStatus, PodTemplate};
    use pkg_types::pod::{ContainerSpec, PodSpec};

    fn netset(name: &str) -> NetSet {
        NetSet {
            meta: ObjectMeta::new(name, "ns"),
            spec: NetSetSpec {
                replicas: 2,
                ips: Vec::new(),
                ip_pool: "default-pool".to_string(),
                on_vpc: false,
                mbps: 50,
                hostname_prefix: name.to_string(),
                sequence: false,
                template: PodTemplate {
                    labels: Default::default(),
                    annotations: Default::default(),
                    spec: PodSpec {
                        hostname: String::new(),
                        containers: vec![ContainerSpec {
                            name: "app".to_string(),
                            image: "nginx:1.25".to_string(),
                            command: Vec::new(),
                            args: Vec::new(),
                            env: Default::default(),
                            resources: Default::default(),
                        }],
                    },
                },
            },
            status: Some(NetSetStatus::default()),
        }
    }

    async fn store_with(set: &mut NetSet) -> StateStore {
        let store = StateStore::in_memory().await.unwrap();
        let key = registry::netset_key(&set.meta.namespace, &set.meta.name);
        store.create(&key, set).await.unwrap();
        store
    }

    async fn fulfill(store: &StateStore, ns: &str, name: &str, ip: &str) {
        let key = registry::ipclaim_key(ns, name);
        let mut claim: IpClaim = store.get(&key).await.unwrap().unwrap();
        claim.status.ip = ip.to_string();
        store.update_status(&key, &mut claim).await.unwrap();
    }

    #[tokio::test]
    async fn claim_is_created_then_waited_on() {
        let mut set = netset("web");
        let store = store_with(&mut set).await;

        // First call creates the claim and reports not-ready
        let got = get_or_create_ip_claim(&store, &set, "web-0").await.unwrap();
        assert!(got.is_none());
        let claim: IpClaim = store
            .get(&registry::ipclaim_key("ns", "web-0"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claim.spec.ip_pool, "default-pool");
        assert_eq!(claim.spec.mbps, 50);
        assert_eq!(claim.meta.labels.get(APP_LABEL).unwrap(), "web");
        assert!(claim.meta.owner.as_ref().unwrap().controller);

        // Still unfulfilled: same answer, no duplicate claim
        let got = get_or_create_ip_claim(&store, &set, "web-0").await.unwrap();
        assert!(got.is_none());

        fulfill(&store, "ns", "web-0", "10.0.0.5").await;
        let got = get_or_create_ip_claim(&store, &set, "web-0")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.status.ip, "10.0.0.5");
    }

    #[tokio::test]
    async fn recorded_ips_stay_unique() {
        let mut set = netset("web");
        let store = store_with(&mut set).await;

        record_claimed_ip(&store, &mut set, "10.0.0.5").await.unwrap();
        let rv_after_first = set.meta.resource_version;
        record_claimed_ip(&store, &mut set, "10.0.0.5").await.unwrap();

        let ips = &set.status.as_ref().unwrap().claimed_ips;
        assert_eq!(ips, &vec!["10.0.0.5".to_string()]);
        // Second call was a no-op, no write happened
        assert_eq!(set.meta.resource_version, rv_after_first);
    }

    #[tokio::test]
    async fn deleting_claims_releases_their_ips() {
        let mut set = netset("web");
        let store = store_with(&mut set).await;

        get_or_create_ip_claim(&store, &set, "web-0").await.unwrap();
        get_or_create_ip_claim(&store, &set, "web-1").await.unwrap();
        fulfill(&store, "ns", "web-0", "10.0.0.5").await;
        fulfill(&store, "ns", "web-1", "10.0.0.6").await;
        record_claimed_ip(&store, &mut set, "10.0.0.5").await.unwrap();
        record_claimed_ip(&store, &mut set, "10.0.0.6").await.unwrap();
        // An address this set never claimed through these claims
        record_claimed_ip(&store, &mut set, "10.0.9.9").await.unwrap();

        // A claim belonging to another set in the same namespace survives
        let other = netset("db");
        get_or_create_ip_claim(&store, &other, "db-0").await.unwrap();

        delete_ip_claims(&store, &mut set).await.unwrap();

        assert!(
            store
                .get::<IpClaim>(&registry::ipclaim_key("ns", "web-0"))
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            store
                .get::<IpClaim>(&registry::ipclaim_key("ns", "db-0"))
                .await
                .unwrap()
                .is_some()
        );
        let ips = &set.status.as_ref().unwrap().claimed_ips;
        assert_eq!(ips, &vec!["10.0.9.9".to_string()]);
    }

    #[tokio::test]
    async fn no_claims_found_is_success() {
        let mut set = netset("web");
        let store = store_with(&mut set).await;
        let rv = set.meta.resource_version;

        delete_ip_claims(&store, &mut set).await.unwrap();

        // Already clean: nothing deleted, nothing written
        assert_eq!(set.meta.resource_version, rv);
    }
}
