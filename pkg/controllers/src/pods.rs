//! Pod lifecycle: which indices must exist, creating missing replicas with
//! claim-derived annotations, and tearing down excess ones.

use anyhow::Context;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::claims;
use crate::naming;
use crate::registry;
use pkg_constants::annotations as anno;
use pkg_constants::labels::APP_LABEL;
use pkg_state::client::StateStore;
use pkg_types::meta::{ObjectMeta, OwnerRef};
use pkg_types::netset::NetSet;
use pkg_types::pod::Pod;

/// What listing a set's replicas observed.
///
/// `Raising` and `Falling` are transient phases of a sequential rollout,
/// not faults: the pods exist but neighbors are still coming up or
/// tearing down, so the caller must wait for the next trigger instead of
/// acting.
#[derive(Debug)]
pub enum ReplicaView {
    Listed(Vec<Pod>),
    Raising,
    Falling,
}

/// List the pods owned by `set`. In sequence mode a pod with a deletion
/// marker turns the view into `Falling`, and a pod that is not yet
/// running-and-ready turns it into `Raising`.
pub async fn list_replicas(store: &StateStore, set: &NetSet) -> anyhow::Result<ReplicaView> {
    let prefix = registry::pod_ns_prefix(&set.meta.namespace);
    let all: Vec<Pod> = store.list_prefix(&prefix).await?;
    let owned: Vec<Pod> = all
        .into_iter()
        .filter(|p| registry::owned_by(&p.meta, set))
        .collect();

    if set.spec.sequence {
        if owned.iter().any(|p| p.meta.is_terminating()) {
            return Ok(ReplicaView::Falling);
        }
        if owned.iter().any(|p| !p.is_running_and_ready()) {
            return Ok(ReplicaView::Raising);
        }
    }
    Ok(ReplicaView::Listed(owned))
}

/// Create missing replicas: one if sequential, otherwise every missing
/// slot. Returns `true` when an IP claim is not ready yet and the caller
/// should requeue; one unready claim halts the whole batch.
pub async fn create_replicas(
    store: &StateStore,
    set: &mut NetSet,
    pods: &[Pod],
) -> anyhow::Result<bool> {
    let mut taken: HashSet<String> = pods.iter().map(|p| p.meta.name.clone()).collect();
    let num_to_create = if set.spec.sequence {
        1
    } else {
        (set.spec.replicas as usize).saturating_sub(pods.len())
    };

    for _ in 0..num_to_create {
        // First unused index in [0, replicas)
        let Some(idx) = (0..set.spec.replicas)
            .find(|i| !taken.contains(&naming::pod_name(&set.meta.name, *i)))
        else {
            break;
        };
        let pod_name = naming::pod_name(&set.meta.name, idx);
        let hostname = naming::pod_hostname(&set.spec.hostname_prefix, idx);

        // The replica's IP claim must be fulfilled before the pod exists
        let mut annotations = HashMap::new();
        if set.spec.on_vpc {
            let Some(claim) = claims::get_or_create_vpc_ip_claim(store, set, &pod_name).await?
            else {
                info!(
                    "VPCIPClaim for {}.{} not ready yet, will requeue",
                    set.meta.namespace, pod_name
                );
                return Ok(true);
            };
            claims::record_claimed_ip(store, set, &claim.status.ip).await?;
            annotations.insert(anno::VPC_IP.to_string(), claim.status.ip.clone());
            annotations.insert(anno::VPC_NIC_MAC.to_string(), claim.status.nic_mac.clone());
            annotations.insert(anno::VPC_NIC_ID.to_string(), claim.status.nic_id.clone());
            annotations.insert(
                anno::VPC_INSTANCE_ID.to_string(),
                claim.status.instance_id.clone(),
            );
            annotations.insert(anno::VPC_IP_RETAIN.to_string(), "true".to_string());
        } else {
            let Some(claim) = claims::get_or_create_ip_claim(store, set, &pod_name).await? else {
                info!(
                    "IPClaim for {}.{} not ready yet, will requeue",
                    set.meta.namespace, pod_name
                );
                return Ok(true);
            };
            claims::record_claimed_ip(store, set, &claim.status.ip).await?;
            annotations.insert(anno::SRIOV_IP.to_string(), claim.status.ip.clone());
            // The claim status does not carry these yet
            annotations.insert(anno::SRIOV_VLAN.to_string(), String::new());
            annotations.insert(anno::SRIOV_ROUTE.to_string(), String::new());
            annotations.insert(anno::SRIOV_MASK.to_string(), String::new());
            annotations.insert(anno::SRIOV_MBPS.to_string(), String::new());
        }

        let key = registry::pod_key(&set.meta.namespace, &pod_name);
        if store.get::<Pod>(&key).await?.is_some() {
            info!("Found existing pod {}.{}", set.meta.namespace, pod_name);
        } else {
            info!("Creating pod {}.{}", set.meta.namespace, pod_name);
            let mut pod = build_pod(set, &pod_name, &hostname, annotations);
            store
                .create(&key, &mut pod)
                .await
                .context("failed to create pod")?;
            let status = set.status.get_or_insert_with(Default::default);
            status.ready_count += 1;
            let set_key = registry::netset_key(&set.meta.namespace, &set.meta.name);
            store
                .update_status(&set_key, set)
                .await
                .context("failed to update ready count")?;
        }
        taken.insert(pod_name);
    }
    Ok(false)
}

/// Tear down excess replicas. Sequential mode deletes exactly one pod,
/// the one with the highest index; otherwise every pod at or above the
/// border goes (`0` when deleting all, `replicas` when scaling down).
/// Pods with foreign names are skipped.
pub async fn teardown_replicas(
    store: &StateStore,
    set: &NetSet,
    pods: &[Pod],
    delete_all: bool,
) -> anyhow::Result<()> {
    if set.spec.sequence {
        let pop = pods
            .iter()
            .filter_map(|p| naming::index_of(&p.meta.name).map(|i| (i, p)))
            .max_by_key(|(i, _)| *i)
            .map(|(_, p)| p);
        let Some(pod) = pop else {
            return Ok(());
        };
        return delete_pod(store, pod).await;
    }

    let border = if delete_all { 0 } else { set.spec.replicas };
    for pod in pods {
        match naming::index_of(&pod.meta.name) {
            Some(idx) if idx >= border => delete_pod(store, pod).await?,
            _ => {}
        }
    }
    Ok(())
}

/// Request deletion of a pod. This is an intent: the deletion marker is
/// set and the node agent performs the final removal; the controller
/// observes absence rather than assuming it. Re-marking a terminating
/// pod is a no-op.
async fn delete_pod(store: &StateStore, pod: &Pod) -> anyhow::Result<()> {
    if pod.meta.is_terminating() {
        return Ok(());
    }
    let mut pod = pod.clone();
    pod.meta.deletion_timestamp = Some(Utc::now());
    let key = registry::pod_key(&pod.meta.namespace, &pod.meta.name);
    store
        .update(&key, &mut pod)
        .await
        .context("failed to mark pod for deletion")?;
    info!(
        "Marked pod {}.{} for deletion",
        pod.meta.namespace, pod.meta.name
    );
    Ok(())
}

/// Instantiate a pod from the set's template with the computed name,
/// hostname, labels and annotations. Claim-derived annotations win over
/// template ones.
fn build_pod(
    set: &NetSet,
    name: &str,
    hostname: &str,
    computed: HashMap<String, String>,
) -> Pod {
    let template = &set.spec.template;
    let mut meta = ObjectMeta::new(name, &set.meta.namespace);
    meta.labels = template.labels.clone();
    meta.labels
        .insert(APP_LABEL.to_string(), set.meta.name.clone());
    meta.annotations = template.annotations.clone();
    meta.annotations.extend(computed);
    meta.owner = Some(OwnerRef {
        kind: "NetSet".to_string(),
        name: set.meta.name.clone(),
        uid: set.meta.uid.clone(),
        controller: true,
    });
    let mut spec = template.spec.clone();
    spec.hostname = hostname.to_string();
    Pod {
        meta,
        spec,
        status: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_types::ipclaim::IpClaim;
    use pkg_types::netset::{NetSetSpec, NetSetStatus, PodTemplate};
    use pkg_types::pod::{ContainerSpec, PodPhase, PodSpec};

    fn netset(name: &str, replicas: u32, sequence: bool) -> NetSet {
        NetSet {
            meta: ObjectMeta::new(name, "ns"),
            spec: NetSetSpec {
                replicas,
                ips: Vec::new(),
                ip_pool: "default-pool".to_string(),
                on_vpc: false,
                mbps: 0,
                hostname_prefix: name.to_string(),
                sequence,
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

    async fn put_pod(store: &StateStore, set: &NetSet, idx: u32, running: bool) -> Pod {
        let name = naming::pod_name(&set.meta.name, idx);
        let mut pod = build_pod(
            set,
            &name,
            &naming::pod_hostname(&set.spec.hostname_prefix, idx),
            HashMap::new(),
        );
        if running {
            pod.status.phase = PodPhase::Running;
            pod.status.ready = true;
        }
        let key = registry::pod_key(&set.meta.namespace, &name);
        store.create(&key, &mut pod).await.unwrap();
        pod
    }

    async fn get_pod(store: &StateStore, ns: &str, name: &str) -> Pod {
        store
            .get(&registry::pod_key(ns, name))
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn sequence_reports_raising_and_falling() {
        let mut set = netset("web", 3, true);
        let store = store_with(&mut set).await;
        put_pod(&store, &set, 0, true).await;
        put_pod(&store, &set, 1, false).await;

        assert!(matches!(
            list_replicas(&store, &set).await.unwrap(),
            ReplicaView::Raising
        ));

        // A terminating pod outranks an unready one
        let mut pod = get_pod(&store, "ns", "web-0").await;
        pod.meta.deletion_timestamp = Some(Utc::now());
        store
            .update(&registry::pod_key("ns", "web-0"), &mut pod)
            .await
            .unwrap();
        assert!(matches!(
            list_replicas(&store, &set).await.unwrap(),
            ReplicaView::Falling
        ));

        // Off sequence mode the same pods are just a list
        set.spec.sequence = false;
        match list_replicas(&store, &set).await.unwrap() {
            ReplicaView::Listed(pods) => assert_eq!(pods.len(), 2),
            other => panic!("expected Listed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unready_claim_halts_the_batch() {
        let mut set = netset("web", 3, false);
        let store = store_with(&mut set).await;

        let requeue = create_replicas(&store, &mut set, &[]).await.unwrap();
        assert!(requeue);

        // Only the first slot's claim was created, and no pod exists
        assert!(
            store
                .get::<IpClaim>(&registry::ipclaim_key("ns", "web-0"))
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            store
                .get::<IpClaim>(&registry::ipclaim_key("ns", "web-1"))
                .await
                .unwrap()
                .is_none()
        );
        let pods: Vec<Pod> = store.list_prefix(&registry::pod_ns_prefix("ns")).await.unwrap();
        assert!(pods.is_empty());
    }

    #[tokio::test]
    async fn ready_claim_yields_annotated_pod() {
        let mut set = netset("web", 1, false);
        let store = store_with(&mut set).await;

        create_replicas(&store, &mut set, &[]).await.unwrap();
        let key = registry::ipclaim_key("ns", "web-0");
        let mut claim: IpClaim = store.get(&key).await.unwrap().unwrap();
        claim.status.ip = "10.0.0.5".to_string();
        store.update_status(&key, &mut claim).await.unwrap();

        let requeue = create_replicas(&store, &mut set, &[]).await.unwrap();
        assert!(!requeue);

        let pod = get_pod(&store, "ns", "web-0").await;
        assert_eq!(pod.spec.hostname, "web-0");
        assert_eq!(pod.meta.annotations.get(anno::SRIOV_IP).unwrap(), "10.0.0.5");
        // Reserved keys are present but empty
        assert_eq!(pod.meta.annotations.get(anno::SRIOV_VLAN).unwrap(), "");
        assert_eq!(pod.meta.annotations.get(anno::SRIOV_MBPS).unwrap(), "");
        assert_eq!(pod.meta.labels.get(APP_LABEL).unwrap(), "web");
        assert_eq!(set.status.as_ref().unwrap().ready_count, 1);
        assert_eq!(
            set.status.as_ref().unwrap().claimed_ips,
            vec!["10.0.0.5".to_string()]
        );
    }

    #[tokio::test]
    async fn sequential_teardown_pops_highest_index() {
        let mut set = netset("web", 3, true);
        let store = store_with(&mut set).await;
        let pods = vec![
            put_pod(&store, &set, 0, true).await,
            put_pod(&store, &set, 2, true).await,
            put_pod(&store, &set, 1, true).await,
        ];

        teardown_replicas(&store, &set, &pods, false).await.unwrap();

        assert!(get_pod(&store, "ns", "web-2").await.meta.is_terminating());
        assert!(!get_pod(&store, "ns", "web-1").await.meta.is_terminating());
        assert!(!get_pod(&store, "ns", "web-0").await.meta.is_terminating());
    }

    #[tokio::test]
    async fn bulk_teardown_deletes_above_border() {
        let mut set = netset("web", 2, false);
        let store = store_with(&mut set).await;
        let mut pods = Vec::new();
        for idx in 0..4 {
            pods.push(put_pod(&store, &set, idx, true).await);
        }

        teardown_replicas(&store, &set, &pods, false).await.unwrap();
        assert!(!get_pod(&store, "ns", "web-0").await.meta.is_terminating());
        assert!(!get_pod(&store, "ns", "web-1").await.meta.is_terminating());
        assert!(get_pod(&store, "ns", "web-2").await.meta.is_terminating());
        assert!(get_pod(&store, "ns", "web-3").await.meta.is_terminating());

        // delete_all moves the border to zero; re-list so the copies are fresh
        let pods: Vec<Pod> = store
            .list_prefix(&registry::pod_ns_prefix("ns"))
            .await
            .unwrap();
        teardown_replicas(&store, &set, &pods, true).await.unwrap();
        assert!(get_pod(&store, "ns", "web-0").await.meta.is_terminating());
        assert!(get_pod(&store, "ns", "web-1").await.meta.is_terminating());
    }

    #[tokio::test]
    async fn foreign_names_are_skipped() {
        let mut set = netset("web", 0, false);
        let store = store_with(&mut set).await;
        let mut pod = build_pod(&set, "web-oddball", "web-oddball", HashMap::new());
        store
            .create(&registry::pod_key("ns", "web-oddball"), &mut pod)
            .await
            .unwrap();

        teardown_replicas(&store, &set, &[pod], false).await.unwrap();
        assert!(!get_pod(&store, "ns", "web-oddball").await.meta.is_terminating());
    }
}
