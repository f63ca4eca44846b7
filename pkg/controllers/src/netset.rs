//! Top-level reconciliation engine for NetSets.
//!
//! Each invocation re-reads cluster state and reduces it to exactly one
//! action: create, delete, wait, or finalizer bookkeeping. The engine
//! never loops or sleeps; the dispatcher re-invokes it as state changes.

use anyhow::Context;
use tracing::{info, warn};

use crate::claims;
use crate::pods::{self, ReplicaView};
use crate::registry;
use pkg_constants::finalizers::{IPCLAIM_FINALIZER, VPCIPCLAIM_FINALIZER};
use pkg_state::client::StateStore;
use pkg_types::netset::{NetSet, NetSetStatus};
use pkg_types::validate;

const MSG_CONVERGED: &str = "Converged";
const MSG_WAIT_CLAIM: &str = "Waiting for IP claim";
const MSG_SCALING_DOWN: &str = "Tearing down excess pods";
const MSG_TERMINATING: &str = "Terminating";

/// Terminal decision of one reconcile invocation. `Requeue` asks the
/// dispatcher for a delayed re-delivery; everything else waits for the
/// next watch trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Requeue,
}

/// Controller that reconciles NetSets into pods with stable network
/// identities.
pub struct NetSetController {
    store: StateStore,
}

impl NetSetController {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub async fn reconcile(&self, namespace: &str, name: &str) -> anyhow::Result<Outcome> {
        info!("Reconciling NetSet {}.{}", namespace, name);
        let key = registry::netset_key(namespace, name);
        let Some(mut set) = self.store.get::<NetSet>(&key).await? else {
            info!("NetSet {}.{} not found, end reconcile", namespace, name);
            return Ok(Outcome::Done);
        };

        if set.meta.is_terminating() {
            return self.finalize(set).await;
        }

        if let Err(reason) = validate::validate_netset(&set) {
            warn!("NetSet {}.{} has an invalid spec: {}", namespace, name, reason);
            self.set_message(&mut set, &format!("Invalid spec: {}", reason))
                .await?;
            return Ok(Outcome::Done);
        }

        // The claim finalizer is chosen by the VPC flag when first added;
        // it is never swapped afterwards, only removed during teardown.
        if !set.meta.has_finalizer(IPCLAIM_FINALIZER)
            && !set.meta.has_finalizer(VPCIPCLAIM_FINALIZER)
        {
            let finalizer = required_finalizer(&set);
            self.add_finalizer(&mut set, finalizer).await?;
            // The finalizer update re-triggers reconciliation
            return Ok(Outcome::Done);
        }

        if set.status.is_none() {
            set.status = Some(NetSetStatus::default());
            self.store
                .update_status(&key, &mut set)
                .await
                .context("failed to initialize status")?;
            return Ok(Outcome::Done);
        }

        let pods = match pods::list_replicas(&self.store, &set).await? {
            ReplicaView::Raising => {
                info!("Waiting for pods of {}.{} to raise up", namespace, name);
                return Ok(Outcome::Done);
            }
            ReplicaView::Falling => {
                info!("Waiting for pods of {}.{} to tear down", namespace, name);
                return Ok(Outcome::Requeue);
            }
            ReplicaView::Listed(pods) => pods,
        };

        let desired = set.spec.replicas as usize;
        if pods.len() > desired {
            info!(
                "Going to tear down pods of {}.{} ({} > {})",
                namespace,
                name,
                pods.len(),
                desired
            );
            pods::teardown_replicas(&self.store, &set, &pods, false).await?;
            self.set_message(&mut set, MSG_SCALING_DOWN).await?;
            return Ok(Outcome::Done);
        }
        if pods.len() < desired {
            info!(
                "Pod missing for {}.{}, current pods count: {}",
                namespace,
                name,
                pods.len()
            );
            if pods::create_replicas(&self.store, &mut set, &pods).await? {
                self.set_message(&mut set, MSG_WAIT_CLAIM).await?;
                return Ok(Outcome::Requeue);
            }
            return Ok(Outcome::Done);
        }

        self.set_message(&mut set, MSG_CONVERGED).await?;
        Ok(Outcome::Done)
    }

    /// Deletion sequence: pods first, claims only once every pod is
    /// observed gone, finalizer last.
    async fn finalize(&self, mut set: NetSet) -> anyhow::Result<Outcome> {
        let namespace = set.meta.namespace.clone();
        let name = set.meta.name.clone();
        info!("NetSet {}.{} marked as deleted, doing cleanup", namespace, name);

        let pods = match pods::list_replicas(&self.store, &set).await? {
            ReplicaView::Raising => {
                info!("Waiting for pods of {}.{} to raise up", namespace, name);
                return Ok(Outcome::Done);
            }
            ReplicaView::Falling => {
                info!("Waiting for pods of {}.{} to tear down", namespace, name);
                return Ok(Outcome::Requeue);
            }
            ReplicaView::Listed(pods) => pods,
        };

        // Claims must outlive every pod. Freeing an address while its
        // process is still bound to it would let a newly created claim
        // hand the same IP to a different pod.
        if !pods.is_empty() {
            pods::teardown_replicas(&self.store, &set, &pods, true).await?;
            self.set_message(&mut set, MSG_TERMINATING).await?;
            return Ok(Outcome::Done);
        }

        if set.meta.has_finalizer(IPCLAIM_FINALIZER) {
            claims::delete_ip_claims(&self.store, &mut set).await?;
            self.remove_finalizer(&mut set, IPCLAIM_FINALIZER).await?;
        } else if set.meta.has_finalizer(VPCIPCLAIM_FINALIZER) {
            claims::delete_vpc_ip_claims(&self.store, &mut set).await?;
            self.remove_finalizer(&mut set, VPCIPCLAIM_FINALIZER).await?;
        }

        // Safe to finish: either no finalizer was ever added, or every
        // dependent resource is confirmed gone.
        if set.meta.finalizers.is_empty() {
            self.store
                .delete(&registry::netset_key(&namespace, &name))
                .await
                .context("failed to remove netset")?;
            info!("NetSet {}.{} deleted", namespace, name);
        }
        Ok(Outcome::Done)
    }

    async fn add_finalizer(&self, set: &mut NetSet, finalizer: &str) -> anyhow::Result<()> {
        set.meta.finalizers.push(finalizer.to_string());
        let key = registry::netset_key(&set.meta.namespace, &set.meta.name);
        self.store
            .update(&key, set)
            .await
            .with_context(|| format!("failed to add finalizer {}", finalizer))?;
        info!(
            "Added finalizer {} to {}.{}",
            finalizer, set.meta.namespace, set.meta.name
        );
        Ok(())
    }

    async fn remove_finalizer(&self, set: &mut NetSet, finalizer: &str) -> anyhow::Result<()> {
        set.meta.finalizers.retain(|f| f != finalizer);
        let key = registry::netset_key(&set.meta.namespace, &set.meta.name);
        self.store
            .update(&key, set)
            .await
            .with_context(|| format!("failed to remove finalizer {}", finalizer))?;
        info!(
            "Removed finalizer {} from {}.{}",
            finalizer, set.meta.namespace, set.meta.name
        );
        Ok(())
    }

    /// Record a progress message on the status, writing only on change.
    async fn set_message(&self, set: &mut NetSet, message: &str) -> anyhow::Result<()> {
        let status = set.status.get_or_insert_with(Default::default);
        if status.message == message {
            return Ok(());
        }
        status.message = message.to_string();
        let key = registry::netset_key(&set.meta.namespace, &set.meta.name);
        self.store
            .update_status(&key, set)
            .await
            .context("failed to update status message")?;
        Ok(())
    }
}

fn required_finalizer(set: &NetSet) -> &'static str {
    if set.spec.on_vpc {
        VPCIPCLAIM_FINALIZER
    } else {
        IPCLAIM_FINALIZER
    }
}
