//! Watch-driven trigger queue feeding the reconciliation engine.
//!
//! Every store mutation is mapped to the NetSet it concerns and funneled
//! through a single worker, so one reconcile runs at a time per owner.
//! Requeue outcomes and failures are re-delivered after a delay, and a
//! periodic resync enqueues every NetSet to bound the impact of missed
//! events.

use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::netset::{NetSetController, Outcome};
use pkg_constants::labels::APP_LABEL;
use pkg_constants::state as keys;
use pkg_state::client::StateStore;
use pkg_state::error::StateError;
use pkg_state::watch::WatchEvent;
use pkg_types::netset::NetSet;

pub struct Dispatcher {
    store: StateStore,
    requeue_delay: Duration,
    resync_interval: Duration,
}

impl Dispatcher {
    pub fn new(store: StateStore, requeue_delay: Duration, resync_interval: Duration) -> Self {
        Self {
            store,
            requeue_delay,
            resync_interval,
        }
    }

    pub fn start(self, controller: NetSetController) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run(controller).await;
        })
    }

    async fn run(self, controller: NetSetController) {
        info!(
            "NetSet dispatcher started (resync={}s)",
            self.resync_interval.as_secs()
        );
        let (tx, mut triggers) = mpsc::unbounded_channel::<(String, String)>();
        let mut events = self.store.subscribe();
        let mut resync = tokio::time::interval(self.resync_interval);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(ev) => {
                        if let Some(trigger) = owner_of(&ev) {
                            let _ = tx.send(trigger);
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Watch stream lagged by {} events, resync will catch up", missed);
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = resync.tick() => {
                    match self.store.list_prefix::<NetSet>(keys::NETSET_PREFIX).await {
                        Ok(sets) => {
                            for set in sets {
                                let _ = tx.send((set.meta.namespace, set.meta.name));
                            }
                        }
                        Err(e) => warn!("Resync listing failed: {}", e),
                    }
                }
                Some((namespace, name)) = triggers.recv() => {
                    match controller.reconcile(&namespace, &name).await {
                        Ok(Outcome::Done) => {}
                        Ok(Outcome::Requeue) => {
                            self.redeliver(&tx, namespace, name);
                        }
                        Err(e) if StateError::is_conflict(&e) => {
                            // A concurrent writer won; rerun from fresh state
                            info!("Reconcile of {}.{} lost a write race, retrying", namespace, name);
                            self.redeliver(&tx, namespace, name);
                        }
                        Err(e) => {
                            warn!("Reconcile of {}.{} failed: {}", namespace, name, e);
                            self.redeliver(&tx, namespace, name);
                        }
                    }
                }
            }
        }
        info!("NetSet dispatcher terminated");
    }

    /// Re-enqueue a trigger after the configured delay. The engine never
    /// sleeps; delays live here.
    fn redeliver(
        &self,
        tx: &mpsc::UnboundedSender<(String, String)>,
        namespace: String,
        name: String,
    ) {
        let tx = tx.clone();
        let delay = self.requeue_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send((namespace, name));
        });
    }
}

/// Map a store mutation to the NetSet that must reconcile. NetSet keys
/// resolve directly; owned pods and claims resolve through the app label
/// carried in the event payload (delete events carry the last stored
/// value, so ownership of vanished objects still resolves).
fn owner_of(event: &WatchEvent) -> Option<(String, String)> {
    if let Some(rest) = event.key.strip_prefix(keys::NETSET_PREFIX) {
        let (namespace, name) = rest.split_once('/')?;
        return Some((namespace.to_string(), name.to_string()));
    }
    let rest = event
        .key
        .strip_prefix(keys::POD_PREFIX)
        .or_else(|| event.key.strip_prefix(keys::IPCLAIM_PREFIX))
        .or_else(|| event.key.strip_prefix(keys::VPCIPCLAIM_PREFIX))?;
    let (namespace, _) = rest.split_once('/')?;
    let bytes = event.value.as_ref()?;
    let doc: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    let owner = doc.get("meta")?.get("labels")?.get(APP_LABEL)?.as_str()?;
    Some((namespace.to_string(), owner.to_string()))
}
