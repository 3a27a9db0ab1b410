use crate::telemetry::Metrics;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

pub mod events;
pub mod snapshot;

pub use events::{watch_gateways, GatewayEventHandler};
pub use snapshot::{diff, gateway_id, GatewaySnapshot, SnapshotError};

pub struct HostLookupCache {
    hosts: Mutex<HashMap<String, String>>,
    metrics: Arc<Metrics>,
}

impl Default for HostLookupCache {
    fn default() -> Self {
        Self::new(Arc::new(Metrics::default()))
    }
}

impl HostLookupCache {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            hosts: Mutex::new(HashMap::new()),
            metrics,
        }
    }

    /// Point every host at `gateway`. The last writer wins when two gateways claim a host.
    pub fn add<I, S>(&self, gateway: &str, hosts: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut collisions = Vec::new();
        {
            let mut cache = self.lock();
            for host in hosts {
                let host = host.as_ref();
                if let Some(previous) = cache.insert(host.to_string(), gateway.to_string()) {
                    if previous != gateway {
                        collisions.push((host.to_string(), previous));
                    }
                }
            }
        }

        for (host, previous) in collisions {
            self.metrics.record_host_collision();
            warn!(
                host = %host,
                previous_gateway = %previous,
                gateway = %gateway,
                "Host claimed by more than one gateway, last writer wins"
            );
        }
    }

    pub fn delete<I, S>(&self, hosts: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cache = self.lock();
        for host in hosts {
            cache.remove(host.as_ref());
        }
    }

    pub fn get(&self, host: &str) -> Option<String> {
        self.lock().get(host).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn on_add(&self, gateway: &GatewaySnapshot) {
        debug!(gateway = %gateway.gateway_id(), hosts = ?gateway.hosts(), "Gateway added");
        self.add(gateway.gateway_id(), gateway.hosts());
    }

    /// Apply only the difference between two snapshots of the same gateway
    pub fn on_update(&self, old: &GatewaySnapshot, new: &GatewaySnapshot) {
        let (added, removed) = diff(old.hosts(), new.hosts());
        if added.is_empty() && removed.is_empty() {
            return;
        }

        debug!(
            gateway = %new.gateway_id(),
            added = ?added,
            removed = ?removed,
            "Gateway hosts changed"
        );
        self.add(new.gateway_id(), &added);
        self.delete(&removed);
    }

    pub fn on_delete(&self, gateway: &GatewaySnapshot) {
        debug!(gateway = %gateway.gateway_id(), hosts = ?gateway.hosts(), "Gateway deleted");
        self.delete(gateway.hosts());
    }

    // critical sections only insert/remove whole entries, poisoning is ignored
    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.hosts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
