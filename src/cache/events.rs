use super::{diff, GatewaySnapshot, HostLookupCache};
use crate::crds::Gateway;
use futures::StreamExt;
use kube::{
    runtime::{watcher, WatchStreamExt},
    Api, ResourceExt,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Turns gateway watch events into cache updates.
///
/// Remembers the last snapshot of every gateway so an `Apply` can be diffed against it,
/// and treats a watcher re-list as a full resync of the cache.
pub struct GatewayEventHandler {
    cache: Arc<HostLookupCache>,
    known: HashMap<String, GatewaySnapshot>,
    relist: Option<HashMap<String, GatewaySnapshot>>,
}

impl GatewayEventHandler {
    pub fn new(cache: Arc<HostLookupCache>) -> Self {
        Self {
            cache,
            known: HashMap::new(),
            relist: None,
        }
    }

    pub fn handle(&mut self, event: watcher::Event<Gateway>) {
        match event {
            watcher::Event::Apply(gw) => self.apply(&gw),
            watcher::Event::Delete(gw) => self.delete(&gw),
            watcher::Event::Init => {
                debug!("Gateway re-list started");
                self.relist = Some(HashMap::new());
            }
            watcher::Event::InitApply(gw) => match self.relist.as_mut() {
                Some(relist) => {
                    if let Some(snapshot) = snapshot(&gw) {
                        relist.insert(snapshot.gateway_id().to_string(), snapshot);
                    }
                }
                None => self.apply(&gw),
            },
            watcher::Event::InitDone => self.finish_relist(),
        }
    }

    /// Number of gateways currently tracked
    pub fn tracked(&self) -> usize {
        self.known.len()
    }

    fn apply(&mut self, gw: &Gateway) {
        let Some(snapshot) = snapshot(gw) else {
            return;
        };

        match self
            .known
            .insert(snapshot.gateway_id().to_string(), snapshot.clone())
        {
            Some(previous) => self.cache.on_update(&previous, &snapshot),
            None => self.cache.on_add(&snapshot),
        }
    }

    fn delete(&mut self, gw: &Gateway) {
        let Some(snapshot) = snapshot(gw) else {
            return;
        };

        // the last state we applied is what the cache holds for this gateway
        let applied = self
            .known
            .remove(snapshot.gateway_id())
            .unwrap_or(snapshot);
        self.cache.on_delete(&applied);
    }

    fn finish_relist(&mut self) {
        let Some(current) = self.relist.take() else {
            return;
        };

        for (id, stale) in &self.known {
            if !current.contains_key(id) {
                debug!(gateway = %id, "Gateway gone after re-list");
                self.cache.on_delete(stale);
            }
        }

        for (id, snapshot) in &current {
            if let Some(previous) = self.known.get(id) {
                let (_, removed) = diff(previous.hosts(), snapshot.hosts());
                self.cache.delete(&removed);
            }
        }

        // re-add every listed host, the cache may have lost entries a plain diff keeps
        for snapshot in current.values() {
            self.cache.on_add(snapshot);
        }

        info!(
            gateways = current.len(),
            hosts = self.cache.len(),
            "Gateway lookup cache synced"
        );
        self.known = current;
    }
}

fn snapshot(gw: &Gateway) -> Option<GatewaySnapshot> {
    match GatewaySnapshot::try_from(gw) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            debug!(gateway = %gw.name_any(), error = %e, "Ignoring gateway event");
            None
        }
    }
}

/// Keep the cache in sync with every gateway in the cluster until `shutdown` fires
pub async fn watch_gateways(
    api: Api<Gateway>,
    cache: Arc<HostLookupCache>,
    shutdown: CancellationToken,
) {
    let mut handler = GatewayEventHandler::new(cache);
    let mut events = watcher(api, watcher::Config::default())
        .default_backoff()
        .boxed();

    info!("Starting gateway watcher");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.next() => match event {
                Some(Ok(event)) => handler.handle(event),
                Some(Err(e)) => warn!(error = %e, "Gateway watch error"),
                None => break,
            },
        }
    }
    info!(gateways = handler.tracked(), "Gateway watcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crds::{GatewaySpec, Server};
    use kube::api::ObjectMeta;

    fn gateway(namespace: &str, name: &str, hosts: &[&str]) -> Gateway {
        Gateway {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: GatewaySpec {
                servers: vec![Server {
                    hosts: hosts.iter().map(|h| h.to_string()).collect(),
                    ..Default::default()
                }],
                ..Default::default()
            },
        }
    }

    fn handler() -> (GatewayEventHandler, Arc<HostLookupCache>) {
        let cache = Arc::new(HostLookupCache::default());
        (GatewayEventHandler::new(cache.clone()), cache)
    }

    #[test]
    fn test_apply_adds_hosts() {
        let (mut handler, cache) = handler();
        handler.handle(watcher::Event::Apply(gateway(
            "example",
            "testy",
            &[
                "a.b.c.d",
                "a.example.com",
                "example/dns.host.name",
                "*.dns.example.com",
            ],
        )));

        assert_eq!(cache.get("a.b.c.d").as_deref(), Some("example/testy"));
        assert_eq!(cache.get("a.example.com").as_deref(), Some("example/testy"));
        assert_eq!(cache.get("dns.host.name").as_deref(), Some("example/testy"));
        assert_eq!(cache.get("missing"), None);
        assert_eq!(cache.get("*.dns.example.com"), None);

        handler.handle(watcher::Event::Apply(gateway("example", "missing", &["missing"])));
        assert_eq!(cache.get("missing").as_deref(), Some("example/missing"));
    }

    #[test]
    fn test_second_apply_is_an_update() {
        let (mut handler, cache) = handler();
        handler.handle(watcher::Event::Apply(gateway(
            "example",
            "testy",
            &["a.b.c.d", "a.example.com"],
        )));
        assert!(cache.get("a.example.com").is_some());

        let updated = ["a.b.c.d", "b.example.com", "x.y.z"];
        handler.handle(watcher::Event::Apply(gateway("example", "testy", &updated)));

        assert_eq!(cache.get("a.example.com"), None);
        for host in updated {
            assert_eq!(cache.get(host).as_deref(), Some("example/testy"));
        }
        assert_eq!(handler.tracked(), 1);
    }

    #[test]
    fn test_delete_removes_last_applied_hosts() {
        let (mut handler, cache) = handler();
        handler.handle(watcher::Event::Apply(gateway(
            "example",
            "testy",
            &["a.b.c.d", "a.example.com"],
        )));

        // the delete payload may be an older version of the object
        handler.handle(watcher::Event::Delete(gateway("example", "testy", &["a.b.c.d"])));

        assert_eq!(cache.get("a.b.c.d"), None);
        assert_eq!(cache.get("a.example.com"), None);
        assert_eq!(handler.tracked(), 0);
    }

    #[test]
    fn test_malformed_payloads_are_ignored() {
        let (mut handler, cache) = handler();
        let mut anonymous = gateway("example", "testy", &["a.example.com"]);
        anonymous.metadata.name = None;
        let mut unscoped = gateway("example", "testy", &["a.example.com"]);
        unscoped.metadata.namespace = None;

        handler.handle(watcher::Event::Apply(anonymous.clone()));
        handler.handle(watcher::Event::Apply(unscoped.clone()));
        handler.handle(watcher::Event::Delete(anonymous));
        handler.handle(watcher::Event::Delete(unscoped));
        handler.handle(watcher::Event::Apply(Gateway::new("no-namespace", Default::default())));

        assert!(cache.is_empty());
        assert_eq!(handler.tracked(), 0);
    }

    #[test]
    fn test_relist_resyncs_cache() {
        let (mut handler, cache) = handler();
        handler.handle(watcher::Event::Apply(gateway("example", "kept", &["a", "b"])));
        handler.handle(watcher::Event::Apply(gateway("example", "gone", &["g"])));

        handler.handle(watcher::Event::Init);
        handler.handle(watcher::Event::InitApply(gateway("example", "kept", &["b", "c"])));
        handler.handle(watcher::Event::InitApply(gateway("example", "fresh", &["f"])));

        // nothing changes until the re-list completes
        assert_eq!(cache.get("g").as_deref(), Some("example/gone"));
        assert_eq!(cache.get("f"), None);

        handler.handle(watcher::Event::InitDone);

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b").as_deref(), Some("example/kept"));
        assert_eq!(cache.get("c").as_deref(), Some("example/kept"));
        assert_eq!(cache.get("g"), None);
        assert_eq!(cache.get("f").as_deref(), Some("example/fresh"));
        assert_eq!(handler.tracked(), 2);
    }

    #[test]
    fn test_relist_restores_host_lost_to_deleted_rival() {
        let (mut handler, cache) = handler();
        handler.handle(watcher::Event::Apply(gateway("a", "gw", &["shared"])));
        handler.handle(watcher::Event::Apply(gateway("b", "gw", &["shared"])));
        handler.handle(watcher::Event::Delete(gateway("a", "gw", &["shared"])));

        // deleting the loser drops the host the winner still declares
        assert_eq!(cache.get("shared"), None);

        handler.handle(watcher::Event::Init);
        handler.handle(watcher::Event::InitApply(gateway("b", "gw", &["shared"])));
        handler.handle(watcher::Event::InitDone);

        assert_eq!(cache.get("shared").as_deref(), Some("b/gw"));
        assert_eq!(handler.tracked(), 1);
    }

    #[test]
    fn test_init_apply_without_init_is_applied() {
        let (mut handler, cache) = handler();
        handler.handle(watcher::Event::InitApply(gateway("example", "testy", &["a"])));
        assert_eq!(cache.get("a").as_deref(), Some("example/testy"));

        handler.handle(watcher::Event::InitDone);
        assert_eq!(cache.get("a").as_deref(), Some("example/testy"));
    }
}
