use crate::crds::Gateway;
use kube::ResourceExt;
use std::collections::HashSet;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("gateway has no namespace")]
    MissingNamespace,
    #[error("gateway has no name")]
    MissingName,
}

/// The hosts one gateway exposes at the moment an event was observed.
///
/// Only hosts that can be proven over HTTP-01 are kept: wildcard hosts are dropped and
/// `namespace/host` entries are reduced to `host`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewaySnapshot {
    gateway_id: String,
    hosts: Vec<String>,
}

impl GatewaySnapshot {
    pub fn new<I, S>(gateway_id: impl Into<String>, declared_hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            gateway_id: gateway_id.into(),
            hosts: solvable_hosts(declared_hosts),
        }
    }

    /// `<namespace>/<name>` of the owning gateway
    pub fn gateway_id(&self) -> &str {
        &self.gateway_id
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }
}

impl TryFrom<&Gateway> for GatewaySnapshot {
    type Error = SnapshotError;

    fn try_from(gateway: &Gateway) -> Result<Self, Self::Error> {
        let namespace = gateway
            .namespace()
            .filter(|n| !n.is_empty())
            .ok_or(SnapshotError::MissingNamespace)?;
        let name = gateway
            .metadata
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or(SnapshotError::MissingName)?;

        Ok(Self::new(
            gateway_id(&namespace, name),
            gateway.declared_hosts(),
        ))
    }
}

pub fn gateway_id(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

fn solvable_hosts<I, S>(declared: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    declared
        .into_iter()
        .filter_map(|host| {
            let host = host.as_ref();
            // wildcard certificates cannot be solved via http-01
            if host.contains('*') {
                return None;
            }
            let host = host.split_once('/').map_or(host, |(_, h)| h);
            (!host.is_empty()).then(|| host.to_string())
        })
        .filter(|host| seen.insert(host.clone()))
        .collect()
}

/// Hosts added in `newer` and hosts removed from `old`, both in input order
pub fn diff(old: &[String], newer: &[String]) -> (Vec<String>, Vec<String>) {
    let old_set: HashSet<&str> = old.iter().map(String::as_str).collect();
    let new_set: HashSet<&str> = newer.iter().map(String::as_str).collect();

    let added = newer
        .iter()
        .filter(|h| !old_set.contains(h.as_str()))
        .cloned()
        .collect();
    let removed = old
        .iter()
        .filter(|h| !new_set.contains(h.as_str()))
        .cloned()
        .collect();

    (added, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crds::{GatewaySpec, Server};
    use kube::api::ObjectMeta;

    fn gateway(namespace: Option<&str>, name: Option<&str>, hosts: &[&str]) -> Gateway {
        Gateway {
            metadata: ObjectMeta {
                name: name.map(str::to_string),
                namespace: namespace.map(str::to_string),
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

    #[test]
    fn test_snapshot_filters_and_strips_hosts() {
        let gw = gateway(
            Some("example"),
            Some("testy"),
            &[
                "a.b.c.d",
                "a.example.com",
                "example/dns.host.name",
                "*.dns.example.com",
                "team/*.wild.example.com",
            ],
        );

        let snapshot = GatewaySnapshot::try_from(&gw).unwrap();
        assert_eq!(snapshot.gateway_id(), "example/testy");
        assert_eq!(
            snapshot.hosts(),
            &["a.b.c.d", "a.example.com", "dns.host.name"]
        );
    }

    #[test]
    fn test_snapshot_dedupes_hosts_across_servers() {
        let mut gw = gateway(Some("example"), Some("testy"), &["a.example.com"]);
        gw.spec.servers.push(Server {
            hosts: vec!["ns/a.example.com".to_string(), "b.example.com".to_string()],
            ..Default::default()
        });

        let snapshot = GatewaySnapshot::try_from(&gw).unwrap();
        assert_eq!(snapshot.hosts(), &["a.example.com", "b.example.com"]);
    }

    #[test]
    fn test_snapshot_requires_identity() {
        let no_ns = gateway(None, Some("testy"), &["a.example.com"]);
        assert_eq!(
            GatewaySnapshot::try_from(&no_ns),
            Err(SnapshotError::MissingNamespace)
        );

        let no_name = gateway(Some("example"), None, &["a.example.com"]);
        assert_eq!(
            GatewaySnapshot::try_from(&no_name),
            Err(SnapshotError::MissingName)
        );
    }

    #[test]
    fn test_snapshot_rejects_empty_identity() {
        let empty_ns = gateway(Some(""), Some("testy"), &["a.example.com"]);
        assert_eq!(
            GatewaySnapshot::try_from(&empty_ns),
            Err(SnapshotError::MissingNamespace)
        );

        let empty_name = gateway(Some("example"), Some(""), &["a.example.com"]);
        assert_eq!(
            GatewaySnapshot::try_from(&empty_name),
            Err(SnapshotError::MissingName)
        );
    }

    #[test]
    fn test_diff() {
        let old = vec!["a".to_string(), "b".to_string()];
        let newer = vec!["b".to_string(), "c".to_string()];

        let (added, removed) = diff(&old, &newer);
        assert_eq!(added, vec!["c".to_string()]);
        assert_eq!(removed, vec!["a".to_string()]);
    }

    #[test]
    fn test_diff_unchanged() {
        let hosts = vec!["a".to_string(), "b".to_string()];
        let (added, removed) = diff(&hosts, &hosts);
        assert!(added.is_empty());
        assert!(removed.is_empty());
    }
}
