use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Gateway CRD (Istio networking v1beta1)
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "networking.istio.io",
    version = "v1beta1",
    kind = "Gateway",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySpec {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
    #[serde(default)]
    pub servers: Vec<Server>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<ServerPort>,
    /// Hosts exposed by this server, optionally prefixed with `namespace/`
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<ServerTlsSettings>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerPort {
    pub number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerTlsSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https_redirect: Option<bool>,
}

impl Gateway {
    /// Every host string declared across all servers, in declaration order
    pub fn declared_hosts(&self) -> impl Iterator<Item = &str> {
        self.spec
            .servers
            .iter()
            .flat_map(|s| s.hosts.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_istio_gateway() {
        let gw: Gateway = serde_json::from_value(serde_json::json!({
            "apiVersion": "networking.istio.io/v1beta1",
            "kind": "Gateway",
            "metadata": { "name": "public", "namespace": "routing" },
            "spec": {
                "selector": { "istio": "ingressgateway" },
                "servers": [
                    {
                        "port": { "number": 443, "name": "https", "protocol": "HTTPS" },
                        "hosts": ["a.example.com", "team/b.example.com"],
                        "tls": { "mode": "SIMPLE", "credentialName": "routing-public-abc" }
                    },
                    { "port": { "number": 80, "name": "http", "protocol": "HTTP" }, "hosts": ["*.example.com"] }
                ]
            }
        }))
        .unwrap();

        assert_eq!(
            gw.declared_hosts().collect::<Vec<_>>(),
            vec!["a.example.com", "team/b.example.com", "*.example.com"]
        );
        assert_eq!(
            gw.spec.servers[0]
                .tls
                .as_ref()
                .and_then(|t| t.credential_name.as_deref()),
            Some("routing-public-abc")
        );
    }

    #[test]
    fn test_missing_servers_defaults_to_empty() {
        let gw: Gateway = serde_json::from_value(serde_json::json!({
            "apiVersion": "networking.istio.io/v1beta1",
            "kind": "Gateway",
            "metadata": { "name": "empty", "namespace": "routing" },
            "spec": {}
        }))
        .unwrap();

        assert_eq!(gw.declared_hosts().count(), 0);
    }
}
