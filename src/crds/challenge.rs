use kube::CustomResource;
use schemars::{json_schema, JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};

/// Label cert-manager puts on the HTTP-01 solver service, value is the hashed dnsName
pub const DOMAIN_LABEL_KEY: &str = "acme.cert-manager.io/http-domain";

/// Label cert-manager puts on the HTTP-01 solver service, value is the hashed token
pub const TOKEN_LABEL_KEY: &str = "acme.cert-manager.io/http-token";

pub const HTTP01: &str = "HTTP-01";

/// Schema for the opaque ACME solver configuration
fn solver_schema(_gen: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "type": "object",
        "description": "ACME challenge solver configuration copied from the issuer",
        "nullable": true,
        "x-kubernetes-preserve-unknown-fields": true
    })
}

/// Challenge resource (read-only from controller perspective)
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "acme.cert-manager.io",
    version = "v1",
    kind = "Challenge",
    namespaced,
    status = "ChallengeStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeSpec {
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "authorizationURL")]
    pub authorization_url: String,
    /// Hostname being validated
    pub dns_name: String,
    #[serde(default)]
    pub wildcard: bool,
    /// `HTTP-01` or `DNS-01`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    pub token: String,
    #[serde(default)]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "solver_schema")]
    pub solver: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_ref: Option<IssuerRef>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuerRef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeStatus {
    #[serde(default)]
    pub processing: bool,
    #[serde(default)]
    pub presented: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl Challenge {
    /// Only HTTP-01 challenges for concrete hosts can be routed through a gateway.
    /// An unset type is treated as HTTP-01.
    pub fn is_http01(&self) -> bool {
        !self.spec.wildcard
            && self
                .spec
                .r#type
                .as_deref()
                .map_or(true, |t| t.eq_ignore_ascii_case(HTTP01))
    }
}
