use crate::crds::{
    Challenge, Destination, HTTPMatchRequest, HTTPRoute, HTTPRouteDestination, PortSelector,
    StringMatch, VirtualService, VirtualServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{api::ObjectMeta, Resource, ResourceExt};
use std::collections::BTreeMap;

pub const ROUTE_NAME: &str = "solver";

pub fn challenge_path(token: &str) -> String {
    format!("/.well-known/acme-challenge/{}", token)
}

/// Build the VirtualService sending the challenge's validation request through `gateway`
/// to the solver service.
///
/// The rule is named after the Challenge and owned by it, so it is garbage collected
/// together with the Challenge.
pub fn routing_rule(challenge: &Challenge, gateway: &str, service: &str, port: u32) -> VirtualService {
    VirtualService {
        metadata: ObjectMeta {
            name: Some(challenge.name_any()),
            namespace: challenge.namespace(),
            owner_references: Some(vec![owner_reference(challenge)]),
            labels: Some({
                let mut labels = BTreeMap::new();
                labels.insert(
                    "app.kubernetes.io/managed-by".to_string(),
                    "gateway-cert-controller".to_string(),
                );
                labels.insert(
                    "app.kubernetes.io/component".to_string(),
                    "acme-http01-solver".to_string(),
                );
                labels
            }),
            ..Default::default()
        },
        spec: VirtualServiceSpec {
            hosts: vec![challenge.spec.dns_name.clone()],
            gateways: vec![gateway.to_string()],
            http: vec![HTTPRoute {
                name: Some(ROUTE_NAME.to_string()),
                matches: vec![HTTPMatchRequest {
                    uri: Some(StringMatch::Exact(challenge_path(&challenge.spec.token))),
                }],
                route: vec![HTTPRouteDestination {
                    destination: Destination {
                        host: service.to_string(),
                        subset: None,
                        port: Some(PortSelector { number: port }),
                    },
                    weight: None,
                }],
            }],
        },
    }
}

fn owner_reference(challenge: &Challenge) -> OwnerReference {
    OwnerReference {
        api_version: Challenge::api_version(&()).to_string(),
        kind: Challenge::kind(&()).to_string(),
        name: challenge.name_any(),
        uid: challenge.uid().unwrap_or_default(),
        ..Default::default()
    }
}
