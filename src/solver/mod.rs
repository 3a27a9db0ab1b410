use crate::{
    cache::HostLookupCache,
    crds::{Challenge, VirtualService},
    error::{Error, Result},
    telemetry::Metrics,
};
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use std::{future::Future, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub mod client;
pub mod hash;
pub mod rule;

pub use client::{KubeSolverClient, SolverClient};
pub use rule::{challenge_path, routing_rule};

pub struct ChallengeSolver {
    client: Arc<dyn SolverClient>,
    cache: Arc<HostLookupCache>,
    metrics: Arc<Metrics>,
    dry_run: bool,
    field_manager: String,
    request_timeout: Duration,
    shutdown: CancellationToken,
}

impl ChallengeSolver {
    pub fn new(
        client: Arc<dyn SolverClient>,
        cache: Arc<HostLookupCache>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            client,
            cache,
            metrics,
            dry_run: false,
            field_manager: "challengesolver".to_string(),
            request_timeout: Duration::from_secs(10),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_field_manager(mut self, field_manager: impl Into<String>) -> Self {
        self.field_manager = field_manager.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Abort in-flight API calls once `shutdown` is cancelled
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Fetch the current state of a Challenge, `None` once it has been deleted
    pub async fn fetch(&self, namespace: &str, name: &str) -> Result<Option<Challenge>> {
        self.guarded("get challenge", self.client.get_challenge(namespace, name))
            .await
    }

    /// Derive and apply the routing rule for `challenge`.
    ///
    /// Returns `Ok(None)` without touching the cluster when there is nothing to solve or
    /// when running in dry-run mode. Every error is retryable.
    pub async fn solve(&self, challenge: Option<&Challenge>) -> Result<Option<VirtualService>> {
        let Some(challenge) = challenge else {
            return Ok(None);
        };

        if !challenge.is_http01() {
            debug!(
                challenge = %challenge.name_any(),
                challenge_type = ?challenge.spec.r#type,
                wildcard = challenge.spec.wildcard,
                "Skipping challenge that cannot be solved over HTTP-01"
            );
            return Ok(None);
        }

        let dns_name = &challenge.spec.dns_name;
        let selector = hash::solver_selector(dns_name, &challenge.spec.token);

        // requeue to wait for the lookup cache to observe the gateway
        let gateway = self
            .cache
            .get(dns_name)
            .ok_or_else(|| Error::GatewayNotFound {
                host: dns_name.clone(),
            })?;
        debug!(host = %dns_name, gateway = %gateway, "Gateway found");

        let services = self
            .guarded("list services", self.client.list_services(&selector))
            .await?;
        let service = self.select_service(services, &selector)?;

        let service_name = service.name_any();
        let port = first_port(&service).ok_or_else(|| Error::ServiceMissingPort {
            namespace: service.namespace().unwrap_or_default(),
            name: service_name.clone(),
        })?;

        let rule = routing_rule(challenge, &gateway, &service_name, port);

        if self.dry_run {
            self.metrics.record_dry_run();
            info!(
                virtual_service = %serde_json::to_string(&rule)?,
                "dry-run: applying {}/{}",
                rule.namespace().unwrap_or_default(),
                rule.name_any()
            );
            return Ok(None);
        }

        // this controller is authoritative for these virtualservices, stomp any old versions
        let applied = self
            .guarded(
                "apply virtualservice",
                self.client.apply_virtual_service(&rule, &self.field_manager),
            )
            .await?;
        self.metrics.record_rule_applied();
        info!(
            host = %dns_name,
            gateway = %gateway,
            service = %service_name,
            port,
            "Applied challenge VirtualService {}/{}",
            applied.namespace().unwrap_or_default(),
            applied.name_any()
        );

        Ok(Some(applied))
    }

    fn select_service(&self, mut services: Vec<Service>, selector: &str) -> Result<Service> {
        if services.len() > 1 {
            services.sort_by(|a, b| {
                (a.namespace(), a.name_any()).cmp(&(b.namespace(), b.name_any()))
            });
            self.metrics.record_ambiguous_services();
            warn!(
                selector = %selector,
                candidates = ?services
                    .iter()
                    .map(|s| format!("{}/{}", s.namespace().unwrap_or_default(), s.name_any()))
                    .collect::<Vec<_>>(),
                "More than one solver service matched, using the first"
            );
        }

        // requeue to wait for the service to appear in the api
        services
            .into_iter()
            .next()
            .ok_or_else(|| Error::NoMatchingService {
                selector: selector.to_string(),
            })
    }

    async fn guarded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(Error::Cancelled { operation }),
            res = tokio::time::timeout(self.request_timeout, call) => {
                res.unwrap_or_else(|_| Err(Error::Timeout {
                    operation,
                    seconds: self.request_timeout.as_secs(),
                }))
            }
        }
    }
}

fn first_port(service: &Service) -> Option<u32> {
    let port = service.spec.as_ref()?.ports.as_ref()?.first()?.port;
    u32::try_from(port).ok()
}
