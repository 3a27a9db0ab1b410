use futures::StreamExt;
use gateway_cert_controller::{
    cache::{watch_gateways, HostLookupCache},
    config::ControllerConfig,
    crds::{Challenge, Gateway},
    reconciler::{self, Context, RequeueBackoff},
    solver::{ChallengeSolver, KubeSolverClient},
    telemetry::{self, Metrics},
};
use kube::{
    runtime::{controller::Controller, watcher::Config as WatcherConfig},
    Api, Client,
};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();
    let metrics = Arc::new(Metrics::default());

    info!("Starting gateway cert controller");
    let config = ControllerConfig::from_env()?;
    info!(?config, "Configuration loaded");
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let shutdown = CancellationToken::new();
    let cache = Arc::new(HostLookupCache::new(metrics.clone()));

    let watcher = tokio::spawn(watch_gateways(
        Api::<Gateway>::all(client.clone()),
        cache.clone(),
        shutdown.clone(),
    ));

    if config.challenge_solver {
        let solver = ChallengeSolver::new(
            Arc::new(KubeSolverClient::new(client.clone())),
            cache,
            metrics.clone(),
        )
        .with_dry_run(config.dry_run)
        .with_field_manager(config.field_manager.clone())
        .with_request_timeout(config.request_timeout())
        .with_shutdown(shutdown.clone());

        let ctx = Arc::new(Context {
            solver,
            metrics: metrics.clone(),
            backoff: RequeueBackoff::new(
                Duration::from_secs(config.backoff_base_secs),
                Duration::from_secs(config.backoff_max_secs),
            ),
        });

        info!(dry_run = config.dry_run, "Starting challenge controller loop");
        Controller::new(Api::<Challenge>::all(client), WatcherConfig::default())
            .shutdown_on_signal()
            .run(reconciler::reconcile, reconciler::error_policy, ctx.clone())
            .for_each(|res| {
                match res {
                    Ok(o) => debug!("Reconciled: {:?}", o),
                    // the object was deleted, its pending retries will never run
                    Err(kube::runtime::controller::Error::ObjectNotFound(obj)) => {
                        reconciler::forget(&ctx, obj.namespace.as_deref(), &obj.name)
                    }
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
                futures::future::ready(())
            })
            .await;
    } else {
        info!("Challenge solver disabled, only watching gateways");
        tokio::signal::ctrl_c().await?;
    }

    info!("Shutting down");
    shutdown.cancel();
    if let Err(e) = watcher.await {
        warn!(error = %e, "Gateway watcher task failed");
    }
    metrics.log_summary();

    Ok(())
}
