use crate::{
    crds::Challenge,
    error::{Error, Result},
    solver::ChallengeSolver,
    telemetry::Metrics,
};
use kube::{runtime::controller::Action, ResourceExt};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

pub mod backoff;

pub use backoff::RequeueBackoff;

pub struct Context {
    pub solver: ChallengeSolver,
    pub metrics: Arc<Metrics>,
    pub backoff: RequeueBackoff,
}

fn object_key(challenge: &Challenge) -> String {
    key(challenge.namespace().as_deref(), &challenge.name_any())
}

fn key(namespace: Option<&str>, name: &str) -> String {
    format!("{}/{}", namespace.unwrap_or_default(), name)
}

/// Drop the retry state of a Challenge the controller reports as gone.
///
/// Requeues for deleted objects never reach `reconcile`, so its reset is not enough.
pub fn forget(ctx: &Context, namespace: Option<&str>, name: &str) {
    debug!(challenge = %key(namespace, name), "Forgetting deleted challenge");
    ctx.backoff.reset(&key(namespace, name));
}

#[instrument(skip(ctx, challenge), fields(challenge = %object_key(&challenge)))]
pub async fn reconcile(challenge: Arc<Challenge>, ctx: Arc<Context>) -> Result<Action> {
    ctx.metrics.record_reconcile();
    let key = object_key(&challenge);
    let namespace = challenge.namespace().unwrap_or_default();

    // the watch event may be stale, solve against what the api has now
    let current = ctx.solver.fetch(&namespace, &challenge.name_any()).await?;
    if current.is_none() {
        debug!("Challenge no longer exists");
        ctx.backoff.reset(&key);
        return Ok(Action::await_change());
    }

    if let Some(vs) = ctx.solver.solve(current.as_ref()).await? {
        info!(virtual_service = %vs.name_any(), "Challenge routed");
    }

    ctx.backoff.reset(&key);
    Ok(Action::await_change())
}

/// Error handling for reconciliation
pub fn error_policy(challenge: Arc<Challenge>, error: &Error, ctx: Arc<Context>) -> Action {
    let key = object_key(&challenge);
    ctx.metrics.record_error();

    let delay = ctx.backoff.next_delay(&key);
    if error.is_likely_misconfiguration() {
        error!(challenge = %key, %error, retry_in = ?delay, "Reconciliation failed");
    } else {
        warn!(challenge = %key, %error, retry_in = ?delay, "Reconciliation failed");
    }
    Action::requeue(delay)
}
