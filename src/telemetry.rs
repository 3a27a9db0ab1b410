use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "gateway_cert_controller=info,kube=info";

#[derive(Debug, Default)]
pub struct Metrics {
    pub reconcile_count: AtomicU64,
    pub reconcile_errors: AtomicU64,
    pub host_collisions: AtomicU64,
    pub ambiguous_services: AtomicU64,
    pub dry_runs: AtomicU64,
    pub rules_applied: AtomicU64,
}

impl Metrics {
    pub fn record_reconcile(&self) {
        self.reconcile_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.reconcile_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_host_collision(&self) {
        self.host_collisions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ambiguous_services(&self) {
        self.ambiguous_services.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dry_run(&self) {
        self.dry_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rule_applied(&self) {
        self.rules_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn log_summary(&self) {
        info!(
            reconciles = self.reconcile_count.load(Ordering::Relaxed),
            errors = self.reconcile_errors.load(Ordering::Relaxed),
            host_collisions = self.host_collisions.load(Ordering::Relaxed),
            ambiguous_services = self.ambiguous_services.load(Ordering::Relaxed),
            dry_runs = self.dry_runs.load(Ordering::Relaxed),
            rules_applied = self.rules_applied.load(Ordering::Relaxed),
            "Controller metrics"
        );
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

#[cfg(not(debug_assertions))]
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .json()
        .init();
}

#[cfg(debug_assertions)]
pub fn init() {
    tracing_subscriber::fmt()
        .pretty()
        .without_time()
        .with_file(false)
        .with_line_number(false)
        .with_env_filter(env_filter())
        .init();
}
