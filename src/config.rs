use crate::error::{Error, Result};
use ::config::builder::{ConfigBuilder, DefaultState};
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    /// Derive and log routing rules without applying them
    pub dry_run: bool,

    /// Run the challenge solver controller next to the gateway cache watcher
    pub challenge_solver: bool,

    /// Server-side apply field manager for the VirtualServices we own
    pub field_manager: String,

    /// Deadline for a single call to the Kubernetes API
    pub request_timeout_secs: u64,

    /// First requeue delay after a failed reconcile
    pub backoff_base_secs: u64,

    /// Upper bound for the requeue delay
    pub backoff_max_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            challenge_solver: true,
            field_manager: "challengesolver".to_string(),
            request_timeout_secs: 10,
            backoff_base_secs: 1,
            backoff_max_secs: 1000,
        }
    }
}

impl ControllerConfig {
    /// Load from an optional `controller.{yaml,toml,json}` file, overridden by `APP_*` env vars.
    pub fn from_env() -> Result<Self> {
        Self::load(
            ::config::Config::builder()
                .add_source(::config::File::with_name("controller").required(false))
                .add_source(::config::Environment::with_prefix("APP").try_parsing(true)),
        )
    }

    fn load(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.field_manager.is_empty() {
            return Err(Error::ConfigError("field_manager must not be empty".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::ConfigError(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.backoff_base_secs == 0 || self.backoff_base_secs > self.backoff_max_secs {
            return Err(Error::ConfigError(format!(
                "backoff_base_secs ({}) must be in 1..={}",
                self.backoff_base_secs, self.backoff_max_secs
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
