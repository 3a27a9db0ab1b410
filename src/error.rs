use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The lookup cache has not observed a gateway exposing this host yet.
    #[error("host {host}: gateway not found")]
    GatewayNotFound { host: String },

    #[error("no service matched selector: {selector}")]
    NoMatchingService { selector: String },

    #[error("service {namespace}/{name}: missing port definition")]
    ServiceMissingPort { namespace: String, name: String },

    #[error("{operation} cancelled")]
    Cancelled { operation: &'static str },

    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl Error {
    /// Determine if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Error::ConfigError(_))
    }

    /// Errors that keep failing until someone fixes the cluster configuration.
    /// They are still retried, but reported louder.
    pub fn is_likely_misconfiguration(&self) -> bool {
        matches!(self, Error::ServiceMissingPort { .. })
    }
}

impl From<::config::ConfigError> for Error {
    fn from(e: ::config::ConfigError) -> Self {
        Error::ConfigError(e.to_string())
    }
}
