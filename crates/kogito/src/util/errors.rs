use std::fmt;
use thiserror::Error;
use tokio::time::Duration;

/// Condition reasons written to `Failed` / `Ready` conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorReason {
    ConfigurationError,
    ResourceNotFound,
    ResourceApiNotAvailable,
    ResourceNotReady,
    DeploymentFailure,
    InternalError,
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorReason::ConfigurationError => write!(f, "ConfigurationError"),
            ErrorReason::ResourceNotFound => write!(f, "ResourceNotFound"),
            ErrorReason::ResourceApiNotAvailable => write!(f, "ResourceAPINotAvailable"),
            ErrorReason::ResourceNotReady => write!(f, "ResourceNotReady"),
            ErrorReason::DeploymentFailure => write!(f, "DeploymentFailure"),
            ErrorReason::InternalError => write!(f, "InternalError"),
        }
    }
}

#[derive(Error, Debug)]
pub enum StdError {
    #[error("JsonSerializationError: {0}")]
    JsonSerializationError(#[source] serde_json::Error),

    #[error("Kube Error: {0}")]
    KubeError(#[source] kube::Error),

    #[error("MetadataMissing: {0}")]
    MetadataMissing(String),

    #[error("ConfigurationError: {0}")]
    ConfigurationError(String),

    #[error("ResourceNotFound: {kind} '{name}' not found in namespace '{namespace}'")]
    ResourceNotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("ResourceAPINotAvailable: {kind} ({api_version}) is not served by the cluster")]
    ResourceApiNotAvailable { api_version: String, kind: String },

    #[error("ResourceNotReady: {0}")]
    ResourceNotReady(String),

    #[error("DeltaApplyError: failed to {operation} {kind} '{name}': {source}")]
    DeltaApplyError {
        operation: &'static str,
        kind: String,
        name: String,
        #[source]
        source: Box<StdError>,
    },

    #[error("HttpError: {0}")]
    HttpError(String),
}

impl StdError {
    pub fn metric_label(&self) -> String {
        let label = format!("{self:?}");
        label
            .split(|c: char| !c.is_alphanumeric())
            .next()
            .unwrap_or_default()
            .to_lowercase()
    }

    /// Retryable errors keep the parent in `Provisioning`; everything else is
    /// reported as a failed provisioning.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StdError::ResourceNotReady(_) | StdError::DeltaApplyError { .. } | StdError::KubeError(_)
        )
    }

    pub fn reason(&self) -> ErrorReason {
        match self {
            StdError::ConfigurationError(_) | StdError::MetadataMissing(_) => ErrorReason::ConfigurationError,
            StdError::ResourceNotFound { .. } => ErrorReason::ResourceNotFound,
            StdError::ResourceApiNotAvailable { .. } => ErrorReason::ResourceApiNotAvailable,
            StdError::ResourceNotReady(_) => ErrorReason::ResourceNotReady,
            StdError::DeltaApplyError { .. } | StdError::KubeError(_) => ErrorReason::DeploymentFailure,
            StdError::JsonSerializationError(_) | StdError::HttpError(_) => ErrorReason::InternalError,
        }
    }
}

#[derive(Error, Debug)]
pub struct ErrorWithRequeue {
    pub duration: Duration,
    pub error: StdError,
}

impl ErrorWithRequeue {
    pub fn new(error: StdError, duration: Duration) -> ErrorWithRequeue {
        ErrorWithRequeue { error, duration }
    }

    pub fn metric_label(&self) -> String {
        self.error.metric_label()
    }
}

impl fmt::Display for ErrorWithRequeue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    StdError(#[source] StdError),

    #[error("{0}")]
    ErrorWithRequeue(#[source] ErrorWithRequeue),
}

impl Error {
    pub fn metric_label(&self) -> String {
        match self {
            Error::StdError(e) => e.metric_label(),
            Error::ErrorWithRequeue(e) => e.metric_label(),
        }
    }

    pub fn inner(&self) -> &StdError {
        match self {
            Error::StdError(e) => e,
            Error::ErrorWithRequeue(e) => &e.error,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.inner().is_retryable()
    }

    pub fn reason(&self) -> ErrorReason {
        self.inner().reason()
    }

    /// Fixed requeue delay carried by the error, if any.
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            Error::ErrorWithRequeue(e) => Some(e.duration),
            Error::StdError(_) => None,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Error {
        Error::StdError(StdError::ConfigurationError(message.into()))
    }

    pub fn not_found(kind: &str, namespace: &str, name: &str) -> Error {
        Error::StdError(StdError::ResourceNotFound {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    pub fn api_not_available(api_version: &str, kind: &str) -> Error {
        Error::StdError(StdError::ResourceApiNotAvailable {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
        })
    }

    pub fn not_ready(message: impl Into<String>) -> Error {
        Error::StdError(StdError::ResourceNotReady(message.into()))
    }
}

impl From<StdError> for Error {
    fn from(e: StdError) -> Self {
        Error::StdError(e)
    }
}

impl From<kube::Error> for Error {
    fn from(e: kube::Error) -> Self {
        Error::StdError(StdError::KubeError(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::StdError(StdError::JsonSerializationError(e))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
