use std::fmt;
use thiserror::Error;
use tokio::time::Duration;

/// The API call that failed while converging a managed object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Get,
    Create,
    Update,
    Delete,
}

impl fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReconcileAction::Get => write!(f, "get"),
            ReconcileAction::Create => write!(f, "create"),
            ReconcileAction::Update => write!(f, "update"),
            ReconcileAction::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Error, Debug)]
pub enum StdError {
    #[error("Kube Error: {0}")]
    KubeError(#[source] kube::Error),

    #[error("Finalizer Error: {0}")]
    // NB: awkward type because finalizer::Error embeds the reconciler error (which is this)
    // so boxing this error to break cycles
    FinalizerError(#[source] Box<kube::runtime::finalizer::Error<Error>>),

    #[error("MetadataMissing: {0}")]
    MetadataMissing(String),

    #[error("ReconcileFailed: unable to {action} {kind} '{name}': {source}")]
    ReconcileFailed {
        action: ReconcileAction,
        kind: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("TlsSecretNotProvided: {0}")]
    TlsSecretNotProvided(String),

    #[error("TlsSecretNotFound: {0}")]
    TlsSecretNotFound(String),
}

impl StdError {
    pub fn metric_label(&self) -> String {
        let label = match self {
            StdError::KubeError(_) => "kubeerror",
            StdError::FinalizerError(_) => "finalizererror",
            StdError::MetadataMissing(_) => "metadatamissing",
            StdError::ReconcileFailed { .. } => "reconcilefailed",
            StdError::TlsSecretNotProvided(_) => "tlssecretnotprovided",
            StdError::TlsSecretNotFound(_) => "tlssecretnotfound",
        };
        label.to_string()
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
    #[error("Standard Error: {0}")]
    StdError(#[source] StdError),

    #[error("Error With Requeue: {0}")]
    ErrorWithRequeue(#[source] ErrorWithRequeue),
}

impl Error {
    pub fn metric_label(&self) -> String {
        match self {
            Error::StdError(e) => e.metric_label(),
            Error::ErrorWithRequeue(e) => e.metric_label(),
        }
    }
}

impl From<StdError> for Error {
    fn from(error: StdError) -> Self {
        Error::StdError(error)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
