use flowbridge_ledger::EngineError;
use thiserror::Error;

use crate::deploy::ProjectDeploymentError;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing fields in an inbound payload.
    #[error("decode error: {0}")]
    Decode(String),

    /// The engine rejected a query or transaction.
    #[error(transparent)]
    Domain(#[from] EngineError),

    /// The host set the envelope's error field. Displays the host message
    /// unchanged.
    #[error("{0}")]
    Delegate(String),

    /// The host answered with something that is not an envelope.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("{operation} is not implemented by {variant}")]
    Unimplemented {
        operation: String,
        variant: &'static str,
    },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("host is no longer serving requests")]
    HostUnavailable,

    #[error("{target}.{method} was called from the host thread")]
    HostThreadBlocked { target: String, method: String },

    #[error("host does not provide capability {0}")]
    UnknownCapability(String),

    #[error("no accepted input after {attempts} attempts")]
    PromptAttemptsExhausted { attempts: u32 },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("project error: {0}")]
    Project(String),

    #[error(transparent)]
    Deployment(Box<ProjectDeploymentError>),

    #[error("failed deploying all contracts")]
    DeploymentFailed,

    #[error(transparent)]
    Value(#[from] crate::value::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

impl From<ProjectDeploymentError> for Error {
    fn from(value: ProjectDeploymentError) -> Self {
        Self::Deployment(Box::new(value))
    }
}

impl From<flowbridge_ledger::HexError> for Error {
    fn from(value: flowbridge_ledger::HexError) -> Self {
        Self::Decode(value.to_string())
    }
}
