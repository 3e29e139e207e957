//! Shared error types for the chaincode client.

use thiserror::Error;

/// Status carried by errors for responses of an unexpected shape.
pub const STATUS_BAD_GATEWAY: u16 = 502;

/// Status carried by input validation errors.
pub const STATUS_BAD_REQUEST: u16 = 400;

/// Status carried by local I/O and serialization failures.
pub const STATUS_INTERNAL: u16 = 500;

/// Coarse classification of an [`SdkError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed configuration, reported before any request is sent.
    InputValidation,
    /// Network or HTTP failure reported by the transport.
    Transport,
    /// The peer answered with a payload of an unexpected shape.
    MalformedResponse,
    /// The registration retry budget was consumed.
    RegistrationExhausted,
}

/// Top-level error type for the chaincode client.
#[derive(Error, Debug)]
pub enum SdkError {
    /// Required configuration is missing or invalid.
    #[error("{context} input error: {}", errors.join("; "))]
    InputValidation {
        /// The operation that rejected its input.
        context: String,
        /// Every problem found, in discovery order.
        errors: Vec<String>,
    },

    /// An invoke call failed at the transport.
    #[error("invoke() error: {function} failed with status {status}: {cause}")]
    InvokeFailed {
        /// Chaincode function name.
        function: String,
        /// Status reported by the transport.
        status: u16,
        /// Transport-level cause.
        cause: String,
    },

    /// A query call failed at the transport.
    #[error("query() error: {function} failed with status {status}: {cause}")]
    QueryFailed {
        /// Chaincode function name.
        function: String,
        /// Status reported by the transport.
        status: u16,
        /// Transport-level cause.
        cause: String,
    },

    /// A query response carried neither `result.message` nor `OK`.
    #[error("{operation}() resp error: unexpected payload {payload}")]
    MalformedResponse {
        /// The operation whose response was rejected.
        operation: String,
        /// The raw payload, rendered as JSON.
        payload: String,
    },

    /// A deploy call failed at the transport.
    #[error("deploy() error: status {status}: {cause}")]
    DeployFailed {
        /// Status reported by the transport.
        status: u16,
        /// Transport-level cause.
        cause: String,
    },

    /// A deploy succeeded but the response held no deployed name.
    #[error("deploy() error no cc name: {payload}")]
    DeployResponseInvalid {
        /// The raw payload, rendered as JSON.
        payload: String,
    },

    /// Registration gave up after exhausting its retry budget.
    #[error("register() error: {enroll_id} gave up after {attempts} attempt(s), status {status}: {cause}")]
    RegistrationFailed {
        /// The identity that failed to register.
        enroll_id: String,
        /// Attempts made, including the first.
        attempts: u32,
        /// Status from the final attempt.
        status: u16,
        /// Cause from the final attempt.
        cause: String,
    },

    /// A single-shot request (stats, lookups, unregister, check) failed.
    #[error("{operation}() error: status {status}: {cause}")]
    Transport {
        /// The operation that failed.
        operation: String,
        /// Status reported by the transport.
        status: u16,
        /// Transport-level cause.
        cause: String,
    },

    /// No invoke or query function is bound under this name.
    #[error("Unknown chaincode function: {0}")]
    UnknownFunction(String),

    /// No peer is configured at this index.
    #[error("Peer not found at index {0}")]
    PeerNotFound(usize),

    /// Writing or reading persisted state failed.
    #[error("Persist error at {path}: {source}")]
    Persist {
        /// File or directory involved.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SdkError {
    /// HTTP-style status code carried by this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InputValidation { .. } | Self::UnknownFunction(_) | Self::PeerNotFound(_) => {
                STATUS_BAD_REQUEST
            }
            Self::InvokeFailed { status, .. }
            | Self::QueryFailed { status, .. }
            | Self::DeployFailed { status, .. }
            | Self::RegistrationFailed { status, .. }
            | Self::Transport { status, .. } => *status,
            Self::MalformedResponse { .. } | Self::DeployResponseInvalid { .. } => {
                STATUS_BAD_GATEWAY
            }
            Self::Persist { .. } | Self::Serialization(_) => STATUS_INTERNAL,
        }
    }

    /// Coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputValidation { .. }
            | Self::UnknownFunction(_)
            | Self::PeerNotFound(_)
            | Self::Persist { .. }
            | Self::Serialization(_) => ErrorKind::InputValidation,
            Self::InvokeFailed { .. }
            | Self::QueryFailed { .. }
            | Self::DeployFailed { .. }
            | Self::Transport { .. } => ErrorKind::Transport,
            Self::MalformedResponse { .. } | Self::DeployResponseInvalid { .. } => {
                ErrorKind::MalformedResponse
            }
            Self::RegistrationFailed { .. } => ErrorKind::RegistrationExhausted,
        }
    }

    /// Build an input validation error from a list of problems.
    pub fn input(context: impl Into<String>, errors: Vec<String>) -> Self {
        Self::InputValidation {
            context: context.into(),
            errors,
        }
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Alias for Result with SdkError.
pub type SdkResult<T> = Result<T, SdkError>;
