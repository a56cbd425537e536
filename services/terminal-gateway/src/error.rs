//! Error handling module with type-safe, non-exhaustive error types
//!
//! Every rejected request ends up as one of these variants and is surfaced
//! through the caller's protocol: a gRPC status, gRPC-Web status headers or a
//! JSON error body. Messages of the credential variants are part of the wire
//! contract and must not change.

use std::time::Duration;

use thiserror::Error;
use tonic::{Code, Status};
use uuid::Uuid;

use crate::macaroon::MacaroonError;
use crate::rootkey::RootKeyError;

/// Metadata key carrying the correlation ID of a failed call.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Non-exhaustive error enum for forward compatibility
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Zero (or more than one) credential tokens where exactly one is required
    #[error("expected 1 macaroon, got {count}")]
    MissingCredential {
        /// Number of credential values found in the request metadata
        count: usize,
    },

    /// Credential bytes do not deserialize into a token
    #[error("unable to unmarshal macaroon: {reason}")]
    MalformedCredential {
        /// Decoder failure
        reason: String,
    },

    /// The token's root key is not known to the backend that should verify it
    #[error("cannot get macaroon: {reason}")]
    UnknownRootKey {
        /// Root-key store failure
        reason: String,
    },

    /// Root key found but signature, caveat or permission check failed
    #[error("verification failed: {reason}")]
    Unauthorized {
        /// Why verification failed
        reason: String,
    },

    /// Basic-Auth value does not match the configured UI password
    #[error("invalid auth: invalid basic auth")]
    InvalidPassword,

    /// No accepted auth mode succeeded
    #[error("{reason}")]
    Unauthenticated {
        /// Most specific reason available
        reason: String,
    },

    /// The method is not part of any compiled-in backend surface
    #[error("{method}: unknown permissions required for method")]
    UnknownMethod {
        /// Fully qualified gRPC method
        method: String,
    },

    /// Request could not be understood by the gateway
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// Description of the problem
        reason: String,
    },

    /// Request uses a wire feature the gateway does not implement
    #[error("unsupported: {reason}")]
    Unsupported {
        /// Description of the unsupported feature
        reason: String,
    },

    /// A backend could not be reached
    #[error("backend {backend} unavailable: {reason}")]
    UpstreamUnavailable {
        /// Backend (or backend-owned store) name
        backend: String,
        /// Transport failure
        reason: String,
    },

    /// An outbound call exceeded its deadline
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        /// What was being waited on
        operation: String,
        /// The deadline that expired
        duration: Duration,
    },

    /// Super macaroon baking failed; no token was produced
    #[error("unable to bake super macaroon: {source}")]
    AggregationFailed {
        /// The failure that aborted baking
        source: Box<GatewayError>,
    },

    /// Error status returned by a backend, relayed unchanged
    #[error("{}", .0.message())]
    Upstream(Status),

    /// Internal error (details sanitized in responses)
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Error codes for gRPC/API responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MissingCredential,
    MalformedCredential,
    UnknownRootKey,
    Unauthorized,
    InvalidPassword,
    Unauthenticated,
    UnknownMethod,
    InvalidRequest,
    Unsupported,
    UpstreamUnavailable,
    Timeout,
    AggregationFailed,
    Upstream,
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredential => "MISSING_CREDENTIAL",
            Self::MalformedCredential => "MALFORMED_CREDENTIAL",
            Self::UnknownRootKey => "UNKNOWN_ROOT_KEY",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::UnknownMethod => "UNKNOWN_METHOD",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::Unsupported => "UNSUPPORTED",
            Self::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            Self::Timeout => "TIMEOUT",
            Self::AggregationFailed => "AGGREGATION_FAILED",
            Self::Upstream => "UPSTREAM_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Get the gRPC status code for this error.
    ///
    /// Credential and password failures are reported as `Unknown`, the code
    /// clients of the core daemon already see for them.
    pub fn grpc_code(&self) -> Code {
        match self {
            Self::MissingCredential
            | Self::MalformedCredential
            | Self::UnknownRootKey
            | Self::Unauthorized
            | Self::InvalidPassword => Code::Unknown,
            Self::Unauthenticated => Code::Unauthenticated,
            Self::UnknownMethod | Self::Unsupported => Code::Unimplemented,
            Self::InvalidRequest => Code::InvalidArgument,
            Self::UpstreamUnavailable => Code::Unavailable,
            Self::Timeout => Code::DeadlineExceeded,
            Self::AggregationFailed | Self::Internal => Code::Internal,
            // Relayed statuses keep their own code, see GatewayError::to_status.
            Self::Upstream => Code::Unknown,
        }
    }

    /// Whether this code is an authentication/authorization rejection.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential
                | Self::MalformedCredential
                | Self::UnknownRootKey
                | Self::Unauthorized
                | Self::InvalidPassword
                | Self::Unauthenticated
        )
    }
}

impl GatewayError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingCredential { .. } => ErrorCode::MissingCredential,
            Self::MalformedCredential { .. } => ErrorCode::MalformedCredential,
            Self::UnknownRootKey { .. } => ErrorCode::UnknownRootKey,
            Self::Unauthorized { .. } => ErrorCode::Unauthorized,
            Self::InvalidPassword => ErrorCode::InvalidPassword,
            Self::Unauthenticated { .. } => ErrorCode::Unauthenticated,
            Self::UnknownMethod { .. } => ErrorCode::UnknownMethod,
            Self::InvalidRequest { .. } => ErrorCode::InvalidRequest,
            Self::Unsupported { .. } => ErrorCode::Unsupported,
            Self::UpstreamUnavailable { .. } => ErrorCode::UpstreamUnavailable,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::AggregationFailed { .. } => ErrorCode::AggregationFailed,
            Self::Upstream(_) => ErrorCode::Upstream,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Convert to a gRPC status. The message is the Display text, except for
    /// internal errors which never expose their details.
    pub fn to_status(&self) -> Status {
        match self {
            Self::Upstream(status) => Status::new(status.code(), status.message()),
            Self::Internal(_) => Status::new(Code::Internal, "internal error"),
            other => Status::new(other.code().grpc_code(), other.to_string()),
        }
    }

    /// Convert to a gRPC status tagged with a correlation ID in its metadata.
    pub fn to_status_with_correlation(&self, correlation_id: Uuid) -> Status {
        let mut status = self.to_status();
        if let Ok(value) = correlation_id.to_string().parse() {
            status.metadata_mut().insert(CORRELATION_ID_HEADER, value);
        }
        status
    }

    /// Check if this error is worth retrying by the caller. The gateway
    /// itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UpstreamUnavailable { .. } | Self::Timeout { .. } => true,
            Self::Upstream(status) => {
                matches!(status.code(), Code::Unavailable | Code::DeadlineExceeded)
            }
            Self::AggregationFailed { source } => source.is_retryable(),
            _ => false,
        }
    }

    /// Wrap an error as a baking failure unless it already is one.
    pub fn aggregation(source: GatewayError) -> Self {
        match source {
            already @ Self::AggregationFailed { .. } => already,
            other => Self::AggregationFailed {
                source: Box::new(other),
            },
        }
    }
}

// ============================================================================
// From trait implementations for automatic error conversion
// ============================================================================

impl From<MacaroonError> for GatewayError {
    fn from(err: MacaroonError) -> Self {
        match err {
            MacaroonError::SignatureMismatch => GatewayError::Unauthorized {
                reason: err.to_string(),
            },
            other => GatewayError::MalformedCredential {
                reason: other.to_string(),
            },
        }
    }
}

impl From<RootKeyError> for GatewayError {
    fn from(err: RootKeyError) -> Self {
        match err {
            RootKeyError::NotFound { .. } => GatewayError::UnknownRootKey {
                reason: err.to_string(),
            },
            RootKeyError::Unavailable { store, reason } => GatewayError::UpstreamUnavailable {
                backend: store,
                reason,
            },
        }
    }
}

impl From<prost::DecodeError> for GatewayError {
    fn from(err: prost::DecodeError) -> Self {
        GatewayError::InvalidRequest {
            reason: format!("unable to decode message: {err}"),
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Internal(anyhow::anyhow!("IO error: {}", err))
    }
}
