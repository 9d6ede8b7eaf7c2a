//! RPC status codes and the mapping from core errors.

use car_core::{ContextError, RepoError, ResolveError, StoreError, TxError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RpcResult<T> = Result<T, RpcStatus>;

/// Transport-neutral status code, modelled on gRPC codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcCode {
    NotFound,
    InvalidArgument,
    FailedPrecondition,
    Aborted,
    Unavailable,
    Cancelled,
    DeadlineExceeded,
    Internal,
}

impl RpcCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidArgument => "invalid_argument",
            Self::FailedPrecondition => "failed_precondition",
            Self::Aborted => "aborted",
            Self::Unavailable => "unavailable",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Internal => "internal",
        }
    }
}

/// Error envelope returned by every `CarApi` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcStatus {
    pub code: RpcCode,
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl Display for RpcStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl Error for RpcStatus {}

impl From<RepoError> for RpcStatus {
    fn from(value: RepoError) -> Self {
        let code = match &value {
            RepoError::CarNotFound(_) => RpcCode::NotFound,
            RepoError::Store(StoreError::Constraint(_) | StoreError::InvalidPage { .. }) => {
                RpcCode::InvalidArgument
            }
            RepoError::Store(_) => RpcCode::Internal,
            RepoError::Resolve(ResolveError::UserNotFound(_)) => RpcCode::FailedPrecondition,
            RepoError::Resolve(_) => RpcCode::Unavailable,
            RepoError::Transaction(TxError::Open(_)) => RpcCode::Unavailable,
            RepoError::Transaction(TxError::Commit(_)) => RpcCode::Aborted,
            RepoError::Transaction(_) => RpcCode::Internal,
            RepoError::Interrupted(ContextError::Cancelled) => RpcCode::Cancelled,
            RepoError::Interrupted(ContextError::DeadlineExceeded) => RpcCode::DeadlineExceeded,
        };
        Self::new(code, value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{RpcCode, RpcStatus};
    use car_core::{ContextError, RepoError, ResolveError, StoreError, TxError};

    fn code_of(err: RepoError) -> RpcCode {
        RpcStatus::from(err).code
    }

    #[test]
    fn domain_errors_map_to_expected_codes() {
        assert_eq!(code_of(RepoError::CarNotFound(1)), RpcCode::NotFound);
        assert_eq!(
            code_of(RepoError::Store(StoreError::Constraint("CHECK".to_string()))),
            RpcCode::InvalidArgument
        );
        assert_eq!(
            code_of(RepoError::Resolve(ResolveError::Unavailable("down".to_string()))),
            RpcCode::Unavailable
        );
        assert_eq!(
            code_of(RepoError::Resolve(ResolveError::UserNotFound(2))),
            RpcCode::FailedPrecondition
        );
        assert_eq!(
            code_of(RepoError::Transaction(TxError::Nested)),
            RpcCode::Internal
        );
        assert_eq!(
            code_of(RepoError::Interrupted(ContextError::DeadlineExceeded)),
            RpcCode::DeadlineExceeded
        );
    }

    #[test]
    fn status_message_keeps_error_text() {
        let status = RpcStatus::from(RepoError::CarNotFound(12));
        assert_eq!(status.message, "car not found: 12");
        assert_eq!(status.to_string(), "not_found: car not found: 12");
    }
}
