//! Identity resolver contract.
//!
//! # Responsibility
//! - Define how owner ids are turned into display names.
//! - Keep single and batch lookups as separate operations.
//!
//! # Invariants
//! - `resolve_one` fails when the user is unknown.
//! - `resolve_many` omits unknown ids instead of failing.

use crate::context::{CallContext, ContextError};
use crate::model::car::UserId;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod static_resolver;

pub use static_resolver::StaticIdentityResolver;

pub type ResolveResult<T> = Result<T, ResolveError>;

/// Identity service failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    UserNotFound(UserId),
    /// Remote call failed (transport error, service down).
    Unavailable(String),
    Interrupted(ContextError),
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::Unavailable(message) => write!(f, "identity service unavailable: {message}"),
            Self::Interrupted(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ResolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Interrupted(err) => Some(err),
            Self::UserNotFound(_) | Self::Unavailable(_) => None,
        }
    }
}

impl From<ContextError> for ResolveError {
    fn from(value: ContextError) -> Self {
        Self::Interrupted(value)
    }
}

/// Remote identity lookups consumed by the car repository.
pub trait IdentityResolver: Send + Sync {
    /// Returns the display name of one user.
    fn resolve_one(&self, ctx: &CallContext, user_id: UserId) -> ResolveResult<String>;

    /// Returns display names for every known id in `user_ids`.
    fn resolve_many(
        &self,
        ctx: &CallContext,
        user_ids: &[UserId],
    ) -> ResolveResult<HashMap<UserId, String>>;
}
