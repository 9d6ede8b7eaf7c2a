//! In-process identity resolver backed by a fixed name table.

use super::{IdentityResolver, ResolveError, ResolveResult};
use crate::context::CallContext;
use crate::model::car::UserId;
use std::collections::{BTreeMap, HashMap};

/// Resolver answering from a name table loaded at construction.
///
/// Used by the CLI and local runs where no identity service is reachable.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityResolver {
    names: BTreeMap<UserId, String>,
}

impl StaticIdentityResolver {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (UserId, S)>,
        S: Into<String>,
    {
        Self {
            names: entries
                .into_iter()
                .map(|(id, name)| (id, name.into()))
                .collect(),
        }
    }
}

impl IdentityResolver for StaticIdentityResolver {
    fn resolve_one(&self, ctx: &CallContext, user_id: UserId) -> ResolveResult<String> {
        ctx.check()?;
        self.names
            .get(&user_id)
            .cloned()
            .ok_or(ResolveError::UserNotFound(user_id))
    }

    fn resolve_many(
        &self,
        ctx: &CallContext,
        user_ids: &[UserId],
    ) -> ResolveResult<HashMap<UserId, String>> {
        ctx.check()?;
        Ok(user_ids
            .iter()
            .filter_map(|id| self.names.get(id).map(|name| (*id, name.clone())))
            .collect())
    }
}
