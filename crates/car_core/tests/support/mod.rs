#![allow(dead_code)]

use car_core::{CallContext, IdentityResolver, ResolveError, ResolveResult, UserId};
use std::collections::HashMap;
use std::sync::Mutex;

/// Identity resolver double that records every call it receives.
#[derive(Default)]
pub struct RecordingResolver {
    names: HashMap<UserId, String>,
    failure: Option<ResolveError>,
    one_calls: Mutex<Vec<UserId>>,
    many_calls: Mutex<Vec<Vec<UserId>>>,
}

impl RecordingResolver {
    pub fn with_names(entries: &[(UserId, &str)]) -> Self {
        Self {
            names: entries
                .iter()
                .map(|(id, name)| (*id, name.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn failing(error: ResolveError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    pub fn one_calls(&self) -> Vec<UserId> {
        self.one_calls.lock().unwrap().clone()
    }

    pub fn many_calls(&self) -> Vec<Vec<UserId>> {
        self.many_calls.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.one_calls().len() + self.many_calls().len()
    }
}

impl IdentityResolver for RecordingResolver {
    fn resolve_one(&self, _ctx: &CallContext, user_id: UserId) -> ResolveResult<String> {
        self.one_calls.lock().unwrap().push(user_id);
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        self.names
            .get(&user_id)
            .cloned()
            .ok_or(ResolveError::UserNotFound(user_id))
    }

    fn resolve_many(
        &self,
        _ctx: &CallContext,
        user_ids: &[UserId],
    ) -> ResolveResult<HashMap<UserId, String>> {
        self.many_calls.lock().unwrap().push(user_ids.to_vec());
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(user_ids
            .iter()
            .filter_map(|id| self.names.get(id).map(|name| (*id, name.clone())))
            .collect())
    }
}
