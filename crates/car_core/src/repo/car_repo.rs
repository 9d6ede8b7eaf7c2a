//! Car repository: store rows enriched with owner names.
//!
//! # Responsibility
//! - Compose store queries with identity lookups into `CarView`s.
//! - Translate raw store failures into domain errors.
//!
//! # Invariants
//! - A list call issues at most one `resolve_many`, never one call per row.
//! - An empty page issues no identity call at all.
//! - A single read either returns the full view or fails; resolver errors
//!   are never masked as empty names.
//! - Every operation runs on the session it is given.

use crate::context::ContextError;
use crate::db::tx::{Session, TxError};
use crate::identity::{IdentityResolver, ResolveError};
use crate::model::car::{CarChanges, CarId, CarListQuery, CarPage, CarView, UserId};
use crate::repo::car_store::{page_offset, CarStore, StoreError};
use log::debug;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

pub type RepoResult<T> = Result<T, RepoError>;

/// Domain-shaped error returned by every repository operation.
#[derive(Debug)]
pub enum RepoError {
    CarNotFound(CarId),
    /// Store failure other than not-found, passed through unchanged.
    Store(StoreError),
    Resolve(ResolveError),
    Transaction(TxError),
    Interrupted(ContextError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CarNotFound(id) => write!(f, "car not found: {id}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Resolve(err) => write!(f, "{err}"),
            Self::Transaction(err) => write!(f, "{err}"),
            Self::Interrupted(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CarNotFound(_) => None,
            Self::Store(err) => Some(err),
            Self::Resolve(err) => Some(err),
            Self::Transaction(err) => Some(err),
            Self::Interrupted(err) => Some(err),
        }
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => Self::CarNotFound(id),
            StoreError::Interrupted(err) => Self::Interrupted(err),
            other => Self::Store(other),
        }
    }
}

impl From<ResolveError> for RepoError {
    fn from(value: ResolveError) -> Self {
        match value {
            ResolveError::Interrupted(err) => Self::Interrupted(err),
            other => Self::Resolve(other),
        }
    }
}

impl From<TxError> for RepoError {
    fn from(value: TxError) -> Self {
        match value {
            TxError::Interrupted(err) => Self::Interrupted(err),
            other => Self::Transaction(other),
        }
    }
}

impl From<ContextError> for RepoError {
    fn from(value: ContextError) -> Self {
        Self::Interrupted(value)
    }
}

/// Orchestrates store access and owner-name enrichment.
#[derive(Clone)]
pub struct CarRepository {
    resolver: Arc<dyn IdentityResolver>,
}

impl CarRepository {
    pub fn new(resolver: Arc<dyn IdentityResolver>) -> Self {
        Self { resolver }
    }

    /// Lists one page of cars with owner names.
    ///
    /// # Contract
    /// - `total` counts every row matching the model filter.
    /// - An empty page returns `total = 0` and skips the identity service.
    /// - Owners are resolved with one batch call over the distinct ids.
    ///
    /// Count and list are separate statements; on a shared session they may
    /// disagree under concurrent writes.
    pub fn list_car(&self, session: &Session<'_>, query: &CarListQuery) -> RepoResult<CarPage> {
        let started_at = Instant::now();
        let filter = query.filter();
        let offset = page_offset(query.page, query.page_size)?;

        let total = session.with_store(|store| store.count(&filter))?;
        let cars = session.with_store(|store| store.list(&filter, offset, query.page_size))?;

        if cars.is_empty() {
            debug!(
                "event=car_list module=repo status=ok rows=0 owners=0 duration_ms={}",
                started_at.elapsed().as_millis()
            );
            return Ok(CarPage::default());
        }

        let owner_ids = distinct_owner_ids(cars.iter().filter_map(|car| car.user_id));
        let names = if owner_ids.is_empty() {
            Default::default()
        } else {
            session.context().check()?;
            self.resolver.resolve_many(session.context(), &owner_ids)?
        };

        let items = cars
            .into_iter()
            .map(|car| {
                let user_name = car
                    .user_id
                    .and_then(|id| names.get(&id).cloned())
                    .unwrap_or_default();
                CarView::from_car(car, user_name)
            })
            .collect::<Vec<_>>();

        debug!(
            "event=car_list module=repo status=ok rows={} total={} owners={} duration_ms={}",
            items.len(),
            total,
            owner_ids.len(),
            started_at.elapsed().as_millis()
        );
        Ok(CarPage { items, total })
    }

    /// Gets one car with its owner name.
    ///
    /// Fails with `CarNotFound` for a missing row and with the resolver's
    /// error when the owner lookup fails.
    pub fn get_by_id(&self, session: &Session<'_>, id: CarId) -> RepoResult<CarView> {
        let car = session.with_store(|store| store.get(id))?;

        let user_name = match car.user_id {
            Some(user_id) => {
                session.context().check()?;
                self.resolver.resolve_one(session.context(), user_id)?
            }
            None => String::new(),
        };

        debug!(
            "event=car_get module=repo status=ok car_id={id} has_owner={}",
            car.user_id.is_some()
        );
        Ok(CarView::from_car(car, user_name))
    }

    /// Creates a car from the supplied fields and returns its new id.
    pub fn save(&self, session: &Session<'_>, changes: &CarChanges) -> RepoResult<CarId> {
        Ok(session.with_store(|store| store.create(changes))?)
    }

    /// Applies the supplied fields to an existing car.
    pub fn update(&self, session: &Session<'_>, id: CarId, changes: &CarChanges) -> RepoResult<()> {
        Ok(session.with_store(|store| store.update(id, changes))?)
    }

    pub fn delete(&self, session: &Session<'_>, id: CarId) -> RepoResult<()> {
        Ok(session.with_store(|store| store.delete(id))?)
    }
}

fn distinct_owner_ids(ids: impl Iterator<Item = UserId>) -> Vec<UserId> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}
