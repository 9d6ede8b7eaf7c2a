//! Car use-case service.
//!
//! # Responsibility
//! - Clamp pagination input before it reaches the repository.
//! - Run every write inside the transaction coordinator.
//!
//! # Invariants
//! - Service APIs never bypass repository contracts.
//! - Reads run on the shared connection; writes run in a transaction even
//!   when they are a single statement, so multi-step rules can be added
//!   without changing callers.

use crate::config::PaginationConfig;
use crate::context::CallContext;
use crate::db::Database;
use crate::model::car::{CarChanges, CarId, CarPage, CarView, UserId};
use crate::repo::car_repo::{CarRepository, RepoResult};

/// Use-case facade over the car repository.
#[derive(Clone)]
pub struct CarService {
    db: Database,
    repo: CarRepository,
    pagination: PaginationConfig,
}

impl CarService {
    pub fn new(db: Database, repo: CarRepository, pagination: PaginationConfig) -> Self {
        Self {
            db,
            repo,
            pagination,
        }
    }

    /// Gives the database handle back for shutdown.
    pub fn into_database(self) -> Database {
        self.db
    }

    /// Lists cars after clamping `page`/`page_size` to valid values.
    pub fn list_car(
        &self,
        ctx: &CallContext,
        page: i64,
        page_size: i64,
        model: Option<String>,
    ) -> RepoResult<CarPage> {
        let query = self.pagination.clamp(page, page_size, model);
        self.repo.list_car(&self.db.session(ctx), &query)
    }

    pub fn get_car(&self, ctx: &CallContext, id: CarId) -> RepoResult<CarView> {
        self.repo.get_by_id(&self.db.session(ctx), id)
    }

    pub fn save_car(&self, ctx: &CallContext, changes: &CarChanges) -> RepoResult<CarId> {
        self.db
            .run_in_transaction(ctx, |session| self.repo.save(session, changes))
    }

    pub fn update_car(&self, ctx: &CallContext, id: CarId, changes: &CarChanges) -> RepoResult<()> {
        self.db
            .run_in_transaction(ctx, |session| self.repo.update(session, id, changes))
    }

    /// Reassigns ownership; only `user_id` is written.
    pub fn trade_car(&self, ctx: &CallContext, id: CarId, user_id: UserId) -> RepoResult<()> {
        self.update_car(ctx, id, &CarChanges::new().user_id(user_id))
    }

    pub fn delete_car(&self, ctx: &CallContext, id: CarId) -> RepoResult<()> {
        self.db
            .run_in_transaction(ctx, |session| self.repo.delete(session, id))
    }
}
