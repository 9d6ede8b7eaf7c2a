//! Core domain logic for the car record service.
//! This crate is the single source of truth for persistence and enrichment
//! invariants.

pub mod config;
pub mod context;
pub mod db;
pub mod identity;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, PaginationConfig, ServiceConfig};
pub use context::{CallContext, ContextError};
pub use db::{Database, DbError, Session, TxError};
pub use identity::{IdentityResolver, ResolveError, ResolveResult, StaticIdentityResolver};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LogSettings,
    LoggingError,
};
pub use model::car::{
    Car, CarChanges, CarFilter, CarId, CarListQuery, CarPage, CarView, Change, UserId,
};
pub use repo::car_repo::{CarRepository, RepoError, RepoResult};
pub use repo::car_store::{CarStore, SqliteCarStore, StoreError, StoreResult};
pub use service::car_service::CarService;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
