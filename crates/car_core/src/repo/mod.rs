//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the car store contract and its SQLite implementation.
//! - Compose store rows with identity lookups in the car repository.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`CarNotFound`) instead of raw
//!   store not-found signals.
//! - Store calls always go through a `Session`.

pub mod car_repo;
pub mod car_store;
