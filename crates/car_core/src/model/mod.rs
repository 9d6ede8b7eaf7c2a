//! Domain model for the car service.
//!
//! # Responsibility
//! - Define the persisted car record, partial writes and read projections.
//!
//! # Invariants
//! - Every car is identified by a store-assigned `CarId`.
//! - Read projections are rebuilt per call and never stored.

pub mod car;
