//! Core use-case services.
//!
//! # Responsibility
//! - Validate and clamp caller input before it reaches the repository.
//! - Decide which operations run inside a transaction.

pub mod car_service;
