//! Car domain model.
//!
//! # Responsibility
//! - Define the persisted `Car` record and its enriched read model.
//! - Describe partial writes without relying on nullable-field tricks.
//!
//! # Invariants
//! - `id` is assigned by the store and never changes.
//! - Every other field is independently nullable.
//! - A write touches only the fields explicitly supplied in `CarChanges`.

use serde::{Deserialize, Serialize};

/// Surrogate primary key assigned by the store.
pub type CarId = i64;

/// Identifier of an owner in the identity service.
pub type UserId = i64;

/// Persisted vehicle record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Car {
    pub id: CarId,
    /// `None` for an unassigned/unsold vehicle.
    pub user_id: Option<UserId>,
    pub model: Option<String>,
    /// Unix epoch milliseconds.
    pub registered_at: Option<i64>,
}

/// One field of a partial write.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Change<T> {
    /// Field not supplied; the stored value is left untouched.
    #[default]
    Keep,
    /// Field supplied with a value.
    Set(T),
    /// Field supplied as explicit null.
    Clear,
}

impl<T> Change<T> {
    pub fn is_supplied(&self) -> bool {
        !matches!(self, Self::Keep)
    }

    /// Returns the value to persist for supplied fields.
    ///
    /// `None` means "not supplied"; `Some(None)` means "write NULL".
    pub fn as_write(&self) -> Option<Option<&T>> {
        match self {
            Self::Keep => None,
            Self::Set(value) => Some(Some(value)),
            Self::Clear => Some(None),
        }
    }
}

/// Tagged partial write for create/update paths.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CarChanges {
    pub user_id: Change<UserId>,
    pub model: Change<String>,
    pub registered_at: Change<i64>,
}

impl CarChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Change::Set(user_id);
        self
    }

    pub fn clear_user_id(mut self) -> Self {
        self.user_id = Change::Clear;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Change::Set(model.into());
        self
    }

    pub fn clear_model(mut self) -> Self {
        self.model = Change::Clear;
        self
    }

    pub fn registered_at(mut self, epoch_ms: i64) -> Self {
        self.registered_at = Change::Set(epoch_ms);
        self
    }

    pub fn clear_registered_at(mut self) -> Self {
        self.registered_at = Change::Clear;
        self
    }

    /// Returns whether no field is supplied.
    pub fn is_empty(&self) -> bool {
        !self.user_id.is_supplied()
            && !self.model.is_supplied()
            && !self.registered_at.is_supplied()
    }
}

/// Car joined with its owner's display name.
///
/// Built on every read and discarded after the response; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarView {
    pub id: CarId,
    pub user_id: Option<UserId>,
    pub model: Option<String>,
    pub registered_at: Option<i64>,
    /// Empty when the car has no owner or the batch lookup had no entry.
    pub user_name: String,
}

impl CarView {
    pub fn from_car(car: Car, user_name: impl Into<String>) -> Self {
        Self {
            id: car.id,
            user_id: car.user_id,
            model: car.model,
            registered_at: car.registered_at,
            user_name: user_name.into(),
        }
    }
}

/// Filter shared by list and count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarFilter {
    /// Case-sensitive substring match on `model`.
    pub model_contains: Option<String>,
}

/// Paged list request as seen by the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarListQuery {
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
    pub model: Option<String>,
}

impl CarListQuery {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn filter(&self) -> CarFilter {
        CarFilter {
            model_contains: self.model.clone(),
        }
    }
}

/// One page of enriched cars.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CarPage {
    /// Ordered by `registered_at` descending, nulls last, then by id.
    pub items: Vec<CarView>,
    /// Rows matching the filter, ignoring pagination.
    pub total: u64,
}
