//! Wire-shaped request and reply messages.
//!
//! Field names follow the car service protocol; conversions to and from core
//! types live here so `api` stays free of formatting details.

use car_core::{CarId, CarPage, CarView, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const REGISTERED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListCarRequest {
    pub page: i64,
    pub page_size: i64,
    /// Case-sensitive substring filter on the model name.
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarReply {
    pub id: CarId,
    pub username: String,
    pub model: String,
    /// `YYYY-MM-DD HH:MM:SS` in UTC; empty when the car is unregistered.
    pub registered_at: String,
}

impl From<CarView> for CarReply {
    fn from(view: CarView) -> Self {
        Self {
            id: view.id,
            username: view.user_name,
            model: view.model.unwrap_or_default(),
            registered_at: format_registered_at(view.registered_at),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListCarReply {
    pub list: Vec<CarReply>,
    pub total: u64,
}

impl From<CarPage> for ListCarReply {
    fn from(page: CarPage) -> Self {
        Self {
            list: page.items.into_iter().map(CarReply::from).collect(),
            total: page.total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveCarRequest {
    pub user_id: UserId,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeCarRequest {
    pub id: CarId,
    pub user_id: UserId,
}

/// Formats epoch milliseconds for replies; out-of-range values render empty.
pub fn format_registered_at(epoch_ms: Option<i64>) -> String {
    epoch_ms
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|moment| moment.format(REGISTERED_AT_FORMAT).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{format_registered_at, CarReply, ListCarRequest};
    use car_core::CarView;

    #[test]
    fn registered_at_is_rendered_in_utc() {
        assert_eq!(
            format_registered_at(Some(1_700_000_000_000)),
            "2023-11-14 22:13:20"
        );
        assert_eq!(format_registered_at(None), "");
    }

    #[test]
    fn reply_flattens_optional_fields() {
        let reply = CarReply::from(CarView {
            id: 3,
            user_id: None,
            model: None,
            registered_at: None,
            user_name: String::new(),
        });
        assert_eq!(reply.model, "");
        assert_eq!(reply.registered_at, "");
        assert_eq!(reply.username, "");
    }

    #[test]
    fn list_request_defaults_missing_fields() {
        let request: ListCarRequest = serde_json::from_str(r#"{"model": "Golf"}"#).unwrap();
        assert_eq!(request.page, 0);
        assert_eq!(request.page_size, 0);
        assert_eq!(request.model.as_deref(), Some("Golf"));
    }
}
