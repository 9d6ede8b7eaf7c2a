//! Transport-agnostic RPC surface for the car record service.
//!
//! A network server adapts these calls one-to-one; nothing here depends on
//! a concrete transport.

pub mod api;
pub mod dto;
pub mod status;

pub use api::CarApi;
pub use dto::{CarReply, ListCarReply, ListCarRequest, SaveCarRequest, TradeCarRequest};
pub use status::{RpcCode, RpcResult, RpcStatus};
