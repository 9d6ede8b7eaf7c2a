//! Use-case API for transport-facing calls.
//!
//! # Responsibility
//! - Expose ListCar/GetCar/SaveCar/TradeCar/DeleteCar over wire DTOs.
//! - Apply the configured per-call deadline.
//! - Map every core error onto an `RpcStatus`.
//!
//! # Invariants
//! - Calls never panic; failures come back as `RpcStatus`.
//! - Each call emits exactly one `rpc_call` completion event.

use crate::dto::{CarReply, ListCarReply, ListCarRequest, SaveCarRequest, TradeCarRequest};
use crate::status::{RpcCode, RpcResult, RpcStatus};
use car_core::config::RpcConfig;
use car_core::{
    CallContext, CarChanges, CarId, CarRepository, CarService, DbError, IdentityResolver,
    RepoError, ServiceConfig,
};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Transport-agnostic car API.
#[derive(Clone)]
pub struct CarApi {
    service: CarService,
    timeout: Option<Duration>,
}

impl CarApi {
    pub fn new(service: CarService, rpc: RpcConfig) -> Self {
        Self {
            service,
            timeout: rpc.timeout(),
        }
    }

    /// Validates `config`, opens its database and wires the service stack.
    pub fn from_config(
        config: &ServiceConfig,
        resolver: Arc<dyn IdentityResolver>,
    ) -> RpcResult<Self> {
        config
            .validate()
            .map_err(|err| RpcStatus::new(RpcCode::InvalidArgument, err.to_string()))?;
        let db = config.database.open().map_err(open_failed)?;
        let service = CarService::new(db, CarRepository::new(resolver), config.pagination);
        Ok(Self::new(service, config.rpc))
    }

    pub fn list_car(&self, ctx: &CallContext, request: ListCarRequest) -> RpcResult<ListCarReply> {
        self.call("ListCar", ctx, |ctx| {
            self.service
                .list_car(ctx, request.page, request.page_size, request.model)
                .map(ListCarReply::from)
        })
    }

    pub fn get_car(&self, ctx: &CallContext, id: CarId) -> RpcResult<CarReply> {
        self.call("GetCar", ctx, |ctx| {
            self.service.get_car(ctx, id).map(CarReply::from)
        })
    }

    /// Creates a car owned by `user_id`; registration date stays unset.
    pub fn save_car(&self, ctx: &CallContext, request: SaveCarRequest) -> RpcResult<()> {
        let changes = CarChanges::new()
            .user_id(request.user_id)
            .model(request.model);
        self.call("SaveCar", ctx, |ctx| {
            self.service.save_car(ctx, &changes).map(|_| ())
        })
    }

    pub fn trade_car(&self, ctx: &CallContext, request: TradeCarRequest) -> RpcResult<()> {
        self.call("TradeCar", ctx, |ctx| {
            self.service.trade_car(ctx, request.id, request.user_id)
        })
    }

    pub fn delete_car(&self, ctx: &CallContext, id: CarId) -> RpcResult<()> {
        self.call("DeleteCar", ctx, |ctx| self.service.delete_car(ctx, id))
    }

    /// Closes the database once no other API clone holds it.
    pub fn shutdown(self) -> RpcResult<()> {
        self.service
            .into_database()
            .close()
            .map_err(|err| RpcStatus::new(RpcCode::Internal, err.to_string()))
    }

    fn call<T>(
        &self,
        method: &'static str,
        ctx: &CallContext,
        op: impl FnOnce(&CallContext) -> Result<T, RepoError>,
    ) -> RpcResult<T> {
        let started_at = Instant::now();
        let ctx = match self.timeout {
            Some(timeout) => ctx.clone().with_timeout(timeout),
            None => ctx.clone(),
        };

        match op(&ctx) {
            Ok(value) => {
                info!(
                    "event=rpc_call module=rpc status=ok method={method} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(err) => {
                let status = RpcStatus::from(err);
                let duration_ms = started_at.elapsed().as_millis();
                if status.code == RpcCode::Internal {
                    error!(
                        "event=rpc_call module=rpc status=error method={method} code={} duration_ms={duration_ms} error={}",
                        status.code.as_str(),
                        status.message
                    );
                } else {
                    warn!(
                        "event=rpc_call module=rpc status=error method={method} code={} duration_ms={duration_ms}",
                        status.code.as_str()
                    );
                }
                Err(status)
            }
        }
    }
}

fn open_failed(err: DbError) -> RpcStatus {
    RpcStatus::new(RpcCode::Unavailable, format!("failed to open database: {err}"))
}
