//! gRPC transport layer for the served deployment shape.
//!
//! The canonical contract surface is the JSON bodies; this transport
//! carries them as bytes inside proto messages and returns JSON-serialized
//! response objects. One server instance serves exactly one vehicle, so no
//! vehicle id is threaded through any RPC.

pub mod poller;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

use crate::engine::FleetEngine;
use crate::error::{ExecutionError, FleetError, FleetResult};
use crate::snapshot::BusStatus;
use crate::stop::Position;
use crate::vehicle::VehicleId;

#[allow(missing_docs)]
pub mod proto {
    tonic::include_proto!("fleetsim");
}

use proto::bus_service_server::{BusService, BusServiceServer};

/// Maximum size of a response JSON payload.
const MAX_RESPONSE_JSON_BYTES: usize = 1024 * 1024; // 1 MiB

/// One wait on the tick stream inside `WatchStatus` before checking for a
/// departed client.
const WATCH_POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// gRPC service implementation for the single-vehicle bus contract.
pub struct BusServiceImpl {
    engine: Arc<FleetEngine>,
    vehicle_id: VehicleId,
}

impl BusServiceImpl {
    /// Wraps an engine, serving its first configured vehicle.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the engine has no vehicles (engine
    /// construction validates against this, so it only trips on misuse).
    pub fn new(engine: Arc<FleetEngine>) -> FleetResult<Self> {
        let vehicle_id = engine
            .snapshots()
            .first()
            .map(|s| s.id)
            .ok_or_else(|| FleetError::internal("engine has no vehicles to serve"))?;
        Ok(Self { engine, vehicle_id })
    }

    #[must_use]
    #[allow(missing_docs)]
    pub fn into_server(self) -> BusServiceServer<Self> {
        BusServiceServer::new(self)
    }

    fn status_body(&self) -> Result<BusStatus, Status> {
        self.engine
            .bus_status(self.vehicle_id)
            .ok_or_else(|| Status::internal("served vehicle disappeared"))
    }
}

#[derive(Debug, Serialize)]
struct CommandBody {
    success: bool,
    message: &'static str,
    status: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetBody {
    success: bool,
    message: &'static str,
    current_location: Position,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RouteBody {
    route: Vec<Position>,
    total_waypoints: usize,
}

fn encode_json<T: Serialize>(value: &T, max: usize) -> Result<Vec<u8>, Status> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| Status::internal(format!("failed to serialize response JSON: {e}")))?;
    if bytes.len() > max {
        return Err(Status::resource_exhausted("serialized JSON exceeds size limit"));
    }
    Ok(bytes)
}

fn status_from_fleet_error(err: FleetError) -> Status {
    match err {
        FleetError::Validation(v) => Status::invalid_argument(v.to_string()),
        FleetError::Transport(t) => Status::unavailable(t.to_string()),
        FleetError::Internal { message } => Status::internal(message),
        FleetError::Execution(e) => match e {
            ExecutionError::AlreadyRunning { .. } | ExecutionError::AlreadyStopped { .. } => {
                Status::failed_precondition(e.to_string())
            }
            ExecutionError::VehicleNotFound { .. } => Status::not_found(e.to_string()),
            ExecutionError::Timeout { .. } => Status::deadline_exceeded(e.to_string()),
            ExecutionError::Disconnected { .. } => Status::internal(e.to_string()),
        },
    }
}

#[tonic::async_trait]
impl BusService for BusServiceImpl {
    async fn get_status(
        &self,
        _request: Request<proto::StatusRequest>,
    ) -> Result<Response<proto::StatusReply>, Status> {
        let body = self.status_body()?;
        let status_json = encode_json(&body, MAX_RESPONSE_JSON_BYTES)?;
        Ok(Response::new(proto::StatusReply { status_json }))
    }

    async fn start(
        &self,
        _request: Request<proto::StartRequest>,
    ) -> Result<Response<proto::CommandReply>, Status> {
        self.engine
            .start(self.vehicle_id)
            .map_err(status_from_fleet_error)?;

        let body = CommandBody {
            success: true,
            message: "Bus started",
            status: true,
        };
        let response_json = encode_json(&body, MAX_RESPONSE_JSON_BYTES)?;
        Ok(Response::new(proto::CommandReply { response_json }))
    }

    async fn stop(
        &self,
        _request: Request<proto::StopRequest>,
    ) -> Result<Response<proto::CommandReply>, Status> {
        self.engine
            .stop(self.vehicle_id)
            .map_err(status_from_fleet_error)?;

        let body = CommandBody {
            success: true,
            message: "Bus stopped",
            status: false,
        };
        let response_json = encode_json(&body, MAX_RESPONSE_JSON_BYTES)?;
        Ok(Response::new(proto::CommandReply { response_json }))
    }

    async fn get_route(
        &self,
        _request: Request<proto::RouteRequest>,
    ) -> Result<Response<proto::RouteReply>, Status> {
        let status = self.status_body()?;
        let body = RouteBody {
            total_waypoints: status.route.len(),
            route: status.route,
        };
        let route_json = encode_json(&body, MAX_RESPONSE_JSON_BYTES)?;
        Ok(Response::new(proto::RouteReply { route_json }))
    }

    async fn reset(
        &self,
        _request: Request<proto::ResetRequest>,
    ) -> Result<Response<proto::CommandReply>, Status> {
        self.engine
            .reset(self.vehicle_id)
            .map_err(status_from_fleet_error)?;

        let status = self.status_body()?;
        let body = ResetBody {
            success: true,
            message: "Bus reset to starting position",
            current_location: status.current_location,
        };
        let response_json = encode_json(&body, MAX_RESPONSE_JSON_BYTES)?;
        Ok(Response::new(proto::CommandReply { response_json }))
    }

    type WatchStatusStream = ReceiverStream<Result<proto::StatusReply, Status>>;

    async fn watch_status(
        &self,
        _request: Request<proto::StatusRequest>,
    ) -> Result<Response<Self::WatchStatusStream>, Status> {
        let ticks = self.engine.subscribe().map_err(status_from_fleet_error)?;
        let engine = Arc::clone(&self.engine);
        let vehicle_id = self.vehicle_id;

        let (tx, rx) = tokio::sync::mpsc::channel::<Result<proto::StatusReply, Status>>(16);
        tokio::task::spawn_blocking(move || loop {
            match ticks.recv_timeout(WATCH_POLL_TIMEOUT) {
                Ok(_tick) => {
                    let Some(status) = engine.bus_status(vehicle_id) else {
                        let _ = tx.blocking_send(Err(Status::internal("served vehicle disappeared")));
                        break;
                    };

                    let encoded = match encode_json(&status, MAX_RESPONSE_JSON_BYTES) {
                        Ok(v) => v,
                        Err(status) => {
                            let _ = tx.blocking_send(Err(status));
                            break;
                        }
                    };

                    if tx
                        .blocking_send(Ok(proto::StatusReply { status_json: encoded }))
                        .is_err()
                    {
                        break;
                    }
                }
                Err(err) => {
                    // Timeout: check for client disconnect, otherwise keep waiting.
                    if matches!(err, FleetError::Execution(ExecutionError::Timeout { .. })) {
                        if tx.is_closed() {
                            break;
                        }
                        continue;
                    }

                    let _ = tx.blocking_send(Err(status_from_fleet_error(err)));
                    break;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}


pub use proto::bus_service_client::BusServiceClient;
