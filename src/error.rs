//! Error types for fleetsim.
//!
//! All errors are strongly typed using thiserror. This enables pattern
//! matching on specific error conditions and provides clear error messages.

use thiserror::Error;

use crate::vehicle::VehicleId;

/// Validation errors that occur when constructing routes, fleets, or
/// loading configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Fleet configuration contains no vehicles")]
    EmptyFleet,

    #[error("Route '{label}' has no stops")]
    EmptyRoute {
        label: String,
    },

    #[error("Vehicle name cannot be empty")]
    EmptyVehicleName,

    #[error("Invalid fleet configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Execution errors that occur during simulation operations.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Bus is already running")]
    AlreadyRunning {
        name: String,
    },

    #[error("Bus is already stopped")]
    AlreadyStopped {
        name: String,
    },

    #[error("Vehicle not found: {id}")]
    VehicleNotFound {
        id: VehicleId,
    },

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Channel disconnected: {path}")]
    Disconnected {
        path: String,
    },
}

/// Transport errors for client-server communication.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {message}")]
    ConnectionFailed {
        message: String,
    },

    #[error("Failed to deserialize response: {message}")]
    DeserializationFailed {
        message: String,
    },

    #[error("Server error (code {code}): {message}")]
    ServerError {
        code: u32,
        message: String,
    },
}

/// Top-level error type for fleetsim.
///
/// This enum encompasses all possible errors that can occur when using
/// the simulation engine or its transport.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

/// gRPC `UNAVAILABLE` code, the one server error worth retrying.
const GRPC_UNAVAILABLE: u32 = 14;

impl FleetError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is a transport error.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if this error is retryable.
    ///
    /// State-machine outcomes (already running, already stopped, unknown
    /// vehicle) won't change on retry; only transient transport conditions
    /// and timeouts will.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::Execution(e) => matches!(e, ExecutionError::Timeout { .. }),
            Self::Transport(e) => match e {
                TransportError::ConnectionFailed { .. } => true,
                TransportError::ServerError { code, .. } => *code == GRPC_UNAVAILABLE,
                TransportError::DeserializationFailed { .. } => false,
            },
            Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for fleetsim operations.
pub type FleetResult<T> = Result<T, FleetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_empty_route() {
        let err = ValidationError::EmptyRoute {
            label: "Howrah → Esplanade".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("Howrah"));
        assert!(msg.contains("no stops"));
    }

    #[test]
    fn execution_error_already_running_uses_contract_message() {
        let err = ExecutionError::AlreadyRunning {
            name: "College Bus 1".to_string(),
        };
        // The display string is the client-visible contract body.
        assert_eq!(format!("{err}"), "Bus is already running");
    }

    #[test]
    fn execution_error_already_stopped_uses_contract_message() {
        let err = ExecutionError::AlreadyStopped {
            name: "College Bus 1".to_string(),
        };
        assert_eq!(format!("{err}"), "Bus is already stopped");
    }

    #[test]
    fn execution_error_vehicle_not_found() {
        let id = VehicleId::new();
        let err = ExecutionError::VehicleNotFound { id };
        let msg = format!("{err}");
        assert!(msg.contains("Vehicle not found"));
        assert!(msg.contains(&id.to_string()));
    }

    #[test]
    fn transport_error() {
        let err = TransportError::ConnectionFailed {
            message: "refused".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("Connection failed"));
        assert!(msg.contains("refused"));
    }

    #[test]
    fn fleet_error_from_validation() {
        let validation_err = ValidationError::EmptyFleet;
        let fleet_err: FleetError = validation_err.into();
        assert!(fleet_err.is_validation());
        assert!(!fleet_err.is_retryable());
    }

    #[test]
    fn fleet_error_from_execution() {
        let exec_err = ExecutionError::Timeout { duration_ms: 1000 };
        let fleet_err: FleetError = exec_err.into();
        assert!(fleet_err.is_execution());
        assert!(fleet_err.is_retryable());
    }

    #[test]
    fn fleet_error_internal() {
        let err = FleetError::internal("unexpected state");
        assert!(err.is_internal());
        assert!(!err.is_retryable());
        let msg = format!("{err}");
        assert!(msg.contains("unexpected state"));
    }

    #[test]
    fn fleet_error_retryable() {
        // State-machine outcomes never retry.
        let err1: FleetError = ExecutionError::AlreadyRunning {
            name: "b".to_string(),
        }
        .into();
        assert!(!err1.is_retryable());

        // Transient transport conditions do.
        let err2: FleetError = TransportError::ConnectionFailed {
            message: "test".to_string(),
        }
        .into();
        assert!(err2.is_retryable());

        let err3: FleetError = TransportError::ServerError {
            code: GRPC_UNAVAILABLE,
            message: "unavailable".to_string(),
        }
        .into();
        assert!(err3.is_retryable());

        let err4: FleetError = TransportError::ServerError {
            code: 3,
            message: "invalid argument".to_string(),
        }
        .into();
        assert!(!err4.is_retryable());
    }
}
