use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::intake::{
    ContractViolation, DriveOperationError, IntakeServiceError, PersistenceError,
};
use std::fmt;

/// Error surfaced at the binary edge.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Persistence(PersistenceError),
    Intake(ContractViolation),
    Drive(DriveOperationError),
    Input(String),
}

impl AppError {
    /// Whether the caller, not the environment, caused the failure.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::Intake(_) | AppError::Input(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Persistence(err) => write!(f, "persistence error: {}", err),
            AppError::Intake(err) => write!(f, "intake error: {}", err),
            AppError::Drive(err) => write!(f, "drive error: {}", err),
            AppError::Input(message) => write!(f, "invalid input: {}", message),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Persistence(err) => Some(err),
            AppError::Intake(err) => Some(err),
            AppError::Drive(err) => Some(err),
            AppError::Input(_) => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<PersistenceError> for AppError {
    fn from(value: PersistenceError) -> Self {
        Self::Persistence(value)
    }
}

impl From<ContractViolation> for AppError {
    fn from(value: ContractViolation) -> Self {
        Self::Intake(value)
    }
}

impl From<DriveOperationError> for AppError {
    fn from(value: DriveOperationError) -> Self {
        Self::Drive(value)
    }
}

impl From<IntakeServiceError> for AppError {
    fn from(value: IntakeServiceError) -> Self {
        match value {
            IntakeServiceError::Contract(err) => Self::Intake(err),
            IntakeServiceError::Persistence(err) => Self::Persistence(err),
        }
    }
}
