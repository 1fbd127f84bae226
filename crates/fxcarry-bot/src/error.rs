//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] fxcarry_core::CoreError),

    #[error("Audit error: {0}")]
    Audit(#[from] fxcarry_audit::AuditError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] fxcarry_gateway::GatewayError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] fxcarry_oracle::OracleError),

    #[error("Executor error: {0}")]
    Executor(#[from] fxcarry_executor::ExecutorError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] fxcarry_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
