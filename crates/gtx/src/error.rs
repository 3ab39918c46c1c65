use thiserror::Error;

use crate::services::ServiceError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid configuration")]
    Config(#[from] gtx_core::ConfigError),

    #[error("booking was rolled back")]
    Transaction(#[from] gtx_core::TransactionError<ServiceError>),

    #[error("failed to start async runtime")]
    Runtime(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
