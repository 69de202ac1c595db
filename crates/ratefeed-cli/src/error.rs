use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ratefeed_core::ValidationError),

    #[error(transparent)]
    Core(#[from] ratefeed_core::CoreError),

    #[error(transparent)]
    Warehouse(#[from] ratefeed_core::WarehouseError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Command(_) => 2,
            Self::Core(_) => 3,
            Self::Serialization(_) => 4,
            Self::Warehouse(_) => 6,
            Self::Io(_) => 10,
        }
    }
}
