use compoundor_domain::DomainError;
use compoundor_engine::EngineError;
use compoundor_execution::error::KeeperError;
use compoundor_protocols::ProtocolError;
use thiserror::Error;

pub type SimulationResult<T> = Result<T, SimulationError>;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Invalid simulation setup: {0}")]
    InvalidSetup(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Keeper(#[from] KeeperError),
}
