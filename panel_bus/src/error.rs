use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("bus client disconnected")]
    Disconnected,
    #[error("publish rejected: {0}")]
    Rejected(String),
    #[error("invalid topic: {0:?}")]
    InvalidTopic(String),
}

pub type Result<T> = std::result::Result<T, BusError>;
