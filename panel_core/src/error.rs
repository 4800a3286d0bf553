use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PanelError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("transport disconnected: {0}")]
    Disconnected(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("unknown injector: {0}")]
    UnknownInjector(String),
    #[error("unknown switch: {0}")]
    UnknownSwitch(String),
    #[error("confirmation timed out on {state_topic}")]
    ConfirmTimeout { state_topic: String },
    #[error("panel runtime stopped")]
    Stopped,
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing inbound channel")]
    MissingInbound,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
