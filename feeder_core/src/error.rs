use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum FeederError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing left servo")]
    MissingLeftServo,
    #[error("missing right servo")]
    MissingRightServo,
    #[error("missing servo enable line")]
    MissingServoEnable,
    #[error("missing load cell")]
    MissingLoadCell,
    #[error("missing weight enable line")]
    MissingWeightEnable,
    #[error("missing motion sensor")]
    MissingMotion,
    #[error("missing network link")]
    MissingLink,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
