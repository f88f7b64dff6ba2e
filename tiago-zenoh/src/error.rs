use thiserror::Error;

#[derive(Error, Debug)]
pub enum WrapperError {
    #[error("Zenoh error {0:?}")]
    ZenohError(#[from] zenoh::Error),
    #[error("invalid zenoh endpoint {0}")]
    InvalidEndpoint(String),
    #[error("error while encoding message")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WrapperError>;
