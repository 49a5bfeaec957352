use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RouterError {
    #[error("no available providers")]
    NoAvailableProviders,
    #[error("provider already registered: {0}")]
    AlreadyRegistered(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}
