use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FailoverError {
    #[error("no healthy alternatives available for provider {0}")]
    NoHealthyAlternatives(String),
}
