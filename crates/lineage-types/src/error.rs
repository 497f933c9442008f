use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid uuid string: {0}")]
    InvalidUuid(String),

    #[error("unknown link type: {0}")]
    UnknownLinkType(String),
}
