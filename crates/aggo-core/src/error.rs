use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};

#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum CoreReason {
    #[error("invalid rule")]
    InvalidRule,
    #[error("matcher error")]
    Matcher,
    #[error("snapshot format error")]
    Snapshot,
    #[error("async runtime unavailable")]
    Runtime,
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for CoreReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::InvalidRule => 1001,
            Self::Matcher => 1002,
            Self::Snapshot => 1003,
            Self::Runtime => 1004,
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type CoreError = StructError<CoreReason>;
pub type CoreResult<T> = Result<T, CoreError>;
