use thiserror::Error;

use crate::eval::Diagnostic;
use crate::value::ValueError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Evaluation error: {0}")]
    Diagnostic(#[from] Diagnostic),
    #[error("Value error: {0}")]
    Value(#[from] ValueError),
    // config
    #[error("Config error: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type RiverResult<T> = Result<T, Error>;

// エラー作成用のヘルパー関数
impl Error {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config(message.into())
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }
}
