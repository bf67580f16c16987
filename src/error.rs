use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("artifact `{0}` not found; run the `train` binary first to produce it")]
    ArtifactNotFound(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("input format error at row {row}, column `{column}`: {message}")]
    InputFormat {
        row: usize,
        column: String,
        message: String,
    },

    #[error("estimator failed: {0}")]
    Estimator(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("download failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }
}
