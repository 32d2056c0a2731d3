use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("need at least 3 latency buckets, got {0}")]
    TooFewBuckets(usize),

    #[error("latency axis is empty: max {max_y}ms must be above min {min_y}ms")]
    InvalidAxis { min_y: f64, max_y: f64 },

    #[error("invalid fixed header `{0}`")]
    Header(String),

    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}
