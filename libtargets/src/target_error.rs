use thiserror::Error;

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("failed to read targets: {0}")]
    Io(#[from] std::io::Error),

    #[error("no targets defined")]
    EmptyCorpus,

    #[error("targets line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("bad template `{url}`: {message}")]
    Template { url: String, message: String },

    #[error("header `{0}` is not in `Key: value` form")]
    Header(String),
}
