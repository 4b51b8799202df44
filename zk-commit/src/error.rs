use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZkError {
    /// A secret value, public signal or field encoding did not parse.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("arkworks error: {0}")]
    Ark(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ZkError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        ZkError::MalformedInput(msg.into())
    }
}
