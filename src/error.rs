use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemuxError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parser error: {0}")]
    Parser(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl DemuxError {
    /// True for errors the user can correct by changing options, as opposed
    /// to malformed input or a failing source.
    pub fn is_configuration(&self) -> bool {
        matches!(self, DemuxError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, DemuxError>;
