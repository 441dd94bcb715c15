use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid trial mode {0}: expected 1, 2 or 3")]
    InvalidMode(u8),

    #[error("unknown run type {0:?}: expected \"check\" or \"main\"")]
    UnknownRunType(String),

    #[error("unknown group {0:?}: expected \"A\" or \"B\"")]
    UnknownGroup(String),
}
