use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised by the frame processing core.
///
/// Frame and joint errors are local to one frame or one joint: callers drop
/// the offending input and keep going. Range and config errors come from
/// caller configuration and should be surfaced immediately.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("out of range: {0}")]
    OutOfRange(String),
    #[error("unknown joint index {0}")]
    UnknownJoint(u8),
    #[error("config error: {0}")]
    Config(String),
}
