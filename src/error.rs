/// Errors surfaced by the flight and camera stacks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("frame length {0}, expected 8")]
    BadLength(usize),

    #[error("bad frame magic")]
    BadMagic,

    #[error("bad frame crc")]
    BadCrc,

    #[error("response header is not a lewei_cmd frame")]
    BadHeaderTag,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unexpected response command: expected {expected:#06x}, got {got:#06x}")]
    UnexpectedCommand { expected: u32, got: u32 },

    #[error("response is for file {got:?}, requested {requested:?}")]
    FilenameMismatch { requested: String, got: String },

    #[error("short response payload: {0} bytes")]
    ShortPayload(usize),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
