use crate::tcpusb::packet::Packet;
use thiserror::Error;

/// Errno reported for a sync `stat` on a missing path.
pub const ENOENT_ERRNO: i32 = 34;

#[derive(Error, Debug)]
pub enum AdbError {
    #[error("Premature end of stream, needed {missing_bytes} more bytes")]
    PrematureEof { missing_bytes: usize },

    #[error("Unexpected '{unexpected}', was expecting {expected}")]
    UnexpectedData { unexpected: String, expected: String },

    #[error("Failure: '{0}'")]
    Fail(String),

    #[error("Socket timeout reached")]
    Timeout,

    #[error("ENOENT, no such file or directory '{path}'")]
    Enoent { path: String },

    #[error("Checksum mismatch")]
    Checksum(Packet),

    #[error("Magic value mismatch")]
    Magic(Packet),

    #[error("{0}")]
    Auth(String),

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Premature packet")]
    PrematurePacket(Packet),

    #[error("Late transport")]
    LateTransport,

    #[error("Remote ID {0} is already being used")]
    DuplicateService(u32),

    #[error("{message}")]
    Install { message: String, code: String },

    #[error("{0}")]
    Command(String),

    #[error("{0}")]
    InvalidPublicKey(String),

    #[error("{0}")]
    Protocol(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ADB connection error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdbError {
    pub fn unexpected(unexpected: impl Into<String>, expected: impl Into<String>) -> Self {
        AdbError::UnexpectedData {
            unexpected: unexpected.into(),
            expected: expected.into(),
        }
    }

    /// Numeric errno for filesystem-flavoured errors.
    pub fn errno(&self) -> Option<i32> {
        match self {
            AdbError::Enoent { .. } => Some(ENOENT_ERRNO),
            _ => None,
        }
    }

    /// Symbolic code, mirroring what the device reported where there is one.
    pub fn code(&self) -> Option<&str> {
        match self {
            AdbError::Enoent { .. } => Some("ENOENT"),
            AdbError::Install { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_premature_eof(&self) -> bool {
        matches!(self, AdbError::PrematureEof { .. })
    }

    /// Errors that tear down a whole bridged connection instead of one stream.
    pub fn is_fatal_to_socket(&self) -> bool {
        matches!(
            self,
            AdbError::Auth(_) | AdbError::Unauthorized | AdbError::Checksum(_) | AdbError::Magic(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AdbError>;
