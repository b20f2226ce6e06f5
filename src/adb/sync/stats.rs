use crate::adb::protocol::{S_IFDIR, S_IFLNK, S_IFMT, S_IFREG};
use crate::error::{AdbError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// File metadata as reported by the sync `STAT`/`STA2` replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub mode: u32,
    pub size: u64,
    pub mtime: DateTime<Utc>,
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn le_u64(bytes: &[u8], at: usize) -> u64 {
    u64::from(le_u32(bytes, at)) | (u64::from(le_u32(bytes, at + 4)) << 32)
}

fn check_length(bytes: &[u8], needed: usize) -> Result<()> {
    if bytes.len() < needed {
        return Err(AdbError::PrematureEof {
            missing_bytes: needed - bytes.len(),
        });
    }
    Ok(())
}

impl Stats {
    pub const V1_LENGTH: usize = 12;
    pub const V2_LENGTH: usize = 68;

    pub fn new(mode: u32, size: u64, mtime_seconds: i64) -> Self {
        Self {
            mode,
            size,
            mtime: DateTime::from_timestamp(mtime_seconds, 0).unwrap_or_default(),
        }
    }

    /// Parse the 12 byte `mode size mtime` record. Sizes are limited to 32 bits here.
    pub fn from_v1(bytes: &[u8]) -> Result<Self> {
        check_length(bytes, Self::V1_LENGTH)?;
        Ok(Self::new(
            le_u32(bytes, 0),
            le_u32(bytes, 4).into(),
            le_u32(bytes, 8).into(),
        ))
    }

    /// Parse the 68 byte `STA2` record following the reply id.
    pub fn from_v2(bytes: &[u8]) -> Result<Self> {
        check_length(bytes, Self::V2_LENGTH)?;
        let mtime = le_u64(bytes, 52) as i64;
        Ok(Self::new(le_u32(bytes, 20), le_u64(bytes, 36), mtime))
    }

    /// A zero mode means the path does not exist.
    pub fn exists(&self) -> bool {
        self.mode != 0
    }

    pub fn is_file(&self) -> bool {
        (self.mode & S_IFMT) == S_IFREG
    }

    pub fn is_directory(&self) -> bool {
        (self.mode & S_IFMT) == S_IFDIR
    }

    pub fn is_symlink(&self) -> bool {
        (self.mode & S_IFMT) == S_IFLNK
    }

    /// Permission bits only.
    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }
}

/// Running byte count of a push or pull.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    pub bytes_transferred: u64,
}
