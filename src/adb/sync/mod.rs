//! Binary file transfer sub-protocol spoken after `sync:`.
//!
//! Requests are a 4 byte token followed by a little-endian `u32` and an
//! optional argument. Replies use the same framing. A `FAIL` invalidates
//! the session, so reading one also ends the stream.

pub mod entry;
pub mod stats;
pub mod transfer;


pub use entry::Entry;
pub use stats::{Stats, TransferStats};
pub use transfer::{PullTransfer, PushTransfer, TransferEvent};

use crate::adb::connection::{Connection, ConnectionReader};
use crate::adb::events::EventStream;
use crate::adb::parser::Parser;
use crate::adb::protocol::{
    DATA, DENT, DONE, FAIL, LIST, OKAY, RECV, S_IFREG, SEND, STA2, STAT,
};
use crate::error::{AdbError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use log::*;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Where pushed files are staged before installing.
pub const TEMP_PATH: &str = "/data/local/tmp";

/// Largest `DATA` chunk accepted by the device.
pub const DATA_MAX_LENGTH: usize = 64 * 1024;

/// Permissions used when a push doesn't name any.
pub const DEFAULT_MODE: u32 = 0o644;

const PULL_PIPE_SIZE: usize = 64 * 1024;

/// Staging path for `path` under [`TEMP_PATH`].
pub fn temp_path(path: &str) -> String {
    let name = Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}/{}", TEMP_PATH, name)
}

fn encode_command(command: &str, value: u32, arg: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(8 + arg.len());
    buf.put_slice(command.as_bytes());
    buf.put_u32_le(value);
    buf.put_slice(arg);
    buf.freeze()
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Read a sync failure message and end the stream.
async fn read_sync_error<T>(parser: &mut Parser<ConnectionReader>) -> Result<T> {
    let message = read_sync_message(parser).await;
    parser.end().await;
    Err(AdbError::Fail(String::from_utf8_lossy(&message?).into_owned()))
}

async fn read_sync_message(parser: &mut Parser<ConnectionReader>) -> Result<Bytes> {
    let length = le_u32(&parser.read_bytes(4).await?);
    parser.read_bytes(length as usize).await
}

/// Wait for the single reply that closes a push.
async fn read_push_reply(parser: &mut Parser<ConnectionReader>) -> Result<()> {
    let reply = parser.read_ascii(4).await?;
    match reply.as_str() {
        OKAY => {
            parser.read_bytes(4).await?;
            Ok(())
        }
        FAIL => read_sync_error(parser).await,
        _ => parser.unexpected(&reply, "OKAY or FAIL"),
    }
}

/// Fill `buf` from `source`, stopping short only at the end of the source.
async fn read_up_to<R: AsyncRead + Unpin>(source: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let count = source.read(&mut buf[filled..]).await?;
        if count == 0 {
            break;
        }
        filled += count;
    }
    Ok(filled)
}

/// A sync session. Owns its connection.
pub struct SyncSession {
    connection: Connection,
}

impl SyncSession {
    /// Wrap a connection that has already accepted `sync:`.
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    pub fn temp(path: &str) -> String {
        temp_path(path)
    }

    async fn send_with_arg(&mut self, command: &str, arg: &str) -> Result<()> {
        debug!("{} {}", command, arg);
        self.connection
            .write(&encode_command(command, arg.len() as u32, arg.as_bytes()))
            .await
    }

    /// `STAT` a path. Missing paths fail with ENOENT.
    pub async fn stat(&mut self, path: &str) -> Result<Stats> {
        self.send_with_arg(STAT, path).await?;
        let parser = self.connection.parser();
        let reply = parser.read_ascii(4).await?;
        match reply.as_str() {
            STAT => {
                let stats = Stats::from_v1(&parser.read_bytes(Stats::V1_LENGTH).await?)?;
                if !stats.exists() {
                    return Err(AdbError::Enoent {
                        path: path.to_string(),
                    });
                }
                Ok(stats)
            }
            FAIL => read_sync_error(parser).await,
            _ => parser.unexpected(&reply, "STAT or FAIL"),
        }
    }

    /// `STA2` a path, giving 64 bit sizes and times.
    pub async fn stat2(&mut self, path: &str) -> Result<Stats> {
        self.send_with_arg(STA2, path).await?;
        let parser = self.connection.parser();
        let reply = parser.read_ascii(4).await?;
        match reply.as_str() {
            STA2 => {
                let stats = Stats::from_v2(&parser.read_bytes(Stats::V2_LENGTH).await?)?;
                if !stats.exists() {
                    return Err(AdbError::Enoent {
                        path: path.to_string(),
                    });
                }
                Ok(stats)
            }
            FAIL => read_sync_error(parser).await,
            _ => parser.unexpected(&reply, "STA2 or FAIL"),
        }
    }

    /// List a directory, leaving out `.` and `..`.
    pub async fn readdir(&mut self, path: &str) -> Result<Vec<Entry>> {
        self.send_with_arg(LIST, path).await?;
        let parser = self.connection.parser();
        let mut entries = Vec::new();
        loop {
            let reply = parser.read_ascii(4).await?;
            match reply.as_str() {
                DENT => {
                    let header = parser.read_bytes(16).await?;
                    let stats = Stats::from_v1(&header[..12])?;
                    let name_length = le_u32(&header[12..16]);
                    let name = parser.read_bytes(name_length as usize).await?;
                    let name = String::from_utf8_lossy(&name).into_owned();
                    if name != "." && name != ".." {
                        entries.push(Entry::new(name, stats));
                    }
                }
                DONE => {
                    parser.read_bytes(16).await?;
                    return Ok(entries);
                }
                FAIL => return read_sync_error(parser).await,
                _ => return parser.unexpected(&reply, "DENT, DONE or FAIL"),
            }
        }
    }

    /// Push everything `source` yields to `path`.
    pub async fn push_stream<R>(&mut self, source: R, path: &str, mode: u32) -> Result<TransferStats>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.push_with_progress(source, path, mode, |_| {}).await
    }

    /// Push `source` to `path`, calling `on_progress` after each chunk is written.
    ///
    /// Chunks are written while the reply is awaited, so an early `FAIL`
    /// from the device stops the upload.
    pub async fn push_with_progress<R, F>(
        &mut self,
        mut source: R,
        path: &str,
        mode: u32,
        mut on_progress: F,
    ) -> Result<TransferStats>
    where
        R: AsyncRead + Unpin + Send,
        F: FnMut(TransferStats) + Send,
    {
        let mode = mode | S_IFREG;
        self.send_with_arg(SEND, &format!("{},{}", path, mode)).await?;
        let timestamp = chrono::Utc::now().timestamp() as u32;

        let (parser, mut writer) = self.connection.split();
        let upload = async move {
            let mut stats = TransferStats::default();
            let mut chunk = vec![0u8; DATA_MAX_LENGTH];
            loop {
                let count = read_up_to(&mut source, &mut chunk).await?;
                if count == 0 {
                    break;
                }
                writer.write(&encode_command(DATA, count as u32, &[])).await?;
                writer.write(&chunk[..count]).await?;
                stats.bytes_transferred += count as u64;
                on_progress(stats);
            }
            writer.write(&encode_command(DONE, timestamp, &[])).await?;
            Ok::<_, AdbError>(stats)
        };

        let (stats, ()) = tokio::try_join!(upload, read_push_reply(parser))?;
        Ok(stats)
    }

    /// Push a local file.
    pub async fn push_file(
        &mut self,
        local: &Path,
        path: &str,
        mode: u32,
    ) -> Result<TransferStats> {
        let file = tokio::fs::File::open(local).await?;
        self.push_stream(file, path, mode).await
    }

    /// Push in a background task, consuming the session.
    pub fn push<R>(self, source: R, path: &str, mode: u32) -> PushTransfer
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let path = path.to_string();
        PushTransfer::new(EventStream::spawn(move |notify| async move {
            let mut sync = self;
            let progress = notify.clone();
            let result = sync
                .push_with_progress(source, &path, mode, move |stats| {
                    let _ = progress.send(TransferEvent::Progress(stats));
                })
                .await;
            if let Err(e) = result {
                let _ = notify.send(TransferEvent::Error(e));
            }
            sync.end().await;
            let _ = notify.send(TransferEvent::End);
        }))
    }

    /// Write the contents of `path` into `sink`.
    pub async fn pull_to<W, F>(
        &mut self,
        path: &str,
        sink: &mut W,
        mut on_progress: F,
    ) -> Result<TransferStats>
    where
        W: AsyncWrite + Unpin + ?Sized,
        F: FnMut(TransferStats),
    {
        self.send_with_arg(RECV, path).await?;
        let parser = self.connection.parser();
        let mut stats = TransferStats::default();
        loop {
            let reply = parser.read_ascii(4).await?;
            match reply.as_str() {
                DATA => {
                    let length = le_u32(&parser.read_bytes(4).await?);
                    parser.read_byte_flow(length as usize, sink).await?;
                    stats.bytes_transferred += u64::from(length);
                    on_progress(stats);
                }
                DONE => {
                    parser.read_bytes(4).await?;
                    sink.flush().await?;
                    return Ok(stats);
                }
                FAIL => return read_sync_error(parser).await,
                _ => return parser.unexpected(&reply, "DATA, DONE or FAIL"),
            }
        }
    }

    /// Pull in a background task, consuming the session. Read the data from the returned transfer.
    pub fn pull(self, path: &str) -> PullTransfer {
        let (reader, mut writer) = tokio::io::duplex(PULL_PIPE_SIZE);
        let path = path.to_string();
        let stream = EventStream::spawn(move |notify| async move {
            let mut sync = self;
            let progress = notify.clone();
            let result = sync
                .pull_to(&path, &mut writer, move |stats| {
                    let _ = progress.send(TransferEvent::Progress(stats));
                })
                .await;
            drop(writer);
            if let Err(e) = result {
                let _ = notify.send(TransferEvent::Error(e));
            }
            sync.end().await;
            let _ = notify.send(TransferEvent::End);
        });
        PullTransfer::new(stream, reader)
    }

    /// Close the session.
    pub async fn end(&mut self) {
        self.connection.end().await;
    }
}
