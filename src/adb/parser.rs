use crate::adb::protocol;
use crate::error::{AdbError, Result};
use bytes::{Buf, Bytes, BytesMut};
use regex::Regex;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const READ_CHUNK: usize = 8 * 1024;

/// Captured groups of a line matched by [`Parser::search_line`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    groups: Vec<Option<String>>,
}

impl LineMatch {
    /// The whole matched line.
    pub fn line(&self) -> &str {
        self.get(0).unwrap_or_default()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.groups.get(index).and_then(|group| group.as_deref())
    }
}

/// Suspending reads over a chunked byte stream.
///
/// Every read pulls from the stream into an internal buffer and only
/// consumes bytes once the read can complete, so dropping an in-flight
/// read future leaves the buffered bytes in place for the next one.
pub struct Parser<R> {
    reader: R,
    buffer: BytesMut,
    ended: bool,
    timeout: Option<Duration>,
}

impl<R: AsyncRead + Unpin> Parser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: BytesMut::new(),
            ended: false,
            timeout: None,
        }
    }

    /// Fail reads that see no data for `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Bytes received but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    async fn fill(&mut self) -> Result<usize> {
        if self.ended {
            return Ok(0);
        }
        self.buffer.reserve(READ_CHUNK);
        let read = self.reader.read_buf(&mut self.buffer);
        let count = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, read)
                .await
                .map_err(|_| AdbError::Timeout)??,
            None => read.await?,
        };
        if count == 0 {
            self.ended = true;
        }
        Ok(count)
    }

    fn premature_eof(&mut self, needed: usize) -> AdbError {
        let missing_bytes = needed.saturating_sub(self.buffer.len());
        self.buffer.clear();
        AdbError::PrematureEof { missing_bytes }
    }

    /// Read exactly `count` bytes.
    pub async fn read_bytes(&mut self, count: usize) -> Result<Bytes> {
        while self.buffer.len() < count {
            if self.fill().await? == 0 {
                return Err(self.premature_eof(count));
            }
        }
        Ok(self.buffer.split_to(count).freeze())
    }

    pub async fn read_ascii(&mut self, count: usize) -> Result<String> {
        let bytes = self.read_bytes(count).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read until the stream ends. Never fails with a premature end.
    pub async fn read_all(&mut self) -> Result<Bytes> {
        while self.fill().await? > 0 {}
        Ok(self.buffer.split().freeze())
    }

    /// Read a hex length prefixed value.
    pub async fn read_value(&mut self) -> Result<Bytes> {
        let length = self.read_ascii(4).await?;
        let length = protocol::decode_length(&length)?;
        self.read_bytes(length as usize).await
    }

    /// Read the value following a `FAIL` reply and turn it into an error.
    pub async fn read_error<T>(&mut self) -> Result<T> {
        let value = self.read_value().await?;
        Err(AdbError::Fail(String::from_utf8_lossy(&value).into_owned()))
    }

    /// Read up to, and discard, the next `delimiter`.
    pub async fn read_until(&mut self, delimiter: u8) -> Result<Bytes> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = self.buffer[scanned..].iter().position(|&b| b == delimiter) {
                let found = self.buffer.split_to(scanned + pos).freeze();
                self.buffer.advance(1);
                return Ok(found);
            }
            scanned = self.buffer.len();
            if self.fill().await? == 0 {
                self.buffer.clear();
                return Err(AdbError::PrematureEof { missing_bytes: 1 });
            }
        }
    }

    /// Read one `\n` terminated line, without the terminator or a trailing `\r`.
    pub async fn read_line(&mut self) -> Result<Bytes> {
        let mut line = self.read_until(b'\n').await?;
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        Ok(line)
    }

    /// Read lines until one matches `pattern`.
    pub async fn search_line(&mut self, pattern: &Regex) -> Result<LineMatch> {
        loop {
            let line = self.read_line().await?;
            let line = String::from_utf8_lossy(&line);
            if let Some(captures) = pattern.captures(&line) {
                let groups = captures
                    .iter()
                    .map(|group| group.map(|m| m.as_str().to_string()))
                    .collect();
                return Ok(LineMatch { groups });
            }
        }
    }

    /// Copy `count` bytes into `sink`, forwarding whatever is available as it arrives.
    pub async fn read_byte_flow<W>(&mut self, count: usize, sink: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut remaining = count;
        while remaining > 0 {
            if self.buffer.is_empty() && self.fill().await? == 0 {
                return Err(AdbError::PrematureEof {
                    missing_bytes: remaining,
                });
            }
            let take = remaining.min(self.buffer.len());
            let chunk = self.buffer.split_to(take);
            sink.write_all(&chunk).await?;
            remaining -= take;
        }
        Ok(())
    }

    /// Read at most `max` bytes, waiting only if nothing is buffered.
    /// Returns an empty chunk once the stream has ended.
    pub async fn read_chunk(&mut self, max: usize) -> Result<Bytes> {
        if self.buffer.is_empty() {
            self.fill().await?;
        }
        let take = max.min(self.buffer.len());
        Ok(self.buffer.split_to(take).freeze())
    }

    pub fn unexpected<T>(&self, data: &str, expected: &str) -> Result<T> {
        Err(AdbError::unexpected(data, expected))
    }

    /// Discard everything up to the end of the stream. Idempotent.
    pub async fn end(&mut self) {
        loop {
            self.buffer.clear();
            match self.fill().await {
                Ok(0) => break,
                Ok(_) => continue,
                Err(_) => {
                    self.ended = true;
                    break;
                }
            }
        }
        self.buffer.clear();
    }

    /// Hand back unconsumed bytes and the underlying reader.
    pub fn into_parts(self) -> (Bytes, R) {
        (self.buffer.freeze(), self.reader)
    }
}
