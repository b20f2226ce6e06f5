use bytes::{Buf, BufMut, BytesMut};
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

const CHUNK_SIZE: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Waiting for the first byte to decide.
    Detect,
    /// First byte was `\r`, drop the `\n` after it.
    SkipLf,
    Convert,
    Passthrough,
}

/// Turns `\r\n` back into `\n` in output that went through a device pty.
///
/// With auto-detection the stream must start with the newline printed by a
/// leading `echo`. A bare `\n` means the pty left line endings alone and the
/// rest passes through untouched. Either way the leading newline is dropped.
pub struct LineTransform<R> {
    inner: R,
    mode: Mode,
    pending_cr: bool,
    output: BytesMut,
    eof: bool,
}

impl<R> LineTransform<R> {
    pub fn new(inner: R) -> Self {
        Self::with_mode(inner, Mode::Convert)
    }

    pub fn auto_detect(inner: R) -> Self {
        Self::with_mode(inner, Mode::Detect)
    }

    /// Auto-detect, with bytes already taken off the stream fed in first.
    pub fn auto_detect_from(head: &[u8], inner: R) -> Self {
        let mut transform = Self::auto_detect(inner);
        transform.feed(head);
        transform
    }

    fn with_mode(inner: R, mode: Mode) -> Self {
        Self {
            inner,
            mode,
            pending_cr: false,
            output: BytesMut::new(),
            eof: false,
        }
    }

    fn feed(&mut self, data: &[u8]) {
        for &byte in data {
            match self.mode {
                Mode::Detect => match byte {
                    b'\n' => self.mode = Mode::Passthrough,
                    b'\r' => self.mode = Mode::SkipLf,
                    _ => {
                        self.mode = Mode::Convert;
                        self.convert(byte);
                    }
                },
                Mode::SkipLf => {
                    self.mode = Mode::Convert;
                    if byte != b'\n' {
                        self.convert(byte);
                    }
                }
                Mode::Convert => self.convert(byte),
                Mode::Passthrough => self.output.put_u8(byte),
            }
        }
    }

    fn convert(&mut self, byte: u8) {
        if self.pending_cr {
            self.pending_cr = false;
            if byte == b'\n' {
                self.output.put_u8(b'\n');
                return;
            }
            self.output.put_u8(b'\r');
        }
        if byte == b'\r' {
            self.pending_cr = true;
        } else {
            self.output.put_u8(byte);
        }
    }

    fn finish(&mut self) {
        self.eof = true;
        if self.pending_cr {
            self.pending_cr = false;
            self.output.put_u8(b'\r');
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for LineTransform<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            if !this.output.is_empty() {
                let count = this.output.len().min(buf.remaining());
                buf.put_slice(&this.output[..count]);
                this.output.advance(count);
                return Poll::Ready(Ok(()));
            }
            if this.eof {
                return Poll::Ready(Ok(()));
            }

            let mut chunk = [0u8; CHUNK_SIZE];
            let mut read = ReadBuf::new(&mut chunk);
            ready!(Pin::new(&mut this.inner).poll_read(cx, &mut read))?;
            if read.filled().is_empty() {
                this.finish();
            } else {
                this.feed(read.filled());
            }
        }
    }
}
