use crate::adb::dump::{NoDump, WireDump};
use crate::adb::parser::Parser;
use crate::adb::protocol;
use crate::adb::server::AdbServer;
use crate::config::ClientOptions;
use crate::error::{AdbError, Result};
use bytes::Bytes;
use log::*;
use std::fmt;
use std::io::{Cursor, ErrorKind};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, Chain, ReadBuf, ReadHalf, WriteHalf,
};
use tokio::net::TcpStream;

/// Any duplex byte stream a connection can run over.
pub trait AdbStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AdbStream for T {}

pub type BoxedStream = Box<dyn AdbStream>;
pub type ConnectionReader = ReadHalf<BoxedStream>;

/// One socket to the ADB server, with the parser reading from it.
pub struct Connection {
    parser: Parser<ConnectionReader>,
    writer: WriteHalf<BoxedStream>,
    dump: Arc<dyn WireDump>,
}

impl Connection {
    /// Connect to the ADB server, starting it once if the connection is refused.
    pub async fn connect(options: &ClientOptions) -> Result<Self> {
        Self::connect_with_dump(options, Arc::new(NoDump)).await
    }

    pub async fn connect_with_dump(
        options: &ClientOptions,
        dump: Arc<dyn WireDump>,
    ) -> Result<Self> {
        let address = format!("{}:{}", options.host, options.port);
        debug!("Connecting to {}", address);

        let mut tried_starting = false;
        let stream = loop {
            match TcpStream::connect(&address).await {
                Ok(stream) => break stream,
                Err(e) if e.kind() == ErrorKind::ConnectionRefused && !tried_starting => {
                    debug!("Connection was refused, let's try starting the server once");
                    tried_starting = true;
                    AdbServer::new(&options.bin).start(options.port).await?;
                }
                Err(e) => return Err(AdbError::Io(e)),
            }
        };
        stream.set_nodelay(true)?;
        debug!("Connection established");

        let mut connection = Self::from_stream(stream).with_dump(dump);
        connection.parser.set_timeout(options.timeout());
        Ok(connection)
    }

    /// Wrap an already open stream.
    pub fn from_stream<S: AdbStream + 'static>(stream: S) -> Self {
        let boxed: BoxedStream = Box::new(stream);
        let (reader, writer) = tokio::io::split(boxed);
        Self {
            parser: Parser::new(reader),
            writer,
            dump: Arc::new(NoDump),
        }
    }

    pub fn with_dump(mut self, dump: Arc<dyn WireDump>) -> Self {
        self.dump = dump;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.parser.set_timeout(timeout);
        self
    }

    pub fn parser(&mut self) -> &mut Parser<ConnectionReader> {
        &mut self.parser
    }

    /// Raw write.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.dump.record(data);
        self.writer.write_all(data).await?;
        Ok(())
    }

    /// Send one length prefixed request line.
    pub async fn send(&mut self, request: &str) -> Result<()> {
        if request.len() > protocol::MAX_LENGTH {
            return Err(AdbError::Protocol(format!(
                "Request of {} bytes does not fit a 4 digit length",
                request.len()
            )));
        }
        debug!("Sending command: {}", request);
        self.write(&protocol::encode_data(request)).await
    }

    /// Borrow the read and write sides at the same time.
    pub fn split(&mut self) -> (&mut Parser<ConnectionReader>, ConnectionWriter<'_>) {
        (
            &mut self.parser,
            ConnectionWriter {
                writer: &mut self.writer,
                dump: self.dump.as_ref(),
            },
        )
    }

    /// Half-close and drain whatever the server still sends.
    pub async fn end(&mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!("Shutdown failed: {}", e);
        }
        self.parser.end().await;
    }

    /// Give up framing and return the stream, starting with any buffered bytes.
    pub fn into_raw(self) -> RawStream {
        let (leftover, reader) = self.parser.into_parts();
        RawStream {
            reader: Cursor::new(leftover).chain(reader),
            writer: self.writer,
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("buffered", &self.parser.buffered())
            .field("ended", &self.parser.is_ended())
            .finish_non_exhaustive()
    }
}

/// Write side of a [`Connection`] borrowed alongside its parser.
pub struct ConnectionWriter<'a> {
    writer: &'a mut WriteHalf<BoxedStream>,
    dump: &'a dyn WireDump,
}

impl ConnectionWriter<'_> {
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.dump.record(data);
        self.writer.write_all(data).await?;
        Ok(())
    }
}

/// Unframed remainder of a connection, e.g. shell output.
pub struct RawStream {
    reader: Chain<Cursor<Bytes>, ConnectionReader>,
    writer: WriteHalf<BoxedStream>,
}

impl AsyncRead for RawStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().reader).poll_read(cx, buf)
    }
}

impl AsyncWrite for RawStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.get_mut().writer).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().writer).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().writer).poll_shutdown(cx)
    }
}
