//! Background push and pull transfers.

use crate::adb::events::EventStream;
use crate::adb::sync::stats::TransferStats;
use crate::error::{AdbError, Result};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, DuplexStream, ReadBuf};

#[derive(Debug)]
pub enum TransferEvent {
    Progress(TransferStats),
    Error(AdbError),
    /// Always the last event, whether the transfer succeeded, failed or was cancelled.
    End,
}

fn is_end(event: &TransferEvent) -> bool {
    matches!(event, TransferEvent::End)
}

/// Fold the remaining events into the final stats or the reported error.
async fn wait_for(mut stream: EventStream<TransferEvent>) -> Result<TransferStats> {
    let mut stats = TransferStats::default();
    let mut failure = None;
    while let Some(event) = stream.next(is_end).await {
        match event {
            TransferEvent::Progress(progress) => stats = progress,
            TransferEvent::Error(e) => failure = Some(e),
            TransferEvent::End => break,
        }
    }
    match failure {
        Some(e) => Err(e),
        None => Ok(stats),
    }
}

/// A push running in its own task.
pub struct PushTransfer {
    stream: EventStream<TransferEvent>,
}

impl PushTransfer {
    pub(crate) fn new(stream: EventStream<TransferEvent>) -> Self {
        Self { stream }
    }

    /// Next progress, error or end event. `None` after `End`.
    pub async fn next_event(&mut self) -> Option<TransferEvent> {
        self.stream.next(is_end).await
    }

    /// Abort both halves of the transfer and tear down the connection.
    pub fn cancel(&mut self) {
        self.stream.cancel(TransferEvent::End);
    }

    /// Wait for the transfer to finish and return the final byte count.
    pub async fn wait(self) -> Result<TransferStats> {
        wait_for(self.stream).await
    }
}

/// A pull running in its own task. Read the file contents from it.
pub struct PullTransfer {
    stream: EventStream<TransferEvent>,
    data: DuplexStream,
}

impl PullTransfer {
    pub(crate) fn new(stream: EventStream<TransferEvent>, data: DuplexStream) -> Self {
        Self { stream, data }
    }

    pub async fn next_event(&mut self) -> Option<TransferEvent> {
        self.stream.next(is_end).await
    }

    pub fn cancel(&mut self) {
        self.stream.cancel(TransferEvent::End);
    }

    /// Wait for the transfer to finish, discarding any unread data.
    pub async fn wait(self) -> Result<TransferStats> {
        // The task blocks once the pipe is full, so keep draining it
        let Self { stream, mut data } = self;
        let drain = tokio::spawn(async move {
            let _ = tokio::io::copy(&mut data, &mut tokio::io::sink()).await;
        });
        let result = wait_for(stream).await;
        drain.abort();
        result
    }
}

impl AsyncRead for PullTransfer {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().data).poll_read(cx, buf)
    }
}
