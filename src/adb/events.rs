//! Event channel shared by the device tracker, the JDWP tracker and sync transfers.

use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Events of a background task, ending with the event `cancel` queues.
pub(crate) struct EventStream<E> {
    events: mpsc::UnboundedReceiver<E>,
    notify: mpsc::UnboundedSender<E>,
    handle: JoinHandle<()>,
    ended: bool,
}

impl<E: Send + 'static> EventStream<E> {
    /// Spawn `run`, handing it the sender for its events.
    pub(crate) fn spawn<F, Fut>(run: F) -> Self
    where
        F: FnOnce(mpsc::UnboundedSender<E>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (notify, events) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(notify.clone()));
        Self {
            events,
            notify,
            handle,
            ended: false,
        }
    }

    /// Next event. `None` once `is_end` matched or the task is gone.
    pub(crate) async fn next(&mut self, is_end: impl Fn(&E) -> bool) -> Option<E> {
        if self.ended {
            return None;
        }
        let event = self.events.recv().await;
        match &event {
            Some(event) if !is_end(event) => {}
            _ => self.ended = true,
        }
        event
    }

    /// Abort the task, dropping whatever it owns, and queue `end`.
    pub(crate) fn cancel(&mut self, end: E) {
        if self.handle.is_finished() {
            return;
        }
        self.handle.abort();
        let _ = self.notify.send(end);
    }
}
