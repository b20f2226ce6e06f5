//! Debuggable process tracking over `track-jdwp`.

use crate::adb::connection::Connection;
use crate::adb::events::EventStream;
use crate::error::AdbError;
use serde::Serialize;
use std::collections::HashSet;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JdwpChangeSet {
    pub removed: Vec<String>,
    pub added: Vec<String>,
}

#[derive(Debug)]
pub enum JdwpEvent {
    Add(String),
    Remove(String),
    /// The changes and the complete new pid list.
    ChangeSet(JdwpChangeSet, Vec<String>),
    Error(AdbError),
    End,
}

/// Split a pid list value, dropping the empty entry after a trailing newline.
pub fn parse_pids(value: &str) -> Vec<String> {
    let mut pids: Vec<String> = value.split('\n').map(str::to_string).collect();
    if pids.last().is_some_and(|last| last.is_empty()) {
        pids.pop();
    }
    pids
}

#[derive(Debug, Default)]
pub struct JdwpState {
    pids: Vec<String>,
}

impl JdwpState {
    pub fn pids(&self) -> &[String] {
        &self.pids
    }

    pub fn update(&mut self, list: Vec<String>) -> JdwpChangeSet {
        let old: HashSet<&String> = self.pids.iter().collect();
        let new: HashSet<&String> = list.iter().collect();
        let changes = JdwpChangeSet {
            added: list.iter().filter(|pid| !old.contains(pid)).cloned().collect(),
            removed: self
                .pids
                .iter()
                .filter(|pid| !new.contains(pid))
                .cloned()
                .collect(),
        };
        self.pids = list;
        changes
    }
}

async fn track(mut connection: Connection, notify: mpsc::UnboundedSender<JdwpEvent>) {
    let mut state = JdwpState::default();
    loop {
        let value = match connection.parser().read_value().await {
            Ok(value) => value,
            // The device closing the stream is a normal end
            Err(e) if e.is_premature_eof() => break,
            Err(e) => {
                let _ = notify.send(JdwpEvent::Error(e));
                break;
            }
        };
        let pids = parse_pids(&String::from_utf8_lossy(&value));
        let changes = state.update(pids.clone());
        let mut events: Vec<JdwpEvent> = changes.added.iter().cloned().map(JdwpEvent::Add).collect();
        events.extend(changes.removed.iter().cloned().map(JdwpEvent::Remove));
        events.push(JdwpEvent::ChangeSet(changes, pids));
        if !events.into_iter().all(|event| notify.send(event).is_ok()) {
            break;
        }
    }
    connection.end().await;
    let _ = notify.send(JdwpEvent::End);
}

/// Follows the pids of debuggable processes on one device.
pub struct JdwpTracker {
    stream: EventStream<JdwpEvent>,
}

impl JdwpTracker {
    pub fn new(connection: Connection) -> Self {
        Self {
            stream: EventStream::spawn(move |notify| track(connection, notify)),
        }
    }

    pub async fn next_event(&mut self) -> Option<JdwpEvent> {
        self.stream
            .next(|event| matches!(event, JdwpEvent::End))
            .await
    }

    pub fn end(&mut self) {
        self.stream.cancel(JdwpEvent::End);
    }
}
