//! Device list tracking over `host:track-devices`.

use crate::adb::command::host::read_devices;
use crate::adb::connection::Connection;
use crate::adb::events::EventStream;
use crate::error::{AdbError, Result};
use crate::types::Device;
use log::*;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// A device whose state changed between two lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceChange {
    pub device: Device,
    pub old: Device,
}

/// Difference between two consecutive device lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub removed: Vec<Device>,
    pub changed: Vec<DeviceChange>,
    pub added: Vec<Device>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.changed.is_empty() && self.added.is_empty()
    }
}

#[derive(Debug)]
pub enum TrackerEvent {
    Add(Device),
    Remove(Device),
    Change { device: Device, old: Device },
    ChangeSet(ChangeSet),
    Error(AdbError),
    End,
}

/// The last seen device list.
#[derive(Debug, Default)]
pub struct DeviceState {
    devices: Vec<Device>,
    by_id: HashMap<String, Device>,
}

impl DeviceState {
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Replace the list, returning what changed.
    pub fn update(&mut self, list: Vec<Device>) -> ChangeSet {
        let mut changes = ChangeSet::default();
        let mut by_id = HashMap::with_capacity(list.len());
        for device in &list {
            match self.by_id.get(&device.id) {
                Some(old) if old.device_type != device.device_type => {
                    changes.changed.push(DeviceChange {
                        device: device.clone(),
                        old: old.clone(),
                    });
                }
                Some(_) => {}
                None => changes.added.push(device.clone()),
            }
            by_id.insert(device.id.clone(), device.clone());
        }
        changes.removed = self
            .devices
            .iter()
            .filter(|device| !by_id.contains_key(&device.id))
            .cloned()
            .collect();
        self.devices = list;
        self.by_id = by_id;
        changes
    }
}

fn change_events(changes: ChangeSet) -> Vec<TrackerEvent> {
    let mut events = Vec::new();
    for change in &changes.changed {
        events.push(TrackerEvent::Change {
            device: change.device.clone(),
            old: change.old.clone(),
        });
    }
    events.extend(changes.added.iter().cloned().map(TrackerEvent::Add));
    events.extend(changes.removed.iter().cloned().map(TrackerEvent::Remove));
    events.push(TrackerEvent::ChangeSet(changes));
    events
}

async fn track(mut connection: Connection, notify: mpsc::UnboundedSender<TrackerEvent>) {
    let mut state = DeviceState::default();
    let failure: Result<()> = loop {
        let list = match read_devices(connection.parser()).await {
            Ok(list) => list,
            Err(e) if e.is_premature_eof() => {
                break Err(AdbError::Command("Connection closed".to_string()))
            }
            Err(e) => break Err(e),
        };
        debug!("Tracked {} devices", list.len());
        let delivered = change_events(state.update(list))
            .into_iter()
            .all(|event| notify.send(event).is_ok());
        if !delivered {
            break Ok(());
        }
    };
    if let Err(e) = failure {
        let _ = notify.send(TrackerEvent::Error(e));
    }
    connection.end().await;
    let _ = notify.send(TrackerEvent::End);
}

/// Follows the device list pushed by the server after `host:track-devices`.
pub struct Tracker {
    stream: EventStream<TrackerEvent>,
}

impl Tracker {
    /// Start tracking on a connection whose request was already accepted.
    pub fn new(connection: Connection) -> Self {
        Self {
            stream: EventStream::spawn(move |notify| track(connection, notify)),
        }
    }

    /// Next event, `None` once `End` was returned.
    pub async fn next_event(&mut self) -> Option<TrackerEvent> {
        self.stream
            .next(|event| matches!(event, TrackerEvent::End))
            .await
    }

    /// Stop tracking and close the connection.
    pub fn end(&mut self) {
        self.stream.cancel(TrackerEvent::End);
    }
}
