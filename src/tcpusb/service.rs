//! One bridged stream: an `OPEN`ed service relayed onto its own device transport.

use crate::adb::client::DeviceProvider;
use crate::adb::command::read_okay;
use crate::adb::connection::Connection;
use crate::error::{AdbError, Result};
use crate::tcpusb::packet::{Packet, A_CLSE, A_OKAY, A_WRTE};
use crate::tcpusb::service_map::Closeable;
use crate::tcpusb::socket::PeerWriter;
use log::*;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

/// State shared between a service's task and its handle in the service map.
struct ServiceState {
    local_id: u32,
    remote_id: u32,
    opened: AtomicBool,
    ended: AtomicBool,
    closed: Notify,
    peer: PeerWriter,
}

impl ServiceState {
    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    fn write(&self, command: u32, data: &[u8]) {
        self.peer
            .write(Packet::assemble(command, self.local_id, self.remote_id, data));
    }

    /// Send the final `CLSE` once. A local id of zero tells the peer the open failed.
    fn end(&self) {
        if self.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("O:A_CLSE");
        let local_id = if self.opened.load(Ordering::SeqCst) {
            self.local_id
        } else {
            0
        };
        // The peer may be gone already
        self.peer
            .write(Packet::assemble(A_CLSE, local_id, self.remote_id, &[]));
        self.closed.notify_one();
    }
}

/// The socket's side of a running service.
pub struct ServiceHandle {
    state: Arc<ServiceState>,
    packets: mpsc::UnboundedSender<Packet>,
}

impl ServiceHandle {
    /// Queue an `OKAY`, `WRTE` or `CLSE` for the service, in arrival order.
    pub fn handle(&self, packet: Packet) -> bool {
        if self.state.is_ended() {
            return false;
        }
        self.packets.send(packet).is_ok()
    }

    pub fn local_id(&self) -> u32 {
        self.state.local_id
    }
}

impl Closeable for ServiceHandle {
    fn end(&self) {
        self.state.end();
    }
}

/// Everything a service needs from its socket.
pub struct ServiceContext {
    pub provider: Arc<dyn DeviceProvider>,
    pub serial: String,
    pub local_id: u32,
    pub remote_id: u32,
    pub max_payload: usize,
    pub peer: PeerWriter,
}

/// Create a service for `name`. Nothing happens until the returned future runs.
///
/// The future resolves once the service ended, for whatever reason. Errors
/// are logged and end only this service.
pub fn open(context: ServiceContext, name: String) -> (ServiceHandle, impl Future<Output = ()>) {
    let state = Arc::new(ServiceState {
        local_id: context.local_id,
        remote_id: context.remote_id,
        opened: AtomicBool::new(false),
        ended: AtomicBool::new(false),
        closed: Notify::new(),
        peer: context.peer,
    });
    let (packets, inbox) = mpsc::unbounded_channel();
    let handle = ServiceHandle {
        state: state.clone(),
        packets,
    };
    let task = async move {
        let mut service = Service {
            state,
            inbox,
            need_ack: false,
        };
        if let Err(e) = service
            .run(
                context.provider.as_ref(),
                &context.serial,
                &name,
                context.max_payload.max(1),
            )
            .await
        {
            warn!("Service {} failed: {}", name, e);
        }
        service.state.end();
    };
    (handle, task)
}

struct Service {
    state: Arc<ServiceState>,
    inbox: mpsc::UnboundedReceiver<Packet>,
    need_ack: bool,
}

impl Service {
    async fn run(
        &mut self,
        provider: &dyn DeviceProvider,
        serial: &str,
        name: &str,
        max_payload: usize,
    ) -> Result<()> {
        debug!("I:A_OPEN {}", name);

        // Nothing may arrive for this stream before its transport exists
        let mut transport = tokio::select! {
            transport = provider.transport(serial) => transport?,
            Some(packet) = self.inbox.recv() => return Err(AdbError::PrematurePacket(packet)),
            _ = self.state.closed.notified() => return Err(AdbError::LateTransport),
        };
        if self.state.is_ended() {
            return Err(AdbError::LateTransport);
        }

        transport.send(name).await?;
        loop {
            tokio::select! {
                reply = read_okay(transport.parser()) => {
                    reply?;
                    break;
                }
                packet = self.inbox.recv() => match packet {
                    Some(packet) => {
                        if !self.handle_packet(&mut transport, packet).await? {
                            return Ok(());
                        }
                    }
                    None => return Ok(()),
                },
                _ = self.state.closed.notified() => return Ok(()),
            }
        }
        debug!("O:A_OKAY");
        self.state.write(A_OKAY, &[]);
        self.state.opened.store(true, Ordering::SeqCst);

        loop {
            tokio::select! {
                chunk = transport.parser().read_chunk(max_payload), if !self.need_ack => {
                    let chunk = chunk?;
                    if chunk.is_empty() {
                        return Ok(());
                    }
                    debug!("O:A_WRTE");
                    self.state.write(A_WRTE, &chunk);
                    self.need_ack = true;
                }
                packet = self.inbox.recv() => match packet {
                    Some(packet) => {
                        if !self.handle_packet(&mut transport, packet).await? {
                            return Ok(());
                        }
                    }
                    None => return Ok(()),
                },
                _ = self.state.closed.notified() => return Ok(()),
            }
        }
    }

    /// Apply one packet from the peer. Returns false once the stream should close.
    async fn handle_packet(&mut self, transport: &mut Connection, packet: Packet) -> Result<bool> {
        if self.state.is_ended() {
            return Ok(false);
        }
        match packet.command {
            A_OKAY => {
                debug!("I:A_OKAY {}", packet);
                self.need_ack = false;
                Ok(true)
            }
            A_WRTE => {
                debug!("I:A_WRTE {}", packet);
                if !packet.data.is_empty() {
                    transport.write(&packet.data).await?;
                }
                debug!("O:A_OKAY");
                self.state.write(A_OKAY, &[]);
                Ok(true)
            }
            A_CLSE => {
                debug!("I:A_CLSE {}", packet);
                Ok(false)
            }
            _ => Err(AdbError::Protocol(format!("Unexpected packet {}", packet))),
        }
    }
}
