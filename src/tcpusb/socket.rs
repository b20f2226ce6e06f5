//! One bridged ADB connection: handshake, authentication and stream multiplexing.

use crate::adb::auth::{parse_public_key, AdbPublicKey};
use crate::adb::client::DeviceProvider;
use crate::error::{AdbError, Result};
use crate::tcpusb::packet::{
    Packet, A_AUTH, A_CLSE, A_CNXN, A_OKAY, A_OPEN, A_SYNC, A_WRTE, AUTH_RSAPUBLICKEY,
    AUTH_SIGNATURE, AUTH_TOKEN,
};
use crate::tcpusb::packet_reader::PacketReader;
use crate::tcpusb::rolling_counter::RollingCounter;
use crate::tcpusb::service::{self, ServiceContext, ServiceHandle};
use crate::tcpusb::service_map::ServiceMap;
use async_trait::async_trait;
use bytes::Bytes;
use log::*;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

const TOKEN_LENGTH: usize = 20;
const MAX_PAYLOAD: u32 = 0xffff;
const DEVICE_ID_PROPERTIES: [&str; 3] = ["ro.product.name", "ro.product.model", "ro.product.device"];

/// Decides whether a verified public key may use the bridge.
#[async_trait]
pub trait AuthPolicy: Send + Sync {
    async fn authorize(&self, key: &AdbPublicKey) -> bool;
}

/// Accepts every key with a valid signature.
pub struct AllowAll;

#[async_trait]
impl AuthPolicy for AllowAll {
    async fn authorize(&self, _key: &AdbPublicKey) -> bool {
        true
    }
}

#[derive(Debug)]
pub enum Outgoing {
    Data(Bytes),
    Shutdown,
}

/// Queues writes to the bridge peer. Cloned into every service.
#[derive(Clone)]
pub struct PeerWriter {
    sender: mpsc::UnboundedSender<Outgoing>,
    closed: Arc<AtomicBool>,
}

impl PeerWriter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let writer = Self {
            sender,
            closed: Arc::new(AtomicBool::new(false)),
        };
        (writer, receiver)
    }

    /// False once the peer is gone or the socket ended.
    pub fn write(&self, chunk: Bytes) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        self.sender.send(Outgoing::Data(chunk)).is_ok()
    }

    /// Flush what was queued so far, then close the write side.
    pub fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.sender.send(Outgoing::Shutdown);
        }
    }
}

async fn drain<W: AsyncWrite + Unpin>(mut outgoing: mpsc::UnboundedReceiver<Outgoing>, mut writer: W) {
    while let Some(item) = outgoing.recv().await {
        match item {
            Outgoing::Data(chunk) => {
                if let Err(e) = writer.write_all(&chunk).await {
                    debug!("Peer write failed: {}", e);
                    break;
                }
            }
            Outgoing::Shutdown => break,
        }
    }
    let _ = writer.shutdown().await;
}

/// Per-connection state of the bridge.
pub struct Socket {
    provider: Arc<dyn DeviceProvider>,
    serial: String,
    auth: Arc<dyn AuthPolicy>,
    peer: PeerWriter,
    authorized: bool,
    version: u32,
    max_payload: u32,
    token: Option<[u8; TOKEN_LENGTH]>,
    signature: Option<Bytes>,
    sync_token: RollingCounter,
    local_ids: RollingCounter,
    services: ServiceMap<ServiceHandle>,
    done_tx: mpsc::UnboundedSender<u32>,
    done_rx: mpsc::UnboundedReceiver<u32>,
}

impl Socket {
    /// Serve one peer until it disconnects or breaks the protocol.
    ///
    /// Every open service is closed before the peer's write side is shut down.
    pub async fn run<S>(
        provider: Arc<dyn DeviceProvider>,
        serial: &str,
        auth: Arc<dyn AuthPolicy>,
        stream: S,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (peer, outgoing) = PeerWriter::channel();
        let writer_task = tokio::spawn(drain(outgoing, writer));

        let mut socket = Socket::new(provider, serial, auth, peer);
        let result = socket.serve(PacketReader::new(reader)).await;
        socket.services.end();
        socket.peer.shutdown();
        let _ = writer_task.await;
        result
    }

    fn new(
        provider: Arc<dyn DeviceProvider>,
        serial: &str,
        auth: Arc<dyn AuthPolicy>,
        peer: PeerWriter,
    ) -> Self {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        Socket {
            provider,
            serial: serial.to_string(),
            auth,
            peer,
            authorized: false,
            version: 1,
            max_payload: 4096,
            token: None,
            signature: None,
            sync_token: RollingCounter::new(u32::MAX),
            local_ids: RollingCounter::new(u32::MAX),
            services: ServiceMap::new(),
            done_tx,
            done_rx,
        }
    }

    async fn serve<R: AsyncRead + Unpin>(&mut self, mut reader: PacketReader<R>) -> Result<()> {
        loop {
            tokio::select! {
                packet = reader.read_packet() => match packet? {
                    Some(packet) => self.handle(packet).await?,
                    None => return Ok(()),
                },
                Some(local_id) = self.done_rx.recv() => {
                    self.services.remove(local_id);
                    debug!("Handling {} services simultaneously", self.services.count());
                }
            }
        }
    }

    async fn handle(&mut self, packet: Packet) -> Result<()> {
        match packet.command {
            A_SYNC => {
                self.handle_sync();
                Ok(())
            }
            A_CNXN => {
                self.handle_connection(&packet);
                Ok(())
            }
            A_AUTH => self.handle_auth(packet).await,
            A_OPEN => self.handle_open(packet),
            A_OKAY | A_WRTE | A_CLSE => self.forward(packet),
            command => Err(AdbError::Protocol(format!("Unknown command {}", command))),
        }
    }

    fn write(&self, command: u32, arg0: u32, arg1: u32, data: &[u8]) -> bool {
        self.peer.write(Packet::assemble(command, arg0, arg1, data))
    }

    fn handle_sync(&mut self) {
        debug!("I:A_SYNC");
        debug!("O:A_SYNC");
        let token = self.sync_token.next();
        self.write(A_SYNC, 1, token, &[]);
    }

    fn handle_connection(&mut self, packet: &Packet) {
        debug!("I:A_CNXN {}", packet);
        self.version = Packet::swap32(packet.arg0);
        // A zero payload size would make every relayed read look like EOF
        self.max_payload = packet.arg1.clamp(1, MAX_PAYLOAD);

        let mut token = [0u8; TOKEN_LENGTH];
        rand::rng().fill(&mut token);
        self.token = Some(token);
        debug!("O:A_AUTH");
        self.write(A_AUTH, AUTH_TOKEN, 0, &token);
    }

    async fn handle_auth(&mut self, packet: Packet) -> Result<()> {
        debug!("I:A_AUTH {}", packet);
        match packet.arg0 {
            AUTH_SIGNATURE => {
                // Later signatures are ignored
                if self.signature.is_none() {
                    self.signature = Some(packet.data.clone());
                }
                debug!("O:A_AUTH");
                let token = self.token.unwrap_or([0u8; TOKEN_LENGTH]);
                self.write(A_AUTH, AUTH_TOKEN, 0, &token);
                Ok(())
            }
            AUTH_RSAPUBLICKEY => {
                let Some(signature) = self.signature.clone() else {
                    return Err(AdbError::Auth("Public key sent before signature".to_string()));
                };
                if packet.data.len() < 2 {
                    return Err(AdbError::Auth("Empty RSA public key".to_string()));
                }
                let text = String::from_utf8_lossy(skip_null(&packet.data)).into_owned();
                let key = parse_public_key(&text)?;
                let verified = self
                    .token
                    .is_some_and(|token| key.verify(&token, &signature));
                if !verified {
                    debug!("Signature mismatch");
                    return Err(AdbError::Auth("Signature mismatch".to_string()));
                }
                debug!("Signature verified");

                if !self.auth.authorize(&key).await {
                    debug!("Connection rejected by user-defined auth handler");
                    return Err(AdbError::Auth("Rejected by user-defined handler".to_string()));
                }

                let id = self.device_id().await?;
                self.authorized = true;
                info!("Authorized key {}", key.fingerprint());
                debug!("O:A_CNXN");
                self.write(
                    A_CNXN,
                    Packet::swap32(self.version),
                    self.max_payload,
                    id.as_bytes(),
                );
                Ok(())
            }
            method => Err(AdbError::Protocol(format!(
                "Unknown authentication method {}",
                method
            ))),
        }
    }

    async fn device_id(&self) -> Result<String> {
        debug!("Loading device properties to form a standard device ID");
        let properties = self.provider.get_properties(&self.serial).await?;
        let id: String = DEVICE_ID_PROPERTIES
            .iter()
            .map(|name| {
                let value = properties.get(*name).map(String::as_str).unwrap_or("");
                format!("{}={};", name, value)
            })
            .collect();
        Ok(format!("device::{}\0", id))
    }

    fn handle_open(&mut self, packet: Packet) -> Result<()> {
        if !self.authorized {
            return Err(AdbError::Unauthorized);
        }
        let remote_id = packet.arg0;
        let local_id = self.local_ids.next();
        if packet.data.len() < 2 {
            return Err(AdbError::Protocol("Empty service name".to_string()));
        }
        let name = String::from_utf8_lossy(skip_null(&packet.data)).into_owned();
        debug!("Calling {}", name);

        let context = ServiceContext {
            provider: self.provider.clone(),
            serial: self.serial.clone(),
            local_id,
            remote_id,
            max_payload: self.max_payload as usize,
            peer: self.peer.clone(),
        };
        let (handle, runner) = service::open(context, name);
        if let Err(e) = self.services.insert(local_id, handle) {
            // The id is still taken by a live service, refuse only this stream
            warn!("{}", e);
            self.write(A_CLSE, 0, remote_id, &[]);
            return Ok(());
        }
        debug!("Handling {} services simultaneously", self.services.count());

        let done = self.done_tx.clone();
        tokio::spawn(async move {
            runner.await;
            let _ = done.send(local_id);
        });
        Ok(())
    }

    fn forward(&mut self, packet: Packet) -> Result<()> {
        if !self.authorized {
            return Err(AdbError::Unauthorized);
        }
        match self.services.get(packet.arg1) {
            Some(service) => {
                service.handle(packet);
            }
            None => debug!("Received a packet to a service that may have been closed already"),
        }
        Ok(())
    }
}

/// Drop the trailing NUL of a C string payload.
fn skip_null(data: &[u8]) -> &[u8] {
    data.strip_suffix(&[0u8]).unwrap_or(data)
}
