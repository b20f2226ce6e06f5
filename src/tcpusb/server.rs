use crate::adb::client::DeviceProvider;
use crate::error::Result;
use crate::tcpusb::socket::{AllowAll, AuthPolicy, Socket};
use log::*;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::broadcast;

/// Exposes one device as a TCP listener speaking the ADB transport protocol.
pub struct Server {
    provider: Arc<dyn DeviceProvider>,
    serial: String,
    auth: Arc<dyn AuthPolicy>,
    shutdown: broadcast::Sender<()>,
}

impl Server {
    pub fn new(provider: Arc<dyn DeviceProvider>, serial: impl Into<String>) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            provider,
            serial: serial.into(),
            auth: Arc::new(AllowAll),
            shutdown,
        }
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthPolicy>) -> Self {
        self.auth = auth;
        self
    }

    /// Sender that stops [`Server::serve`] when signalled.
    pub fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown.clone()
    }

    pub async fn bind(addr: impl ToSocketAddrs) -> Result<TcpListener> {
        Ok(TcpListener::bind(addr).await?)
    }

    /// Bind `addr` and serve until shut down.
    pub async fn listen(&self, addr: impl ToSocketAddrs) -> Result<()> {
        let listener = Self::bind(addr).await?;
        info!(
            "Bridging {} on {}",
            self.serial,
            listener.local_addr()?
        );
        self.serve(listener).await
    }

    /// Accept connections, one socket task each. Open connections keep
    /// running after shutdown until their peer leaves.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let mut shutdown = self.shutdown.subscribe();
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, addr) = accepted?;
                    stream.set_nodelay(true)?;
                    self.spawn_socket(stream, addr);
                }
                _ = shutdown.recv() => {
                    info!("Bridge for {} shutting down", self.serial);
                    return Ok(());
                }
            }
        }
    }

    fn spawn_socket(&self, stream: tokio::net::TcpStream, addr: SocketAddr) {
        info!("Connection from {}", addr);
        let provider = self.provider.clone();
        let auth = self.auth.clone();
        let serial = self.serial.clone();
        tokio::spawn(async move {
            match Socket::run(provider, &serial, auth, stream).await {
                Ok(()) => info!("Connection from {} closed", addr),
                Err(e) if e.is_fatal_to_socket() => warn!("Dropped {}: {}", addr, e),
                Err(e) => error!("Connection from {} failed: {}", addr, e),
            }
        });
    }
}
