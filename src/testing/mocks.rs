use crate::adb::client::DeviceProvider;
use crate::adb::connection::Connection;
use crate::adb::protocol;
use crate::error::{AdbError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

const MOCK_BUFFER: usize = 1024 * 1024;

/// The device/server end of an in-memory connection.
///
/// Replies can be scripted before the command under test runs; requests
/// written by the client pile up in the buffer until read back.
pub struct MockDevice {
    stream: DuplexStream,
}

impl MockDevice {
    pub fn pair() -> (Connection, MockDevice) {
        let (client, device) = duplex(MOCK_BUFFER);
        (Connection::from_stream(client), MockDevice { stream: device })
    }

    pub async fn reply(&mut self, data: impl AsRef<[u8]>) {
        self.stream.write_all(data.as_ref()).await.unwrap();
    }

    pub async fn reply_value(&mut self, data: impl AsRef<[u8]>) {
        self.stream
            .write_all(&protocol::encode_data(data))
            .await
            .unwrap();
    }

    /// End the stream as seen by the client, keeping our read side open.
    pub async fn finish(&mut self) {
        self.stream.shutdown().await.unwrap();
    }

    /// Read one length prefixed request.
    pub async fn read_request(&mut self) -> String {
        let mut length = [0u8; 4];
        self.stream.read_exact(&mut length).await.unwrap();
        let length = protocol::decode_length(std::str::from_utf8(&length).unwrap()).unwrap();
        let mut request = vec![0u8; length as usize];
        self.stream.read_exact(&mut request).await.unwrap();
        String::from_utf8(request).unwrap()
    }

    pub async fn read_exact(&mut self, count: usize) -> Vec<u8> {
        let mut buf = vec![0u8; count];
        self.stream.read_exact(&mut buf).await.unwrap();
        buf
    }
}

/// Device backend handing out scripted transports.
pub struct MockProvider {
    properties: HashMap<String, String>,
    transports: Mutex<VecDeque<Connection>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            properties: HashMap::new(),
            transports: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    /// Queue a transport; returns the device end driving it.
    pub fn add_transport(&self) -> MockDevice {
        let (conn, device) = MockDevice::pair();
        self.transports.lock().unwrap().push_back(conn);
        device
    }
}

#[async_trait]
impl DeviceProvider for MockProvider {
    async fn transport(&self, serial: &str) -> Result<Connection> {
        self.transports
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AdbError::Fail(format!("device '{}' not found", serial)))
    }

    async fn get_properties(&self, _serial: &str) -> Result<HashMap<String, String>> {
        Ok(self.properties.clone())
    }
}
