//! Commands addressed to the ADB server itself.

use crate::adb::command::{send_expecting_okay, Command};
use crate::adb::connection::{Connection, ConnectionReader};
use crate::adb::parser::Parser;
use crate::adb::protocol::{self, FAIL, OKAY};
use crate::error::{AdbError, Result};
use crate::types::{Device, DeviceWithPath};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RE_CONNECTED: Regex = Regex::new("connected to|already connected").unwrap();
}

/// `host:version`, the server's protocol version.
pub struct HostVersionCommand;

#[async_trait]
impl Command for HostVersionCommand {
    type Output = u32;

    async fn execute(self, connection: &mut Connection) -> Result<u32> {
        connection.send("host:version").await?;
        let parser = connection.parser();
        let reply = parser.read_ascii(4).await?;
        match reply.as_str() {
            OKAY => {
                let value = parser.read_value().await?;
                protocol::decode_length(&String::from_utf8_lossy(&value))
            }
            FAIL => parser.read_error().await,
            // Older servers answer with the bare version
            _ => protocol::decode_length(&reply),
        }
    }
}

pub struct HostConnectCommand {
    pub host: String,
    pub port: u16,
}

#[async_trait]
impl Command for HostConnectCommand {
    /// `host:port` as understood by the server.
    type Output = String;

    async fn execute(self, connection: &mut Connection) -> Result<String> {
        send_expecting_okay(connection, &format!("host:connect:{}:{}", self.host, self.port))
            .await?;
        let value = connection.parser().read_value().await?;
        let value = String::from_utf8_lossy(&value);
        if RE_CONNECTED.is_match(&value) {
            Ok(format!("{}:{}", self.host, self.port))
        } else {
            Err(AdbError::Command(value.into_owned()))
        }
    }
}

pub struct HostDisconnectCommand {
    pub host: String,
    pub port: u16,
}

#[async_trait]
impl Command for HostDisconnectCommand {
    type Output = String;

    async fn execute(self, connection: &mut Connection) -> Result<String> {
        send_expecting_okay(
            connection,
            &format!("host:disconnect:{}:{}", self.host, self.port),
        )
        .await?;
        let value = connection.parser().read_value().await?;
        if value.is_empty() {
            Ok(format!("{}:{}", self.host, self.port))
        } else {
            Err(AdbError::Command(String::from_utf8_lossy(&value).into_owned()))
        }
    }
}

/// Parse `id\tstate` lines.
pub fn parse_devices(value: &str) -> Vec<Device> {
    value
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut fields = line.splitn(2, '\t');
            let id = fields.next().unwrap_or_default();
            let state = fields.next().unwrap_or_default();
            Device::new(id, state.trim())
        })
        .collect()
}

/// Parse `devices-l` lines: id, state, then an optional usb path and
/// `key:value` fields.
pub fn parse_devices_with_paths(value: &str) -> Vec<DeviceWithPath> {
    value
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut fields = line.split_whitespace();
            let mut device = DeviceWithPath {
                id: fields.next().unwrap_or_default().to_string(),
                device_type: fields.next().unwrap_or_default().to_string(),
                ..Default::default()
            };
            for field in fields {
                match field.split_once(':') {
                    Some(("product", v)) => device.product = v.to_string(),
                    Some(("model", v)) => device.model = v.to_string(),
                    Some(("device", v)) => device.device = v.to_string(),
                    Some(("transport_id", v)) => device.transport_id = v.to_string(),
                    _ if device.path.is_empty() => device.path = field.to_string(),
                    _ => {}
                }
            }
            device
        })
        .collect()
}

/// Read one device list value, as sent once by `host:devices` and repeatedly
/// by `host:track-devices`.
pub async fn read_devices(parser: &mut Parser<ConnectionReader>) -> Result<Vec<Device>> {
    let value = parser.read_value().await?;
    Ok(parse_devices(&String::from_utf8_lossy(&value)))
}

pub struct HostDevicesCommand;

#[async_trait]
impl Command for HostDevicesCommand {
    type Output = Vec<Device>;

    async fn execute(self, connection: &mut Connection) -> Result<Vec<Device>> {
        send_expecting_okay(connection, "host:devices").await?;
        read_devices(connection.parser()).await
    }
}

pub struct HostDevicesWithPathsCommand;

#[async_trait]
impl Command for HostDevicesWithPathsCommand {
    type Output = Vec<DeviceWithPath>;

    async fn execute(self, connection: &mut Connection) -> Result<Vec<DeviceWithPath>> {
        send_expecting_okay(connection, "host:devices-l").await?;
        let value = connection.parser().read_value().await?;
        Ok(parse_devices_with_paths(&String::from_utf8_lossy(&value)))
    }
}

/// Subscribe to device list changes. The connection then carries one device
/// list value per change, see [`crate::adb::tracker::Tracker`].
pub struct HostTrackDevicesCommand;

#[async_trait]
impl Command for HostTrackDevicesCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        send_expecting_okay(connection, "host:track-devices").await
    }
}

pub struct HostKillCommand;

#[async_trait]
impl Command for HostKillCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        send_expecting_okay(connection, "host:kill").await
    }
}

/// Switch the connection over to one device.
pub struct HostTransportCommand {
    pub serial: String,
}

#[async_trait]
impl Command for HostTransportCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        send_expecting_okay(connection, &format!("host:transport:{}", self.serial)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDevice;

    #[tokio::test]
    async fn test_version() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAY").await;
        device.reply_value(b"0001").await;
        device.finish().await;

        assert_eq!(HostVersionCommand.execute(&mut conn).await.unwrap(), 1);
        assert_eq!(device.read_request().await, "host:version");
    }

    #[tokio::test]
    async fn test_version_without_envelope() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"0029").await;
        assert_eq!(HostVersionCommand.execute(&mut conn).await.unwrap(), 0x29);
    }

    #[tokio::test]
    async fn test_connect() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAY").await;
        device.reply_value(b"connected to 192.168.2.2:5555").await;

        let command = HostConnectCommand {
            host: "192.168.2.2".to_string(),
            port: 5555,
        };
        assert_eq!(command.execute(&mut conn).await.unwrap(), "192.168.2.2:5555");
        assert_eq!(device.read_request().await, "host:connect:192.168.2.2:5555");
    }

    #[tokio::test]
    async fn test_connect_already_connected() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAY").await;
        device.reply_value(b"already connected to 192.168.2.2:5555").await;

        let command = HostConnectCommand {
            host: "192.168.2.2".to_string(),
            port: 5555,
        };
        assert!(command.execute(&mut conn).await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_failure_keeps_message() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAY").await;
        device
            .reply_value(b"unable to connect to 192.168.2.2:5555")
            .await;

        let command = HostConnectCommand {
            host: "192.168.2.2".to_string(),
            port: 5555,
        };
        let err = command.execute(&mut conn).await.unwrap_err();
        assert_eq!(err.to_string(), "unable to connect to 192.168.2.2:5555");
    }

    #[tokio::test]
    async fn test_disconnect() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAY").await;
        device.reply_value(b"").await;

        let command = HostDisconnectCommand {
            host: "192.168.2.2".to_string(),
            port: 5555,
        };
        assert_eq!(command.execute(&mut conn).await.unwrap(), "192.168.2.2:5555");
        assert_eq!(
            device.read_request().await,
            "host:disconnect:192.168.2.2:5555"
        );
    }

    #[tokio::test]
    async fn test_disconnect_failure() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAY").await;
        device.reply_value(b"No such device 192.168.2.2:5555").await;

        let command = HostDisconnectCommand {
            host: "192.168.2.2".to_string(),
            port: 5555,
        };
        assert!(command.execute(&mut conn).await.is_err());
    }

    #[tokio::test]
    async fn test_devices() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAY").await;
        device
            .reply_value(b"emulator-5554\tdevice\n\nHT4CLJT00123\toffline\n")
            .await;

        let devices = HostDevicesCommand.execute(&mut conn).await.unwrap();
        assert_eq!(
            devices,
            vec![
                Device::new("emulator-5554", "device"),
                Device::new("HT4CLJT00123", "offline"),
            ]
        );
        assert_eq!(device.read_request().await, "host:devices");
    }

    #[tokio::test]
    async fn test_devices_fail() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"FAIL").await;
        device.reply_value(b"server is busy").await;

        match HostDevicesCommand.execute(&mut conn).await {
            Err(AdbError::Fail(message)) => assert_eq!(message, "server is busy"),
            other => panic!("expected fail, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_devices_with_paths() {
        let devices = parse_devices_with_paths(
            "emulator-5554          device product:sdk_gphone64 model:sdk_gphone64 device:emu64 transport_id:1\n\
             0123456789ABCDEF       device usb:1-1 product:walleye model:Pixel_2 device:walleye transport_id:2\n\n",
        );
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id, "emulator-5554");
        assert_eq!(devices[0].device_type, "device");
        assert_eq!(devices[0].path, "");
        assert_eq!(devices[0].model, "sdk_gphone64");
        assert_eq!(devices[0].device, "emu64");
        assert_eq!(devices[0].transport_id, "1");
        assert_eq!(devices[1].path, "usb:1-1");
        assert_eq!(devices[1].product, "walleye");
        assert_eq!(devices[1].transport_id, "2");
    }

    #[tokio::test]
    async fn test_transport() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAY").await;

        let command = HostTransportCommand {
            serial: "abc123".to_string(),
        };
        command.execute(&mut conn).await.unwrap();
        assert_eq!(device.read_request().await, "host:transport:abc123");
    }
}
