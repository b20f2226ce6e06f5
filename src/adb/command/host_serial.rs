//! `host-serial:<serial>:...` commands, answered by the server on behalf of one device.

use crate::adb::command::{read_okay, send_expecting_okay, Command};
use crate::adb::connection::Connection;
use crate::error::Result;
use crate::types::Forward;
use async_trait::async_trait;

async fn read_string_value(connection: &mut Connection) -> Result<String> {
    let value = connection.parser().read_value().await?;
    Ok(String::from_utf8_lossy(&value).into_owned())
}

pub struct GetSerialNoCommand {
    pub serial: String,
}

#[async_trait]
impl Command for GetSerialNoCommand {
    type Output = String;

    async fn execute(self, connection: &mut Connection) -> Result<String> {
        send_expecting_okay(
            connection,
            &format!("host-serial:{}:get-serialno", self.serial),
        )
        .await?;
        read_string_value(connection).await
    }
}

pub struct GetDevicePathCommand {
    pub serial: String,
}

#[async_trait]
impl Command for GetDevicePathCommand {
    type Output = String;

    async fn execute(self, connection: &mut Connection) -> Result<String> {
        send_expecting_okay(connection, &format!("host-serial:{}:get-devpath", self.serial))
            .await?;
        read_string_value(connection).await
    }
}

pub struct GetStateCommand {
    pub serial: String,
}

#[async_trait]
impl Command for GetStateCommand {
    type Output = String;

    async fn execute(self, connection: &mut Connection) -> Result<String> {
        send_expecting_okay(connection, &format!("host-serial:{}:get-state", self.serial))
            .await?;
        read_string_value(connection).await
    }
}

/// Parse `serial local remote` lines.
pub fn parse_forwards(value: &str) -> Vec<Forward> {
    value
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next(), fields.next()) {
                (Some(serial), Some(local), Some(remote)) => Some(Forward {
                    serial: serial.to_string(),
                    local: local.to_string(),
                    remote: remote.to_string(),
                }),
                _ => None,
            }
        })
        .collect()
}

pub struct ListForwardsCommand {
    pub serial: String,
}

#[async_trait]
impl Command for ListForwardsCommand {
    type Output = Vec<Forward>;

    async fn execute(self, connection: &mut Connection) -> Result<Vec<Forward>> {
        send_expecting_okay(
            connection,
            &format!("host-serial:{}:list-forward", self.serial),
        )
        .await?;
        Ok(parse_forwards(&read_string_value(connection).await?))
    }
}

/// Forward a local socket spec, e.g. `tcp:8080`, to a device one.
pub struct ForwardCommand {
    pub serial: String,
    pub local: String,
    pub remote: String,
}

#[async_trait]
impl Command for ForwardCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        send_expecting_okay(
            connection,
            &format!(
                "host-serial:{}:forward:{};{}",
                self.serial, self.local, self.remote
            ),
        )
        .await?;
        // The second status reports whether the forward could be set up
        read_okay(connection.parser()).await
    }
}

/// Block until the device is online.
pub struct WaitForDeviceCommand {
    pub serial: String,
}

#[async_trait]
impl Command for WaitForDeviceCommand {
    type Output = String;

    async fn execute(self, connection: &mut Connection) -> Result<String> {
        send_expecting_okay(
            connection,
            &format!("host-serial:{}:wait-for-any-device", self.serial),
        )
        .await?;
        read_okay(connection.parser()).await?;
        Ok(self.serial)
    }
}

pub struct AttachCommand {
    pub serial: String,
}

#[async_trait]
impl Command for AttachCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        send_expecting_okay(connection, &format!("host-serial:{}:attach", self.serial)).await
    }
}

pub struct DetachCommand {
    pub serial: String,
}

#[async_trait]
impl Command for DetachCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        send_expecting_okay(connection, &format!("host-serial:{}:detach", self.serial)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdbError;
    use crate::testing::MockDevice;

    #[tokio::test]
    async fn test_get_serial_no() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAY").await;
        device.reply_value(b"abc123").await;

        let command = GetSerialNoCommand {
            serial: "emulator-5554".to_string(),
        };
        assert_eq!(command.execute(&mut conn).await.unwrap(), "abc123");
        assert_eq!(
            device.read_request().await,
            "host-serial:emulator-5554:get-serialno"
        );
    }

    #[tokio::test]
    async fn test_get_state() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAY").await;
        device.reply_value(b"device").await;

        let command = GetStateCommand {
            serial: "abc".to_string(),
        };
        assert_eq!(command.execute(&mut conn).await.unwrap(), "device");
    }

    #[tokio::test]
    async fn test_list_forwards() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAY").await;
        device
            .reply_value(b"abc tcp:8080 tcp:80\nabc tcp:9000 localabstract:chrome\n")
            .await;

        let command = ListForwardsCommand {
            serial: "abc".to_string(),
        };
        let forwards = command.execute(&mut conn).await.unwrap();
        assert_eq!(forwards.len(), 2);
        assert_eq!(forwards[1].remote, "localabstract:chrome");
    }

    #[tokio::test]
    async fn test_forward_double_okay() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAYOKAY").await;

        let command = ForwardCommand {
            serial: "abc".to_string(),
            local: "tcp:8080".to_string(),
            remote: "tcp:80".to_string(),
        };
        command.execute(&mut conn).await.unwrap();
        assert_eq!(
            device.read_request().await,
            "host-serial:abc:forward:tcp:8080;tcp:80"
        );
    }

    #[tokio::test]
    async fn test_forward_second_status_fails() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAYFAIL").await;
        device.reply_value(b"cannot bind to socket").await;

        let command = ForwardCommand {
            serial: "abc".to_string(),
            local: "tcp:8080".to_string(),
            remote: "tcp:80".to_string(),
        };
        assert!(matches!(
            command.execute(&mut conn).await,
            Err(AdbError::Fail(_))
        ));
    }

    #[tokio::test]
    async fn test_wait_for_device() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAYOKAY").await;

        let command = WaitForDeviceCommand {
            serial: "abc".to_string(),
        };
        assert_eq!(command.execute(&mut conn).await.unwrap(), "abc");
        assert_eq!(
            device.read_request().await,
            "host-serial:abc:wait-for-any-device"
        );
    }
}
