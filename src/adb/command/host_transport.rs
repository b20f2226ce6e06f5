//! Commands that run on a connection already switched to one device with
//! [`HostTransportCommand`](crate::adb::command::host::HostTransportCommand).

use crate::adb::command::{escape, read_okay, send_expecting_okay, Command, ShellArg};
use crate::adb::connection::Connection;
use crate::adb::framebuffer::{FramebufferMeta, HEADER_LENGTH};
use crate::error::{AdbError, Result};
use crate::types::Reverse;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref RE_PROPERTY: Regex =
        Regex::new(r"(?m)^\[([\s\S]*?)\]: \[([\s\S]*?)\]\r?$").unwrap();
    static ref RE_ROOT_OK: Regex = Regex::new("restarting adbd as root").unwrap();
    static ref RE_RESTARTING: Regex = Regex::new("restarting in").unwrap();
    static ref RE_BOOT_COMPLETED: Regex = Regex::new("^1$").unwrap();
}

/// `shell:<command>`. The connection carries raw output afterwards.
pub struct ShellCommand {
    command: String,
}

impl ShellCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Join arguments, quoting each one for the device shell.
    pub fn from_args<I, A>(args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<ShellArg>,
    {
        let command = args.into_iter().map(escape).collect::<Vec<_>>().join(" ");
        Self { command }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl Command for ShellCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        send_expecting_okay(connection, &format!("shell:{}", self.command)).await
    }
}

pub fn parse_properties(value: &str) -> HashMap<String, String> {
    RE_PROPERTY
        .captures_iter(value)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

/// `shell:getprop`, every system property.
pub struct GetPropertiesCommand;

#[async_trait]
impl Command for GetPropertiesCommand {
    type Output = HashMap<String, String>;

    async fn execute(self, connection: &mut Connection) -> Result<HashMap<String, String>> {
        send_expecting_okay(connection, "shell:getprop").await?;
        let data = connection.parser().read_all().await?;
        Ok(parse_properties(&String::from_utf8_lossy(&data)))
    }
}

pub struct RebootCommand;

#[async_trait]
impl Command for RebootCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        send_expecting_okay(connection, "reboot:").await?;
        connection.parser().read_all().await?;
        Ok(())
    }
}

pub struct RemountCommand;

#[async_trait]
impl Command for RemountCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        send_expecting_okay(connection, "remount:").await
    }
}

/// Run `request`, then require `expected` somewhere in the full output.
async fn expect_output(connection: &mut Connection, request: &str, expected: &Regex) -> Result<()> {
    send_expecting_okay(connection, request).await?;
    let value = connection.parser().read_all().await?;
    let value = String::from_utf8_lossy(&value);
    if expected.is_match(&value) {
        Ok(())
    } else {
        Err(AdbError::Command(value.trim().to_string()))
    }
}

/// Restart adbd as root.
pub struct RootCommand;

#[async_trait]
impl Command for RootCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        expect_output(connection, "root:", &RE_ROOT_OK).await
    }
}

/// Restart adbd listening on TCP `port`.
pub struct TcpIpCommand {
    pub port: u16,
}

#[async_trait]
impl Command for TcpIpCommand {
    type Output = u16;

    async fn execute(self, connection: &mut Connection) -> Result<u16> {
        expect_output(connection, &format!("tcpip:{}", self.port), &RE_RESTARTING).await?;
        Ok(self.port)
    }
}

/// Restart adbd in USB mode.
pub struct UsbCommand;

#[async_trait]
impl Command for UsbCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        expect_output(connection, "usb:", &RE_RESTARTING).await
    }
}

/// Switch into the sync sub-protocol, see [`crate::adb::sync::Sync`].
pub struct SyncCommand;

#[async_trait]
impl Command for SyncCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        send_expecting_okay(connection, "sync:").await
    }
}

/// Subscribe to debuggable process ids, see [`crate::adb::jdwp::JdwpTracker`].
pub struct TrackJdwpCommand;

#[async_trait]
impl Command for TrackJdwpCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        send_expecting_okay(connection, "track-jdwp").await
    }
}

/// `framebuffer:`, returning the header. Pixel data follows on the connection.
pub struct FramebufferCommand;

#[async_trait]
impl Command for FramebufferCommand {
    type Output = FramebufferMeta;

    async fn execute(self, connection: &mut Connection) -> Result<FramebufferMeta> {
        send_expecting_okay(connection, "framebuffer:").await?;
        let header = connection.parser().read_bytes(HEADER_LENGTH).await?;
        FramebufferMeta::parse(&header)
    }
}

/// `screencap -p` behind an `echo`, returning the first byte of output so the
/// caller can tell how the pty mangled line endings.
pub struct ScreencapCommand;

#[async_trait]
impl Command for ScreencapCommand {
    type Output = u8;

    async fn execute(self, connection: &mut Connection) -> Result<u8> {
        send_expecting_okay(connection, "shell:echo && screencap -p 2>/dev/null").await?;
        match connection.parser().read_bytes(1).await {
            Ok(first) => Ok(first[0]),
            Err(e) if e.is_premature_eof() => Err(AdbError::Command(
                "No support for the screencap command".to_string(),
            )),
            Err(e) => Err(e),
        }
    }
}

/// Connect to a device-local unix socket.
pub struct LocalCommand {
    pub path: String,
}

#[async_trait]
impl Command for LocalCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        let request = if self.path.contains(':') {
            self.path
        } else {
            format!("localfilesystem:{}", self.path)
        };
        send_expecting_okay(connection, &request).await
    }
}

/// Open a binary log buffer such as `main` or `events`.
pub struct LogCommand {
    pub name: String,
}

#[async_trait]
impl Command for LogCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        send_expecting_okay(connection, &format!("log:{}", self.name)).await
    }
}

/// Open a TCP connection from the device.
pub struct TcpCommand {
    pub port: u16,
    pub host: Option<String>,
}

#[async_trait]
impl Command for TcpCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        let request = match &self.host {
            Some(host) => format!("tcp:{}:{}", self.port, host),
            None => format!("tcp:{}", self.port),
        };
        send_expecting_okay(connection, &request).await
    }
}

/// Reverse forward a device socket spec to a host one.
pub struct ReverseCommand {
    pub remote: String,
    pub local: String,
}

#[async_trait]
impl Command for ReverseCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        send_expecting_okay(
            connection,
            &format!("reverse:forward:{};{}", self.remote, self.local),
        )
        .await?;
        read_okay(connection.parser()).await
    }
}

/// Parse `serial remote local` lines.
pub fn parse_reverses(value: &str) -> Vec<Reverse> {
    value
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace().skip(1);
            match (fields.next(), fields.next()) {
                (Some(remote), Some(local)) => Some(Reverse {
                    remote: remote.to_string(),
                    local: local.to_string(),
                }),
                _ => None,
            }
        })
        .collect()
}

pub struct ListReversesCommand;

#[async_trait]
impl Command for ListReversesCommand {
    type Output = Vec<Reverse>;

    async fn execute(self, connection: &mut Connection) -> Result<Vec<Reverse>> {
        send_expecting_okay(connection, "reverse:list-forward").await?;
        let value = connection.parser().read_value().await?;
        Ok(parse_reverses(&String::from_utf8_lossy(&value)))
    }
}

/// Resolves once `sys.boot_completed` reads 1.
pub struct WaitBootCompleteCommand;

#[async_trait]
impl Command for WaitBootCompleteCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        send_expecting_okay(
            connection,
            "shell:while getprop sys.boot_completed 2>/dev/null; do sleep 1; done",
        )
        .await?;
        let found = connection.parser().search_line(&RE_BOOT_COMPLETED).await;
        connection.end().await;
        found.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDevice;

    #[tokio::test]
    async fn test_shell_from_args_escapes() {
        let command = ShellCommand::from_args(["echo", "it's"]);
        assert_eq!(command.command(), r#"'echo' 'it'"'"'s'"#);

        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAYhello\n").await;
        command.execute(&mut conn).await.unwrap();
        assert_eq!(
            device.read_request().await,
            r#"shell:'echo' 'it'"'"'s'"#
        );
    }

    #[tokio::test]
    async fn test_get_properties() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAY").await;
        device
            .reply(
                b"[ro.product.name]: [walleye]\r\n[ro.product.model]: [Pixel 2]\r\n\
                  [multi.line]: [first\nsecond]\n[empty]: []\n",
            )
            .await;
        device.finish().await;

        let props = GetPropertiesCommand.execute(&mut conn).await.unwrap();
        assert_eq!(device.read_request().await, "shell:getprop");
        assert_eq!(props.get("ro.product.name").unwrap(), "walleye");
        assert_eq!(props.get("ro.product.model").unwrap(), "Pixel 2");
        assert_eq!(props.get("multi.line").unwrap(), "first\nsecond");
        assert_eq!(props.get("empty").unwrap(), "");
        assert_eq!(props.len(), 4);
    }

    #[tokio::test]
    async fn test_root() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAYrestarting adbd as root\n").await;
        device.finish().await;
        RootCommand.execute(&mut conn).await.unwrap();
        assert_eq!(device.read_request().await, "root:");
    }

    #[tokio::test]
    async fn test_root_failure_message() {
        let (mut conn, mut device) = MockDevice::pair();
        device
            .reply(b"OKAYadbd cannot run as root in production builds\n")
            .await;
        device.finish().await;
        let err = RootCommand.execute(&mut conn).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "adbd cannot run as root in production builds"
        );
    }

    #[tokio::test]
    async fn test_tcpip() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAYrestarting in TCP mode port: 5555\n").await;
        device.finish().await;
        assert_eq!(
            TcpIpCommand { port: 5555 }.execute(&mut conn).await.unwrap(),
            5555
        );
        assert_eq!(device.read_request().await, "tcpip:5555");
    }

    #[tokio::test]
    async fn test_usb_failure() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAYerror: closed\n").await;
        device.finish().await;
        assert!(UsbCommand.execute(&mut conn).await.is_err());
    }

    #[tokio::test]
    async fn test_reboot_reads_everything() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAYbye").await;
        device.finish().await;
        RebootCommand.execute(&mut conn).await.unwrap();
        assert!(conn.parser().is_ended());
    }

    #[tokio::test]
    async fn test_local_keeps_prefixed_paths() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAYOKAY").await;
        LocalCommand {
            path: "/dev/socket/logd".to_string(),
        }
        .execute(&mut conn)
        .await
        .unwrap();
        LocalCommand {
            path: "localabstract:chrome_devtools_remote".to_string(),
        }
        .execute(&mut conn)
        .await
        .unwrap();
        assert_eq!(
            device.read_request().await,
            "localfilesystem:/dev/socket/logd"
        );
        assert_eq!(
            device.read_request().await,
            "localabstract:chrome_devtools_remote"
        );
    }

    #[tokio::test]
    async fn test_tcp_with_host() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAY").await;
        TcpCommand {
            port: 8080,
            host: Some("127.0.0.1".to_string()),
        }
        .execute(&mut conn)
        .await
        .unwrap();
        assert_eq!(device.read_request().await, "tcp:8080:127.0.0.1");
    }

    #[tokio::test]
    async fn test_list_reverses() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAY").await;
        device
            .reply_value(b"(reverse) localabstract:chrome tcp:9222\n")
            .await;
        let reverses = ListReversesCommand.execute(&mut conn).await.unwrap();
        assert_eq!(
            reverses,
            vec![Reverse {
                remote: "localabstract:chrome".to_string(),
                local: "tcp:9222".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_screencap_first_byte() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAY\r\n\x89PNG").await;
        assert_eq!(ScreencapCommand.execute(&mut conn).await.unwrap(), b'\r');
        assert_eq!(
            device.read_request().await,
            "shell:echo && screencap -p 2>/dev/null"
        );
    }

    #[tokio::test]
    async fn test_screencap_unsupported() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAY").await;
        device.finish().await;
        let err = ScreencapCommand.execute(&mut conn).await.unwrap_err();
        assert_eq!(err.to_string(), "No support for the screencap command");
    }

    #[tokio::test]
    async fn test_wait_boot_complete() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAY\n\n1\n").await;
        device.finish().await;
        WaitBootCompleteCommand.execute(&mut conn).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_boot_complete_closed_early() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAY\n").await;
        device.finish().await;
        assert!(WaitBootCompleteCommand
            .execute(&mut conn)
            .await
            .unwrap_err()
            .is_premature_eof());
    }
}
