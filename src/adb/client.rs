//! High-level entry point: one method per command, each on a fresh connection.

use crate::adb::command::activity::{StartActivityCommand, StartServiceCommand};
use crate::adb::command::host::{
    HostConnectCommand, HostDevicesCommand, HostDevicesWithPathsCommand, HostDisconnectCommand,
    HostKillCommand, HostTrackDevicesCommand, HostTransportCommand, HostVersionCommand,
};
use crate::adb::command::host_serial::{
    AttachCommand, DetachCommand, ForwardCommand, GetDevicePathCommand, GetSerialNoCommand,
    GetStateCommand, ListForwardsCommand, WaitForDeviceCommand,
};
use crate::adb::command::host_transport::{
    FramebufferCommand, GetPropertiesCommand, ListReversesCommand, LocalCommand, LogCommand,
    RebootCommand, RemountCommand, ReverseCommand, RootCommand, ScreencapCommand, ShellCommand,
    SyncCommand, TcpCommand, TcpIpCommand, TrackJdwpCommand, UsbCommand, WaitBootCompleteCommand,
};
use crate::adb::command::packages::{
    ClearCommand, GetFeaturesCommand, GetPackagesCommand, InstallCommand, IsInstalledCommand,
    UninstallCommand,
};
use crate::adb::command::Command;
use crate::adb::connection::{Connection, RawStream};
use crate::adb::dump::{NoDump, WireDump};
use crate::adb::framebuffer::{FramebufferMeta, RgbTransform};
use crate::adb::jdwp::JdwpTracker;
use crate::adb::line_transform::LineTransform;
use crate::adb::sync::{
    Entry, PullTransfer, PushTransfer, Stats, SyncSession, TransferStats, DEFAULT_MODE,
};
use crate::adb::tracker::Tracker;
use crate::config::ClientOptions;
use crate::error::Result;
use crate::tcpusb::Server;
use crate::types::{Device, DeviceWithPath, FeatureValue, Forward, Reverse};
use async_trait::async_trait;
use log::*;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncRead;

/// What the bridge needs from a device backend.
#[async_trait]
pub trait DeviceProvider: Send + Sync {
    /// A connection already switched to the device's transport.
    async fn transport(&self, serial: &str) -> Result<Connection>;

    async fn get_properties(&self, serial: &str) -> Result<HashMap<String, String>>;
}

#[derive(Clone)]
pub struct Client {
    options: ClientOptions,
    dump: Arc<dyn WireDump>,
}

impl Client {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            dump: Arc::new(NoDump),
        }
    }

    pub fn with_dump(mut self, dump: Arc<dyn WireDump>) -> Self {
        self.dump = dump;
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// A fresh connection to the server.
    pub async fn connection(&self) -> Result<Connection> {
        Connection::connect_with_dump(&self.options, self.dump.clone()).await
    }

    /// Run a host command on its own connection.
    pub async fn run<C: Command>(&self, command: C) -> Result<C::Output> {
        let mut connection = self.connection().await?;
        command.execute(&mut connection).await
    }

    /// Run a device command on its own transport.
    pub async fn run_on<C: Command>(&self, serial: &str, command: C) -> Result<C::Output> {
        let mut transport = self.open_transport(serial).await?;
        command.execute(&mut transport).await
    }

    /// Run a command whose output continues on the connection.
    async fn open_on<C: Command<Output = ()>>(&self, serial: &str, command: C) -> Result<Connection> {
        let mut transport = self.open_transport(serial).await?;
        command.execute(&mut transport).await?;
        Ok(transport)
    }

    async fn open_transport(&self, serial: &str) -> Result<Connection> {
        let mut connection = self.connection().await?;
        HostTransportCommand {
            serial: serial.to_string(),
        }
        .execute(&mut connection)
        .await?;
        Ok(connection)
    }

    pub async fn version(&self) -> Result<u32> {
        self.run(HostVersionCommand).await
    }

    pub async fn connect(&self, host: &str, port: u16) -> Result<String> {
        self.run(HostConnectCommand {
            host: host.to_string(),
            port,
        })
        .await
    }

    pub async fn disconnect(&self, host: &str, port: u16) -> Result<String> {
        self.run(HostDisconnectCommand {
            host: host.to_string(),
            port,
        })
        .await
    }

    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        self.run(HostDevicesCommand).await
    }

    pub async fn list_devices_with_paths(&self) -> Result<Vec<DeviceWithPath>> {
        self.run(HostDevicesWithPathsCommand).await
    }

    pub async fn track_devices(&self) -> Result<Tracker> {
        let mut connection = self.connection().await?;
        HostTrackDevicesCommand.execute(&mut connection).await?;
        Ok(Tracker::new(connection))
    }

    pub async fn kill(&self) -> Result<()> {
        self.run(HostKillCommand).await
    }

    pub async fn get_serial_no(&self, serial: &str) -> Result<String> {
        self.run(GetSerialNoCommand {
            serial: serial.to_string(),
        })
        .await
    }

    pub async fn get_device_path(&self, serial: &str) -> Result<String> {
        self.run(GetDevicePathCommand {
            serial: serial.to_string(),
        })
        .await
    }

    pub async fn get_state(&self, serial: &str) -> Result<String> {
        self.run(GetStateCommand {
            serial: serial.to_string(),
        })
        .await
    }

    pub async fn forward(&self, serial: &str, local: &str, remote: &str) -> Result<()> {
        self.run(ForwardCommand {
            serial: serial.to_string(),
            local: local.to_string(),
            remote: remote.to_string(),
        })
        .await
    }

    pub async fn list_forwards(&self, serial: &str) -> Result<Vec<Forward>> {
        self.run(ListForwardsCommand {
            serial: serial.to_string(),
        })
        .await
    }

    pub async fn wait_for_device(&self, serial: &str) -> Result<String> {
        self.run(WaitForDeviceCommand {
            serial: serial.to_string(),
        })
        .await
    }

    pub async fn attach(&self, serial: &str) -> Result<()> {
        self.run(AttachCommand {
            serial: serial.to_string(),
        })
        .await
    }

    pub async fn detach(&self, serial: &str) -> Result<()> {
        self.run(DetachCommand {
            serial: serial.to_string(),
        })
        .await
    }

    /// Run a shell command and return its raw output stream.
    pub async fn shell(&self, serial: &str, command: ShellCommand) -> Result<RawStream> {
        Ok(self.open_on(serial, command).await?.into_raw())
    }

    pub async fn reboot(&self, serial: &str) -> Result<()> {
        self.run_on(serial, RebootCommand).await
    }

    pub async fn remount(&self, serial: &str) -> Result<()> {
        self.run_on(serial, RemountCommand).await
    }

    pub async fn root(&self, serial: &str) -> Result<()> {
        self.run_on(serial, RootCommand).await
    }

    pub async fn tcpip(&self, serial: &str, port: u16) -> Result<u16> {
        self.run_on(serial, TcpIpCommand { port }).await
    }

    pub async fn usb(&self, serial: &str) -> Result<()> {
        self.run_on(serial, UsbCommand).await
    }

    pub async fn wait_boot_complete(&self, serial: &str) -> Result<()> {
        self.run_on(serial, WaitBootCompleteCommand).await
    }

    pub async fn get_packages(&self, serial: &str, flags: Option<&str>) -> Result<Vec<String>> {
        self.run_on(
            serial,
            GetPackagesCommand {
                flags: flags.map(str::to_string),
            },
        )
        .await
    }

    pub async fn get_features(&self, serial: &str) -> Result<HashMap<String, FeatureValue>> {
        self.run_on(serial, GetFeaturesCommand).await
    }

    pub async fn is_installed(&self, serial: &str, package: &str) -> Result<bool> {
        self.run_on(
            serial,
            IsInstalledCommand {
                package: package.to_string(),
            },
        )
        .await
    }

    /// Push a local APK to the staging directory, install it, then remove the copy.
    pub async fn install(&self, serial: &str, apk: &Path) -> Result<()> {
        let name = apk
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app.apk".to_string());
        let staged = SyncSession::temp(&name);
        let mut sync = self.sync(serial).await?;
        let pushed = sync.push_file(apk, &staged, DEFAULT_MODE).await;
        sync.end().await;
        pushed?;

        let installed = self.install_remote(serial, &staged).await;
        let cleanup = ShellCommand::from_args(["rm", "-f", staged.as_str()]);
        if let Err(e) = self.run_on(serial, cleanup).await {
            debug!("Unable to remove {}: {}", staged, e);
        }
        installed
    }

    /// Install an APK already on the device.
    pub async fn install_remote(&self, serial: &str, apk: &str) -> Result<()> {
        self.run_on(
            serial,
            InstallCommand {
                apk: apk.to_string(),
            },
        )
        .await
    }

    pub async fn uninstall(&self, serial: &str, package: &str) -> Result<()> {
        self.run_on(
            serial,
            UninstallCommand {
                package: package.to_string(),
            },
        )
        .await
    }

    pub async fn clear(&self, serial: &str, package: &str) -> Result<()> {
        self.run_on(
            serial,
            ClearCommand {
                package: package.to_string(),
            },
        )
        .await
    }

    pub async fn start_activity(&self, serial: &str, command: StartActivityCommand) -> Result<()> {
        self.run_on(serial, command).await
    }

    pub async fn start_service(&self, serial: &str, command: StartServiceCommand) -> Result<()> {
        self.run_on(serial, command).await
    }

    pub async fn sync(&self, serial: &str) -> Result<SyncSession> {
        Ok(SyncSession::new(self.open_on(serial, SyncCommand).await?))
    }

    pub async fn stat(&self, serial: &str, path: &str) -> Result<Stats> {
        let mut sync = self.sync(serial).await?;
        let stats = sync.stat(path).await;
        sync.end().await;
        stats
    }

    pub async fn readdir(&self, serial: &str, path: &str) -> Result<Vec<Entry>> {
        let mut sync = self.sync(serial).await?;
        let entries = sync.readdir(path).await;
        sync.end().await;
        entries
    }

    pub async fn push<R>(&self, serial: &str, source: R, path: &str, mode: u32) -> Result<PushTransfer>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        Ok(self.sync(serial).await?.push(source, path, mode))
    }

    pub async fn push_file(&self, serial: &str, local: &Path, path: &str) -> Result<TransferStats> {
        let mut sync = self.sync(serial).await?;
        let stats = sync.push_file(local, path, DEFAULT_MODE).await;
        sync.end().await;
        stats
    }

    pub async fn pull(&self, serial: &str, path: &str) -> Result<PullTransfer> {
        Ok(self.sync(serial).await?.pull(path))
    }

    pub async fn track_jdwp(&self, serial: &str) -> Result<JdwpTracker> {
        Ok(JdwpTracker::new(self.open_on(serial, TrackJdwpCommand).await?))
    }

    /// PNG screenshot with pty line endings undone.
    pub async fn screencap(&self, serial: &str) -> Result<LineTransform<RawStream>> {
        let mut transport = self.open_transport(serial).await?;
        let first = ScreencapCommand.execute(&mut transport).await?;
        Ok(LineTransform::auto_detect_from(&[first], transport.into_raw()))
    }

    /// Framebuffer header plus the raw pixel stream after it.
    pub async fn framebuffer(&self, serial: &str) -> Result<(FramebufferMeta, RawStream)> {
        let mut transport = self.open_transport(serial).await?;
        let meta = FramebufferCommand.execute(&mut transport).await?;
        Ok((meta, transport.into_raw()))
    }

    /// Framebuffer pixels repacked as 24-bit RGB. The returned header reports format `rgb`.
    pub async fn framebuffer_rgb(
        &self,
        serial: &str,
    ) -> Result<(FramebufferMeta, RgbTransform<RawStream>)> {
        let (mut meta, raw) = self.framebuffer(serial).await?;
        let pixels = RgbTransform::new(&meta, raw)?;
        meta.format = "rgb".to_string();
        Ok((meta, pixels))
    }

    pub async fn open_local(&self, serial: &str, path: &str) -> Result<RawStream> {
        let command = LocalCommand {
            path: path.to_string(),
        };
        Ok(self.open_on(serial, command).await?.into_raw())
    }

    pub async fn open_log(&self, serial: &str, name: &str) -> Result<RawStream> {
        let command = LogCommand {
            name: name.to_string(),
        };
        Ok(self.open_on(serial, command).await?.into_raw())
    }

    pub async fn open_tcp(&self, serial: &str, port: u16, host: Option<&str>) -> Result<RawStream> {
        let command = TcpCommand {
            port,
            host: host.map(str::to_string),
        };
        Ok(self.open_on(serial, command).await?.into_raw())
    }

    pub async fn reverse(&self, serial: &str, remote: &str, local: &str) -> Result<()> {
        self.run_on(
            serial,
            ReverseCommand {
                remote: remote.to_string(),
                local: local.to_string(),
            },
        )
        .await
    }

    pub async fn list_reverses(&self, serial: &str) -> Result<Vec<Reverse>> {
        self.run_on(serial, ListReversesCommand).await
    }

    /// Bridge server exposing `serial` over TCP.
    pub fn create_tcp_usb_bridge(&self, serial: &str) -> Server {
        Server::new(Arc::new(self.clone()), serial)
    }
}

#[async_trait]
impl DeviceProvider for Client {
    async fn transport(&self, serial: &str) -> Result<Connection> {
        self.open_transport(serial).await
    }

    async fn get_properties(&self, serial: &str) -> Result<HashMap<String, String>> {
        self.run_on(serial, GetPropertiesCommand).await
    }
}
