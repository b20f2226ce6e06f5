use crate::commands::bridge::BridgeArgs;
use crate::commands::devices::DevicesArgs;
use crate::commands::packets::ParsePacketsArgs;
use crate::commands::pubkey::{ConvertArgs, FingerprintArgs};
use crate::commands::pull::PullArgs;
use crate::commands::push::PushArgs;
use crate::commands::screencap::ScreencapArgs;
use clap::{Parser, Subcommand};

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputType {
    Table,
    Json,
    Plain,
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[command(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Option<Commands>,

    /// ADB server hostname, overrides the config file
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// ADB server port, overrides the config file
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Idle read timeout in milliseconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "table")]
    pub output: OutputType,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Gets the ADB server version
    Version,

    /// Lists connected devices
    Devices(DevicesArgs),

    /// Converts an ADB public key to PEM or OpenSSH format
    PubkeyConvert(ConvertArgs),

    /// Prints the fingerprint of an ADB public key
    PubkeyFingerprint(FingerprintArgs),

    /// Exposes a device over TCP so `adb connect` can reach it
    UsbDeviceToTcp(BridgeArgs),

    /// Decodes a capture of bridge traffic into packets
    ParseTcpPackets(ParsePacketsArgs),

    /// Copies a local file to a device
    Push(PushArgs),

    /// Copies a file from a device
    Pull(PullArgs),

    /// Saves a PNG screenshot of a device
    Screencap(ScreencapArgs),
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or(Commands::Devices(DevicesArgs { long: false }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_devices() {
        let cli = Cli::parse_from(["adbridge"]);
        assert!(matches!(cli.command(), Commands::Devices(DevicesArgs { long: false })));
        assert_eq!(cli.output, OutputType::Table);
        assert!(cli.port.is_none());
    }

    #[test]
    fn test_bridge_port_short_flag() {
        let cli = Cli::parse_from(["adbridge", "--port", "5038", "usb-device-to-tcp", "abc", "-p", "7000"]);
        assert_eq!(cli.port, Some(5038));
        match cli.command() {
            Commands::UsbDeviceToTcp(args) => {
                assert_eq!(args.serial, "abc");
                assert_eq!(args.listen_port, Some(7000));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_listen_port_leaves_server_port_alone() {
        let cli = Cli::parse_from(["adbridge", "usb-device-to-tcp", "abc", "-p", "7000"]);
        assert_eq!(cli.port, None);
        match cli.command() {
            Commands::UsbDeviceToTcp(args) => assert_eq!(args.listen_port, Some(7000)),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
