use crate::commands::{CommandContext, SubCommand};
use crate::error::Result;
use async_trait::async_trait;
use log::*;

pub struct BridgeCommand;

#[derive(Debug, Clone, clap::Args)]
pub struct BridgeArgs {
    /// Serial of the device to expose
    pub serial: String,

    /// Port to listen on, defaults to the configured bridge port
    #[clap(short = 'p', long = "listen-port", id = "listen_port")]
    pub listen_port: Option<u16>,

    /// Address to bind
    #[clap(long, default_value = "0.0.0.0")]
    pub bind: String,
}

#[async_trait]
impl SubCommand for BridgeCommand {
    type Args = BridgeArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let port = args.listen_port.unwrap_or(ctx.config.bridge.port);
        let server = ctx.client.create_tcp_usb_bridge(&args.serial);
        let shutdown = server.shutdown_signal();

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted");
                let _ = shutdown.send(());
            }
        });

        if !ctx.quiet {
            println!(
                "Connect with: adb connect <this host>:{} (Ctrl-C to stop)",
                port
            );
        }
        server.listen((args.bind.as_str(), port)).await
    }
}
