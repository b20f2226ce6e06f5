use adbridge::adb::{dump, Client};
use adbridge::cli::{Cli, Commands};
use adbridge::commands::bridge::BridgeCommand;
use adbridge::commands::devices::DevicesCommand;
use adbridge::commands::packets::ParsePacketsCommand;
use adbridge::commands::pubkey::{PubkeyConvertCommand, PubkeyFingerprintCommand};
use adbridge::commands::pull::PullCommand;
use adbridge::commands::push::PushCommand;
use adbridge::commands::screencap::ScreencapCommand;
use adbridge::commands::version::VersionCommand;
use adbridge::commands::{CommandContext, SubCommand};
use adbridge::config::Config;
use adbridge::error::Result;
use adbridge::output::OutputFormatter;
use clap::Parser;
use log::debug;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    let format = cli.output;
    if let Err(e) = run(cli).await {
        OutputFormatter::new(format).error(&format!("Error: {}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load();

    let mut options = config.client.clone();
    if let Some(host) = &cli.host {
        options = options.with_host(host.as_str());
    }
    if let Some(port) = cli.port {
        options = options.with_port(port);
    }
    if cli.timeout.is_some() {
        options.timeout_ms = cli.timeout;
    }
    debug!("Using ADB server at {}:{}", options.host, options.port);

    let client = Client::new(options).with_dump(dump::from_env());
    let ctx = CommandContext::new(client, config)
        .with_output_format(cli.output)
        .with_quiet(cli.verbose.is_silent());

    match cli.command() {
        Commands::Version => VersionCommand::new().run(&ctx, ()).await,
        Commands::Devices(args) => DevicesCommand::new().run(&ctx, args).await,
        Commands::PubkeyConvert(args) => PubkeyConvertCommand.run(&ctx, args).await,
        Commands::PubkeyFingerprint(args) => PubkeyFingerprintCommand.run(&ctx, args).await,
        Commands::UsbDeviceToTcp(args) => BridgeCommand.run(&ctx, args).await,
        Commands::ParseTcpPackets(args) => ParsePacketsCommand.run(&ctx, args).await,
        Commands::Push(args) => PushCommand.run(&ctx, args).await,
        Commands::Pull(args) => PullCommand.run(&ctx, args).await,
        Commands::Screencap(args) => ScreencapCommand.run(&ctx, args).await,
    }
}
