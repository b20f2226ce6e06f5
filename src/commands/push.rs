use crate::adb::sync::{TransferEvent, TransferStats, DEFAULT_MODE};
use crate::commands::{CommandContext, SubCommand};
use crate::error::Result;
use crate::progress;
use async_trait::async_trait;
use std::path::PathBuf;

pub struct PushCommand;

#[derive(Debug, Clone, clap::Args)]
pub struct PushArgs {
    /// Device serial
    pub serial: String,

    /// Local file to push
    pub src: PathBuf,

    /// Remote destination path on device
    pub dst: String,

    /// Octal permissions for the remote file
    #[clap(short, long, value_parser = parse_mode)]
    pub mode: Option<u32>,
}

fn parse_mode(value: &str) -> std::result::Result<u32, String> {
    u32::from_str_radix(value, 8).map_err(|e| format!("invalid octal mode '{}': {}", value, e))
}

#[async_trait]
impl SubCommand for PushCommand {
    type Args = PushArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let file = tokio::fs::File::open(&args.src).await?;
        let total = file.metadata().await?.len();
        let name = args
            .src
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let progress = progress::reporter(ctx.should_show_progress(), &name, Some(total));

        let mut transfer = ctx
            .client
            .push(&args.serial, file, &args.dst, args.mode.unwrap_or(DEFAULT_MODE))
            .await?;

        let mut last = TransferStats::default();
        let mut failure = None;
        while let Some(event) = transfer.next_event().await {
            match event {
                TransferEvent::Progress(stats) => {
                    last = stats;
                    progress.transferred(stats);
                }
                TransferEvent::Error(e) => failure = Some(e),
                TransferEvent::End => break,
            }
        }
        if let Some(e) = failure {
            progress.abandon(&e.to_string());
            return Err(e);
        }
        progress.complete(last);

        if !ctx.quiet {
            ctx.formatter()
                .success(&format!("{} -> {}:{}", args.src.display(), args.serial, args.dst));
        }
        Ok(())
    }
}
