use crate::commands::{CommandContext, SubCommand};
use crate::error::Result;
use crate::adb::sync::TransferStats;
use crate::progress;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const CHUNK_SIZE: usize = 64 * 1024;

pub struct PullCommand;

#[derive(Debug, Clone, clap::Args)]
pub struct PullArgs {
    /// Device serial
    pub serial: String,

    /// Remote file on the device
    pub src: String,

    /// Local destination, defaults to the remote file name
    pub dst: Option<PathBuf>,
}

fn default_destination(remote: &str) -> PathBuf {
    let name = remote.rsplit('/').find(|part| !part.is_empty()).unwrap_or("pulled");
    PathBuf::from(name)
}

#[async_trait]
impl SubCommand for PullCommand {
    type Args = PullArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let dst = args.dst.unwrap_or_else(|| default_destination(&args.src));
        // A size known up front gives a real bar
        let size = ctx.client.stat(&args.serial, &args.src).await.ok().map(|stats| stats.size);
        let progress = progress::reporter(ctx.should_show_progress(), &args.src, size);

        let mut transfer = ctx.client.pull(&args.serial, &args.src).await?;
        let mut file = tokio::fs::File::create(&dst).await?;
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            let count = transfer.read(&mut chunk).await?;
            if count == 0 {
                break;
            }
            file.write_all(&chunk[..count]).await?;
            written += count as u64;
            progress.transferred(TransferStats {
                bytes_transferred: written,
            });
        }
        file.flush().await?;
        let stats = match transfer.wait().await {
            Ok(stats) => stats,
            Err(e) => {
                progress.abandon(&e.to_string());
                return Err(e);
            }
        };
        progress.complete(stats);

        if !ctx.quiet {
            ctx.formatter().success(&format!(
                "{}:{} -> {} ({} bytes)",
                args.serial,
                args.src,
                dst.display(),
                stats.bytes_transferred
            ));
        }
        Ok(())
    }
}
