use crate::commands::{CommandContext, SubCommand};
use crate::error::Result;
use async_trait::async_trait;
use chrono::Local;
use std::path::PathBuf;
use tokio::fs::File;

pub struct ScreencapCommand;

#[derive(Debug, Clone, clap::Args)]
pub struct ScreencapArgs {
    /// Device serial
    pub serial: String,

    /// Where to write the PNG, defaults to a timestamped file name
    #[clap(short = 'f', long = "file")]
    pub file: Option<PathBuf>,
}

fn default_file_name(serial: &str) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    PathBuf::from(format!("screencap-{}-{}.png", serial.replace(':', "_"), stamp))
}

#[async_trait]
impl SubCommand for ScreencapCommand {
    type Args = ScreencapArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let path = args.file.unwrap_or_else(|| default_file_name(&args.serial));
        let mut png = ctx.client.screencap(&args.serial).await?;
        let mut file = File::create(&path).await?;
        let written = tokio::io::copy(&mut png, &mut file).await?;

        if !ctx.quiet {
            ctx.formatter()
                .success(&format!("Saved {} ({} bytes)", path.display(), written));
        }
        Ok(())
    }
}
