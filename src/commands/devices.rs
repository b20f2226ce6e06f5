use crate::commands::{CommandContext, SubCommand};
use crate::error::Result;
use async_trait::async_trait;

pub struct DevicesCommand;

#[derive(Debug, Clone, clap::Args)]
pub struct DevicesArgs {
    /// Include device paths and product details
    #[clap(short, long)]
    pub long: bool,
}

impl DevicesCommand {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SubCommand for DevicesCommand {
    type Args = DevicesArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        if args.long {
            let devices = ctx.client.list_devices_with_paths().await?;
            return ctx.formatter().list(&devices);
        }
        let devices = ctx.client.list_devices().await?;
        ctx.formatter().list(&devices)
    }
}
