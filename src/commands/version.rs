use crate::commands::{CommandContext, SubCommand};
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;

pub struct VersionCommand;

#[derive(Debug, Serialize)]
struct VersionOutput {
    version: u32,
}

impl VersionCommand {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SubCommand for VersionCommand {
    type Args = ();

    async fn run(&self, ctx: &CommandContext, _args: ()) -> Result<()> {
        let version = ctx.client.version().await?;
        ctx.formatter().value(
            &VersionOutput { version },
            &format!("Server Version: {}", version),
        )
    }
}
