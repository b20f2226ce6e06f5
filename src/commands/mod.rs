use crate::adb::Client;
use crate::cli::OutputType;
use crate::config::Config;
use crate::error::Result;
use crate::output::OutputFormatter;
use async_trait::async_trait;

/// Shared context for all commands
pub struct CommandContext {
    pub client: Client,
    pub config: Config,
    pub output_format: OutputType,
    pub quiet: bool,
}

impl CommandContext {
    pub fn new(client: Client, config: Config) -> Self {
        Self {
            client,
            config,
            output_format: OutputType::Table,
            quiet: false,
        }
    }

    pub fn with_output_format(mut self, format: OutputType) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn formatter(&self) -> OutputFormatter {
        OutputFormatter::new(self.output_format)
    }

    /// Progress bars only make sense for humans reading a table
    pub fn should_show_progress(&self) -> bool {
        !self.quiet && !matches!(self.output_format, OutputType::Json)
    }
}

/// Base trait for all subcommands
#[async_trait]
pub trait SubCommand {
    type Args;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()>;
}

pub mod bridge;
pub mod devices;
pub mod packets;
pub mod pubkey;
pub mod pull;
pub mod push;
pub mod screencap;
pub mod version;
