use crate::commands::{CommandContext, SubCommand};
use crate::error::Result;
use crate::output::TableFormat;
use crate::tcpusb::{Packet, PacketDecoder};
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

/// Longest payload preview shown per packet.
const PREVIEW_LENGTH: usize = 48;

pub struct ParsePacketsCommand;

#[derive(Debug, Clone, clap::Args)]
pub struct ParsePacketsArgs {
    /// File holding one direction of captured bridge traffic
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct PacketSummary {
    pub command: String,
    pub arg0: u32,
    pub arg1: u32,
    pub length: u32,
    pub data: String,
}

impl From<&Packet> for PacketSummary {
    fn from(packet: &Packet) -> Self {
        let preview = &packet.data[..packet.data.len().min(PREVIEW_LENGTH)];
        Self {
            command: packet
                .type_name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("0x{:08x}", packet.command)),
            arg0: packet.arg0,
            arg1: packet.arg1,
            length: packet.length,
            data: preview.escape_ascii().to_string(),
        }
    }
}

impl TableFormat for PacketSummary {
    fn headers() -> Vec<&'static str> {
        vec!["COMMAND", "ARG0", "ARG1", "LENGTH", "DATA"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.command.clone(),
            self.arg0.to_string(),
            self.arg1.to_string(),
            self.length.to_string(),
            self.data.clone(),
        ]
    }
}

/// Decode every complete packet in `data`. Stops at the first corrupt one.
pub fn parse_packets(data: &[u8]) -> Result<(Vec<Packet>, usize)> {
    let mut decoder = PacketDecoder::new();
    decoder.push(data);
    let mut packets = Vec::new();
    while let Some(packet) = decoder.next_packet()? {
        packets.push(packet);
    }
    Ok((packets, decoder.pending()))
}

#[async_trait]
impl SubCommand for ParsePacketsCommand {
    type Args = ParsePacketsArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let data = tokio::fs::read(&args.file).await?;
        let (packets, pending) = parse_packets(&data)?;
        let summaries: Vec<PacketSummary> = packets.iter().map(PacketSummary::from).collect();
        ctx.formatter().list(&summaries)?;
        if pending > 0 && !ctx.quiet {
            eprintln!("{} trailing bytes do not form a complete packet", pending);
        }
        Ok(())
    }
}
