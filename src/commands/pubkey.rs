use crate::adb::auth::{parse_public_key, AdbPublicKey};
use crate::commands::{CommandContext, SubCommand};
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyFormat {
    Pem,
    Openssh,
}

#[derive(Debug, Clone, clap::Args)]
pub struct ConvertArgs {
    /// ADB public key file, usually ~/.android/adbkey.pub
    pub file: PathBuf,

    /// Output format
    #[clap(short, long, value_enum, default_value_t = KeyFormat::Pem)]
    pub format: KeyFormat,
}

#[derive(Debug, Clone, clap::Args)]
pub struct FingerprintArgs {
    /// ADB public key file, usually ~/.android/adbkey.pub
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
struct FingerprintOutput<'a> {
    fingerprint: &'a str,
    comment: &'a str,
}

async fn read_key(path: &Path) -> Result<AdbPublicKey> {
    let path = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let text = tokio::fs::read_to_string(&path).await?;
    parse_public_key(&text)
}

pub fn convert(key: &AdbPublicKey, format: KeyFormat) -> Result<String> {
    match format {
        KeyFormat::Pem => key.to_pem(),
        KeyFormat::Openssh => Ok(key.to_openssh()),
    }
}

pub struct PubkeyConvertCommand;

#[async_trait]
impl SubCommand for PubkeyConvertCommand {
    type Args = ConvertArgs;

    async fn run(&self, _ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let key = read_key(&args.file).await?;
        print!("{}", convert(&key, args.format)?);
        if args.format == KeyFormat::Openssh {
            println!();
        }
        Ok(())
    }
}

pub struct PubkeyFingerprintCommand;

#[async_trait]
impl SubCommand for PubkeyFingerprintCommand {
    type Args = FingerprintArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let key = read_key(&args.file).await?;
        ctx.formatter().value(
            &FingerprintOutput {
                fingerprint: key.fingerprint(),
                comment: key.comment(),
            },
            &format!("{} {}", key.fingerprint(), key.comment()),
        )
    }
}
