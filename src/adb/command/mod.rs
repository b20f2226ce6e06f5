//! Request/reply commands spoken over a [`Connection`].
//!
//! Each command is a small value type. `execute` sends exactly one request
//! line, checks the `OKAY`/`FAIL` envelope and then reads whatever the
//! command defines after it. Commands that hand the stream over (shell,
//! sync, trackers) return once the envelope is accepted, leaving the
//! connection positioned at the start of the payload.

pub mod activity;
pub mod host;
pub mod host_serial;
pub mod host_transport;
pub mod packages;

use crate::adb::connection::Connection;
use crate::adb::parser::Parser;
use crate::adb::protocol::{FAIL, OKAY};
use crate::error::Result;
use async_trait::async_trait;
use tokio::io::AsyncRead;

#[async_trait]
pub trait Command: Send {
    type Output: Send;

    async fn execute(self, connection: &mut Connection) -> Result<Self::Output>;
}

/// Read a 4 byte status and map `FAIL` and anything unknown to errors.
pub async fn read_okay<R: AsyncRead + Unpin>(parser: &mut Parser<R>) -> Result<()> {
    let reply = parser.read_ascii(4).await?;
    match reply.as_str() {
        OKAY => Ok(()),
        FAIL => parser.read_error().await,
        _ => parser.unexpected(&reply, "OKAY or FAIL"),
    }
}

/// Send `request` and wait for its `OKAY`.
pub async fn send_expecting_okay(connection: &mut Connection, request: &str) -> Result<()> {
    connection.send(request).await?;
    read_okay(connection.parser()).await
}

/// An argument embedded in a device shell command line.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellArg {
    Text(String),
    Number(i64),
}

impl From<&str> for ShellArg {
    fn from(value: &str) -> Self {
        ShellArg::Text(value.to_string())
    }
}

impl From<String> for ShellArg {
    fn from(value: String) -> Self {
        ShellArg::Text(value)
    }
}

impl From<&String> for ShellArg {
    fn from(value: &String) -> Self {
        ShellArg::Text(value.clone())
    }
}

impl From<i64> for ShellArg {
    fn from(value: i64) -> Self {
        ShellArg::Number(value)
    }
}

impl From<i32> for ShellArg {
    fn from(value: i32) -> Self {
        ShellArg::Number(value.into())
    }
}

impl From<u32> for ShellArg {
    fn from(value: u32) -> Self {
        ShellArg::Number(value.into())
    }
}

impl From<u16> for ShellArg {
    fn from(value: u16) -> Self {
        ShellArg::Number(value.into())
    }
}

/// Single-quote `arg` for a POSIX shell. Numbers pass through.
pub fn escape(arg: impl Into<ShellArg>) -> String {
    match arg.into() {
        ShellArg::Number(n) => n.to_string(),
        ShellArg::Text(text) => format!("'{}'", text.replace('\'', r#"'"'"'"#)),
    }
}

/// Double-quote `arg`, backslash escaping `$`, `` ` ``, `\`, `!` and `"`.
pub fn escape_compat(arg: impl Into<ShellArg>) -> String {
    match arg.into() {
        ShellArg::Number(n) => n.to_string(),
        ShellArg::Text(text) => {
            let mut escaped = String::with_capacity(text.len() + 2);
            escaped.push('"');
            for c in text.chars() {
                if matches!(c, '$' | '`' | '\\' | '!' | '"') {
                    escaped.push('\\');
                }
                escaped.push(c);
            }
            escaped.push('"');
            escaped
        }
    }
}
