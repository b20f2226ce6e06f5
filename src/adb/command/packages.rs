//! Package manager (`pm`) commands.

use crate::adb::command::{escape_compat, send_expecting_okay, Command};
use crate::adb::connection::Connection;
use crate::error::{AdbError, Result};
use crate::types::FeatureValue;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref RE_PACKAGE: Regex = Regex::new(r"(?m)^package:(.*?)\r?$").unwrap();
    static ref RE_FEATURE: Regex = Regex::new(r"(?m)^feature:(.*?)(?:=(.*?))?\r?$").unwrap();
    static ref RE_CLEAR: Regex = Regex::new("^(Success|Failed)$").unwrap();
    static ref RE_INSTALL: Regex =
        Regex::new(r"^(Success|Failure \[(.*?)\]|Exception)(.*)$").unwrap();
    static ref RE_UNINSTALL: Regex =
        Regex::new("^(Success|Failure.*|.*Unknown package:.*)$").unwrap();
    static ref RE_BRACKETED: Regex = Regex::new(r"\[(.*?)\]").unwrap();
}

const DEVICE_POLICY_FAILURE: &str = "DELETE_FAILED_DEVICE_POLICY_MANAGER";

pub fn parse_packages(value: &str) -> Vec<String> {
    RE_PACKAGE
        .captures_iter(value)
        .map(|caps| caps[1].to_string())
        .collect()
}

pub fn parse_features(value: &str) -> HashMap<String, FeatureValue> {
    RE_FEATURE
        .captures_iter(value)
        .map(|caps| {
            let feature = match caps.get(2) {
                Some(value) => FeatureValue::Value(value.as_str().to_string()),
                None => FeatureValue::Flag(true),
            };
            (caps[1].to_string(), feature)
        })
        .collect()
}

/// `pm list packages`, optionally with filter flags such as `-3`.
pub struct GetPackagesCommand {
    pub flags: Option<String>,
}

#[async_trait]
impl Command for GetPackagesCommand {
    type Output = Vec<String>;

    async fn execute(self, connection: &mut Connection) -> Result<Vec<String>> {
        let request = match &self.flags {
            Some(flags) => format!("shell:pm list packages {} 2>/dev/null", flags),
            None => "shell:pm list packages 2>/dev/null".to_string(),
        };
        send_expecting_okay(connection, &request).await?;
        let data = connection.parser().read_all().await?;
        Ok(parse_packages(&String::from_utf8_lossy(&data)))
    }
}

pub struct GetFeaturesCommand;

#[async_trait]
impl Command for GetFeaturesCommand {
    type Output = HashMap<String, FeatureValue>;

    async fn execute(self, connection: &mut Connection) -> Result<HashMap<String, FeatureValue>> {
        send_expecting_okay(connection, "shell:pm list features 2>/dev/null").await?;
        let data = connection.parser().read_all().await?;
        Ok(parse_features(&String::from_utf8_lossy(&data)))
    }
}

/// Wipe a package's data.
pub struct ClearCommand {
    pub package: String,
}

#[async_trait]
impl Command for ClearCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        send_expecting_okay(connection, &format!("shell:pm clear {}", self.package)).await?;
        let result = connection.parser().search_line(&RE_CLEAR).await;
        connection.end().await;
        match result?.get(1) {
            Some("Success") => Ok(()),
            _ => Err(AdbError::Command(format!(
                "Package '{}' could not be cleared",
                self.package
            ))),
        }
    }
}

/// Install an APK that is already on the device.
pub struct InstallCommand {
    pub apk: String,
}

#[async_trait]
impl Command for InstallCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        send_expecting_okay(
            connection,
            &format!("shell:pm install -r {}", escape_compat(&self.apk)),
        )
        .await?;

        let parser = connection.parser();
        let result = match parser.search_line(&RE_INSTALL).await {
            Ok(found) => match found.get(1) {
                Some("Success") => Ok(()),
                Some("Exception") => match parser.read_line().await {
                    Ok(line) => Err(AdbError::Install {
                        message: String::from_utf8_lossy(&line).trim().to_string(),
                        code: "INSTALL_EXCEPTION".to_string(),
                    }),
                    Err(e) => Err(e),
                },
                _ => {
                    let code = found.get(2).unwrap_or_default().to_string();
                    Err(AdbError::Install {
                        message: format!("{} could not be installed [{}]", self.apk, code),
                        code,
                    })
                }
            },
            Err(e) => Err(e),
        };
        // Drain the rest so the connection closes by itself
        parser.read_all().await?;
        result
    }
}

pub struct UninstallCommand {
    pub package: String,
}

#[async_trait]
impl Command for UninstallCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        send_expecting_okay(connection, &format!("shell:pm uninstall {}", self.package)).await?;

        let parser = connection.parser();
        let result = match parser.search_line(&RE_UNINSTALL).await {
            Ok(found) if found.line().contains(DEVICE_POLICY_FAILURE) => {
                let reason = RE_BRACKETED
                    .captures(found.line())
                    .and_then(|caps| caps.get(1))
                    .map_or(DEVICE_POLICY_FAILURE, |m| m.as_str())
                    .to_string();
                Err(AdbError::Command(format!(
                    "{} could not be uninstalled [{}]",
                    self.package, reason
                )))
            }
            // Failures other than policy ones still leave the package gone
            Ok(_) => Ok(()),
            Err(e) if e.is_premature_eof() => Ok(()),
            Err(e) => Err(e),
        };
        parser.read_all().await?;
        result
    }
}

pub struct IsInstalledCommand {
    pub package: String,
}

#[async_trait]
impl Command for IsInstalledCommand {
    type Output = bool;

    async fn execute(self, connection: &mut Connection) -> Result<bool> {
        send_expecting_okay(
            connection,
            &format!("shell:pm path {} 2>/dev/null", self.package),
        )
        .await?;
        let parser = connection.parser();
        match parser.read_ascii(8).await {
            Ok(reply) if reply == "package:" => Ok(true),
            Ok(reply) => parser.unexpected(&reply, "'package:'"),
            Err(e) if e.is_premature_eof() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
