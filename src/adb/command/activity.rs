//! Activity manager (`am`) commands and the intent arguments they share.

use crate::adb::command::{escape, send_expecting_okay, Command, ShellArg};
use crate::adb::connection::Connection;
use crate::error::{AdbError, Result};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RE_ERROR: Regex = Regex::new("^Error: (.*)$").unwrap();
}

/// Type of an intent extra, selecting the `--e<flag>` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraKind {
    String,
    Null,
    Bool,
    Int,
    Long,
    Float,
    Uri,
    Component,
}

impl ExtraKind {
    fn flag(self) -> &'static str {
        match self {
            ExtraKind::String => "s",
            ExtraKind::Null => "sn",
            ExtraKind::Bool => "z",
            ExtraKind::Int => "i",
            ExtraKind::Long => "l",
            ExtraKind::Float => "f",
            ExtraKind::Uri => "u",
            ExtraKind::Component => "cn",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtraData {
    None,
    One(ShellArg),
    Many(Vec<ShellArg>),
}

/// One typed intent extra.
#[derive(Debug, Clone, PartialEq)]
pub struct Extra {
    pub key: String,
    pub kind: ExtraKind,
    pub data: ExtraData,
}

impl Extra {
    pub fn new(kind: ExtraKind, key: impl Into<String>, value: impl Into<ShellArg>) -> Self {
        Self {
            key: key.into(),
            kind,
            data: ExtraData::One(value.into()),
        }
    }

    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(ExtraKind::String, key, value.into())
    }

    pub fn null(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: ExtraKind::Null,
            data: ExtraData::None,
        }
    }

    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Self::new(ExtraKind::Bool, key, value.to_string())
    }

    pub fn int(key: impl Into<String>, value: i64) -> Self {
        Self::new(ExtraKind::Int, key, value)
    }

    pub fn long(key: impl Into<String>, value: i64) -> Self {
        Self::new(ExtraKind::Long, key, value)
    }

    pub fn float(key: impl Into<String>, value: f64) -> Self {
        Self::new(ExtraKind::Float, key, value.to_string())
    }

    pub fn uri(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(ExtraKind::Uri, key, value.into())
    }

    pub fn component(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(ExtraKind::Component, key, value.into())
    }

    /// An array extra, sent as `--e<flag>a key 'v1,v2'`.
    pub fn array<I, V>(kind: ExtraKind, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ShellArg>,
    {
        Self {
            key: key.into(),
            kind,
            data: ExtraData::Many(values.into_iter().map(Into::into).collect()),
        }
    }

    /// Expand the shorthand `key => value` form into a typed extra.
    ///
    /// Strings, booleans and integers map onto their natural kind and a
    /// missing value onto a null extra. Arrays carry no element type in
    /// shorthand, so they are refused.
    pub fn from_short(key: impl Into<String>, value: ShortExtra) -> Result<Self> {
        let key = key.into();
        match value {
            ShortExtra::Null => Ok(Self::null(key)),
            ShortExtra::Text(text) => Ok(Self::string(key, text)),
            ShortExtra::Bool(flag) => Ok(Self::bool(key, flag)),
            ShortExtra::Number(n) => Ok(Self::int(key, n)),
            ShortExtra::Array(_) => Err(AdbError::Command(format!(
                "Refusing to format array value '{}' using short syntax; empty array would cause unpredictable results due to unknown type. Please use long syntax instead.",
                key
            ))),
            ShortExtra::Typed(mut extra) => {
                extra.key = key;
                Ok(extra)
            }
        }
    }

    fn args(&self) -> Vec<String> {
        let flag = self.kind.flag();
        match (&self.data, self.kind) {
            (_, ExtraKind::Null) | (ExtraData::None, _) => {
                vec![format!("--e{}", flag), escape(&self.key)]
            }
            (ExtraData::One(value), _) => {
                vec![format!("--e{}", flag), escape(&self.key), escape(value.clone())]
            }
            (ExtraData::Many(values), _) => {
                let joined = values
                    .iter()
                    .map(|value| match value {
                        ShellArg::Text(text) => text.clone(),
                        ShellArg::Number(n) => n.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                vec![format!("--e{}a", flag), escape(&self.key), escape(joined)]
            }
        }
    }
}

/// Shorthand extra value, converted with [`Extra::from_short`].
#[derive(Debug, Clone, PartialEq)]
pub enum ShortExtra {
    Null,
    Text(String),
    Bool(bool),
    Number(i64),
    Array(Vec<ShellArg>),
    Typed(Extra),
}

/// The intent part shared by `am start` and `am startservice`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Intent {
    pub action: Option<String>,
    pub data: Option<String>,
    pub mime_type: Option<String>,
    pub categories: Vec<String>,
    pub component: Option<String>,
    pub flags: Option<u32>,
    pub extras: Vec<Extra>,
}

impl Intent {
    pub fn component(component: impl Into<String>) -> Self {
        Self {
            component: Some(component.into()),
            ..Default::default()
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_extra(mut self, extra: Extra) -> Self {
        self.extras.push(extra);
        self
    }

    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = self.extras.iter().flat_map(Extra::args).collect();
        let mut option = |name: &str, value: &Option<String>| {
            if let Some(value) = value {
                args.push(name.to_string());
                args.push(escape(value));
            }
        };
        option("-a", &self.action);
        option("-d", &self.data);
        option("-t", &self.mime_type);
        for category in &self.categories {
            args.push("-c".to_string());
            args.push(escape(category));
        }
        if let Some(component) = &self.component {
            args.push("-n".to_string());
            args.push(escape(component));
        }
        if let Some(flags) = self.flags {
            args.push("-f".to_string());
            args.push(escape(flags));
        }
        args
    }
}

/// Send an `am` request and scan its output for an error line.
async fn run_am(connection: &mut Connection, command: &str, args: Vec<String>) -> Result<()> {
    send_expecting_okay(
        connection,
        &format!("shell:am {} {}", command, args.join(" ")),
    )
    .await?;
    let result = connection.parser().search_line(&RE_ERROR).await;
    connection.end().await;
    match result {
        Ok(found) => Err(AdbError::Command(
            found.get(1).unwrap_or_default().to_string(),
        )),
        Err(e) if e.is_premature_eof() => Ok(()),
        Err(e) => Err(e),
    }
}

#[derive(Debug, Clone, Default)]
pub struct StartActivityCommand {
    pub intent: Intent,
    /// Enable debugging (`-D`).
    pub debug: bool,
    /// Wait for launch to complete (`-W`).
    pub wait: bool,
    pub user: Option<u32>,
}

#[async_trait]
impl Command for StartActivityCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        let mut args = self.intent.args();
        if self.debug {
            args.push("-D".to_string());
        }
        if self.wait {
            args.push("-W".to_string());
        }
        if let Some(user) = self.user {
            args.push("--user".to_string());
            args.push(escape(user));
        }
        run_am(connection, "start", args).await
    }
}

#[derive(Debug, Clone, Default)]
pub struct StartServiceCommand {
    pub intent: Intent,
    pub user: Option<u32>,
}

#[async_trait]
impl Command for StartServiceCommand {
    type Output = ();

    async fn execute(self, connection: &mut Connection) -> Result<()> {
        let mut args = self.intent.args();
        if let Some(user) = self.user {
            args.push("--user".to_string());
            args.push(escape(user));
        }
        run_am(connection, "startservice", args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDevice;

    const MAIN: &str = "com.dummy.component/.Main";

    async fn start(command: StartActivityCommand) -> (Result<()>, String) {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAY").await;
        device.finish().await;
        let result = command.execute(&mut conn).await;
        (result, device.read_request().await)
    }

    #[tokio::test]
    async fn test_start_with_component() {
        let (result, request) = start(StartActivityCommand {
            intent: Intent::component(MAIN),
            ..Default::default()
        })
        .await;
        result.unwrap();
        assert_eq!(request, "shell:am start -n 'com.dummy.component/.Main'");
    }

    #[tokio::test]
    async fn test_start_with_full_intent() {
        let intent = Intent {
            action: Some("android.intent.action.VIEW".to_string()),
            data: Some("foo://bar".to_string()),
            mime_type: Some("text/plain".to_string()),
            categories: vec!["a.b".to_string(), "c.d".to_string()],
            component: Some(MAIN.to_string()),
            flags: Some(0x10210000),
            extras: Vec::new(),
        };
        let (result, request) = start(StartActivityCommand {
            intent,
            debug: true,
            wait: true,
            user: Some(0),
        })
        .await;
        result.unwrap();
        assert_eq!(
            request,
            format!(
                "shell:am start -a 'android.intent.action.VIEW' -d 'foo://bar' -t 'text/plain' -c 'a.b' -c 'c.d' -n '{}' -f {} -D -W --user 0",
                MAIN, 0x10210000
            )
        );
    }

    #[tokio::test]
    async fn test_start_with_typed_extras() {
        let intent = Intent::component(MAIN)
            .with_extra(Extra::bool("key1", true))
            .with_extra(Extra::string("key2", "somestr"))
            .with_extra(Extra::int("key4", 3))
            .with_extra(Extra::long("key5", 4))
            .with_extra(Extra::uri("key6", "http://example.org"))
            .with_extra(Extra::null("key7"));
        let (result, request) = start(StartActivityCommand {
            intent,
            ..Default::default()
        })
        .await;
        result.unwrap();
        assert_eq!(
            request,
            "shell:am start --ez 'key1' 'true' --es 'key2' 'somestr' --ei 'key4' 3 --el 'key5' 4 --eu 'key6' 'http://example.org' --esn 'key7' -n 'com.dummy.component/.Main'"
        );
    }

    #[test]
    fn test_array_extras() {
        let intent = Intent::default()
            .with_extra(Extra::array(ExtraKind::Int, "key1", [2, 3]))
            .with_extra(Extra::array(ExtraKind::Long, "key2", [20, 30]))
            .with_extra(Extra::int("key3", 5));
        assert_eq!(
            intent.args().join(" "),
            "--eia 'key1' '2,3' --ela 'key2' '20,30' --ei 'key3' 5"
        );
    }

    #[test]
    fn test_float_extra_uses_float_flag() {
        let intent = Intent::default().with_extra(Extra::float("ratio", 1.5));
        assert_eq!(intent.args().join(" "), "--ef 'ratio' '1.5'");
    }

    #[test]
    fn test_short_extras_match_long_form() {
        let short = vec![
            Extra::from_short("key1", ShortExtra::Bool(true)).unwrap(),
            Extra::from_short("key2", ShortExtra::Text("somestr".into())).unwrap(),
            Extra::from_short("key3", ShortExtra::Number(3)).unwrap(),
            Extra::from_short("key4", ShortExtra::Null).unwrap(),
            Extra::from_short(
                "key5",
                ShortExtra::Typed(Extra::uri("ignored", "http://example.org")),
            )
            .unwrap(),
        ];
        let long = vec![
            Extra::bool("key1", true),
            Extra::string("key2", "somestr"),
            Extra::int("key3", 3),
            Extra::null("key4"),
            Extra::uri("key5", "http://example.org"),
        ];
        assert_eq!(short, long);
    }

    #[test]
    fn test_short_array_is_refused() {
        let err = Extra::from_short("key1", ShortExtra::Array(vec![ShellArg::Number(1)])).unwrap_err();
        assert!(err.to_string().contains("Refusing to format array value 'key1'"));
    }

    #[tokio::test]
    async fn test_start_reports_error_line() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAY").await;
        device
            .reply(b"Starting: Intent { cmp=foo/.Bar }\nError: Activity class {foo/.Bar} does not exist.\n")
            .await;
        device.finish().await;

        let err = StartActivityCommand {
            intent: Intent::component("foo/.Bar"),
            ..Default::default()
        }
        .execute(&mut conn)
        .await
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Activity class {foo/.Bar} does not exist."
        );
    }

    #[tokio::test]
    async fn test_start_service() {
        let (mut conn, mut device) = MockDevice::pair();
        device.reply(b"OKAY").await;
        device.finish().await;

        StartServiceCommand {
            intent: Intent::component(MAIN),
            user: Some(10),
        }
        .execute(&mut conn)
        .await
        .unwrap();
        assert_eq!(
            device.read_request().await,
            "shell:am startservice -n 'com.dummy.component/.Main' --user 10"
        );
    }
}
