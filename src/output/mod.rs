//! Rendering of command results as a table, JSON or tab-separated lines.

use crate::cli::OutputType;
use crate::error::Result;
use colored::*;
use comfy_table::presets::NOTHING;
use comfy_table::Table;
use serde::Serialize;

pub mod device;

/// A record that can be shown as one table row.
pub trait TableFormat {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;

    /// Line used by `--output plain`, the row fields joined with tabs.
    fn plain(&self) -> String {
        self.row().join("\t")
    }
}

pub fn render_table<T: TableFormat>(items: &[T]) -> String {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(T::headers());
    for item in items {
        table.add_row(item.row());
    }
    table.to_string()
}

/// Prints results in the format picked with `--output`.
pub struct OutputFormatter {
    format: OutputType,
}

impl OutputFormatter {
    pub fn new(format: OutputType) -> Self {
        Self { format }
    }

    /// A list of records. JSON output is an array even when empty.
    pub fn list<T: TableFormat + Serialize>(&self, items: &[T]) -> Result<()> {
        match self.format {
            OutputType::Json => self.json(items)?,
            OutputType::Plain => {
                for item in items {
                    println!("{}", item.plain());
                }
            }
            OutputType::Table => println!("{}", render_table(items)),
        }
        Ok(())
    }

    /// A single result; `text` is what humans see.
    pub fn value<T: Serialize + ?Sized>(&self, value: &T, text: &str) -> Result<()> {
        match self.format {
            OutputType::Json => self.json(value),
            OutputType::Plain | OutputType::Table => {
                println!("{}", text);
                Ok(())
            }
        }
    }

    fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        println!("{}", colorize_json_keys(&json));
        Ok(())
    }

    pub fn success(&self, msg: &str) {
        if self.format != OutputType::Json {
            println!("{}", msg.bright_green());
        }
    }

    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.bright_red());
    }
}

/// Color the keys of pretty-printed JSON. `colored` drops the escapes when
/// `NO_COLOR` is set.
fn colorize_json_keys(json: &str) -> String {
    json.lines()
        .map(|line| match line.split_once("\": ") {
            Some((key, value)) => {
                let indent = line.len() - line.trim_start().len();
                let key = format!("{}\"", key.trim_start());
                format!("{}{}: {}", " ".repeat(indent), key.cyan(), value)
            }
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
