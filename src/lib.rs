pub mod adb;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod progress;
pub mod tcpusb;
pub mod types;

#[cfg(test)]
pub mod testing;
