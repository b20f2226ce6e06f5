//! ADB server client: wire codec, parser, connections and the command set.

pub mod auth;
pub mod client;
pub mod command;
pub mod connection;
pub mod dump;
pub(crate) mod events;
pub mod framebuffer;
pub mod jdwp;
pub mod line_transform;
pub mod parser;
pub mod protocol;
pub mod server;
pub mod sync;
pub mod tracker;


pub use client::{Client, DeviceProvider};
pub use connection::Connection;
pub use parser::Parser;
