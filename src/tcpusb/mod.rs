//! Bridges a device's ADB transport to TCP, speaking the packet protocol
//! adbd itself speaks, including RSA authentication.

pub mod packet;
pub mod packet_reader;
pub mod rolling_counter;
pub mod server;
pub mod service;
pub mod service_map;
pub mod socket;

pub use packet::Packet;
pub use packet_reader::{PacketDecoder, PacketReader};
pub use server::Server;
pub use socket::{AllowAll, AuthPolicy, Socket};
