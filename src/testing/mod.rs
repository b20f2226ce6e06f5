pub mod fixtures;
pub mod mocks;

pub use mocks::{MockDevice, MockProvider};
