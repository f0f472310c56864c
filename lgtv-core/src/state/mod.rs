pub mod connection;
mod device;

pub use connection::ConnectionPhase;
pub use device::{Change, DeviceState};
