//! # lgtv-core
//!
//! Control library for LG TVs speaking the serial command protocol over a
//! raw TCP link (a serial-to-Ethernet adapter or the TV's own port).
//!
//! This crate contains:
//! - **Catalog**: the command table mapping names to wire codes and value labels
//! - **Frames and codec**: `CommandFrame`/`StatusFrame` and `LgtvCodec` for framed TCP I/O
//! - **Network**: `Connection`, one TCP link with reader/writer tasks
//! - **Dispatcher**: frame to state translation and user writes to frames
//! - **Session**: connection lifecycle with polling, status burst and reconnect
//! - **Store**: the `StateStore` trait and an in-memory implementation
//! - **Error**: `LgtvError`, a `thiserror`-based error type

pub mod burst;
pub mod catalog;
pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod inhibit;
pub mod network;
pub mod poller;
pub mod reconnect;
pub mod session;
pub mod state;
pub mod store;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use catalog::{Catalog, CommandSpec, RemoteKeySpec, ValueKind, ValueSpec};
pub use codec::LgtvCodec;
pub use dispatcher::{Dispatcher, Effect, Outbound};
pub use error::LgtvError;
pub use frame::{CommandFrame, FRAME_LEN, StatusFrame};
pub use inhibit::{Hold, Inhibition};
pub use network::{Connection, ConnectionInfo, LinkEvent};
pub use reconnect::{Disconnect, ReconnectPolicy};
pub use session::{CONNECTION_KEY, Session, SessionSettings};
pub use state::{ConnectionPhase, DeviceState};
pub use store::{MemoryStore, ObjectMeta, Role, StateChange, StateStore, StateValue, ValueType};
