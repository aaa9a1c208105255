//! Realtime support socket: connection lifecycle, typed inbound events,
//! outbound commands and the handler registry.

pub mod commands;
pub mod connection;
pub mod emitter;
pub mod events;
pub mod registry;

pub use commands::OutboundCommand;
pub use connection::{ConnectionManager, ConnectionState, ConnectionStatus};
pub use emitter::Emitter;
pub use events::{EventKind, InboundEvent};
pub use registry::{EventHandler, EventRegistry, Subscription};
