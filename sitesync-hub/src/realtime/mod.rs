//! Real-time, room-scoped synchronization

pub mod broadcaster;
pub mod registry;
pub mod ws;

pub use broadcaster::{CommandOutcome, RoomBroadcaster};
pub use registry::{ConnectionId, Delivery, Outbound, RoomRegistry};
pub use ws::ws_handler;
