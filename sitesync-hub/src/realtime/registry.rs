//! Room registry
//!
//! Maps a site identifier to the set of live connections subscribed to it. Rooms are
//! created on first join and never removed; empty rooms are harmless. There is no check
//! that a room key names an existing site.
//!
//! Lock discipline: when both locks are held, `rooms` is taken first. Only `join` holds
//! both; every other method takes one at a time.

use sitesync_common::events::ServerEvent;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// Outbound queue of one connection; the transport drains it into the socket
pub type Outbound = mpsc::Sender<Arc<ServerEvent>>;

/// Outcome of delivering one event to a set of connections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Events queued for sending
    pub delivered: usize,
    /// Connections whose queue was full; the event was dropped for them
    pub lagged: usize,
    /// Connections whose queue was closed; they were disconnected
    pub closed: usize,
}

/// A registered connection's queue and whether it carries a resolved identity
#[derive(Debug, Clone)]
struct Registration {
    outbound: Outbound,
    authenticated: bool,
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    connections: RwLock<HashMap<ConnectionId, Registration>>,
    rooms: RwLock<HashMap<String, HashSet<ConnectionId>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an authenticated connection and its outbound queue
    pub async fn register(&self, connection: ConnectionId, outbound: Outbound) {
        self.insert(connection, outbound, true).await;
    }

    /// Register a connection without an identity
    ///
    /// It only ever receives events addressed to it directly (rejection notices); it is
    /// skipped by [`deliver_to_all`](Self::deliver_to_all).
    pub async fn register_anonymous(&self, connection: ConnectionId, outbound: Outbound) {
        self.insert(connection, outbound, false).await;
    }

    async fn insert(&self, connection: ConnectionId, outbound: Outbound, authenticated: bool) {
        self.connections.write().await.insert(
            connection,
            Registration {
                outbound,
                authenticated,
            },
        );
        debug!(%connection, authenticated, "Connection registered");
    }

    /// Add a connection to a room
    ///
    /// Returns `false` if it was already a member or is no longer registered. The
    /// registration check happens under the `rooms` lock, so a join racing a
    /// `disconnect` either lands before the sweep or not at all.
    pub async fn join(&self, connection: ConnectionId, site_id: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        if !self.connections.read().await.contains_key(&connection) {
            debug!(%connection, site_id, "Join ignored: connection not registered");
            return false;
        }
        let joined = rooms
            .entry(site_id.to_string())
            .or_default()
            .insert(connection);
        debug!(%connection, site_id, joined, "Room join");
        joined
    }

    /// Remove a connection from a room. Returns `false` if it was not a member.
    pub async fn leave(&self, connection: ConnectionId, site_id: &str) -> bool {
        let left = self
            .rooms
            .write()
            .await
            .get_mut(site_id)
            .map(|members| members.remove(&connection))
            .unwrap_or(false);
        debug!(%connection, site_id, left, "Room leave");
        left
    }

    /// Current members of a room, unordered
    pub async fn members_of(&self, site_id: &str) -> HashSet<ConnectionId> {
        self.rooms
            .read()
            .await
            .get(site_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Rooms a connection currently belongs to
    #[cfg(test)]
    pub async fn rooms_of(&self, connection: ConnectionId) -> Vec<String> {
        self.rooms
            .read()
            .await
            .iter()
            .filter(|(_, members)| members.contains(&connection))
            .map(|(site_id, _)| site_id.clone())
            .collect()
    }

    /// Forget a connection entirely: its outbound queue and every room membership
    ///
    /// Sweeps all rooms rather than trusting any per-connection bookkeeping, so a
    /// transport that died mid-join cannot leave stale membership behind. Returns the
    /// number of rooms the connection was removed from.
    pub async fn disconnect(&self, connection: ConnectionId) -> usize {
        self.connections.write().await.remove(&connection);

        let mut removed = 0;
        for members in self.rooms.write().await.values_mut() {
            if members.remove(&connection) {
                removed += 1;
            }
        }
        debug!(%connection, rooms = removed, "Connection disconnected");
        removed
    }

    #[cfg(test)]
    pub async fn is_connected(&self, connection: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&connection)
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Deliver an event to every member of a room
    pub async fn deliver_to_room(&self, site_id: &str, event: Arc<ServerEvent>) -> Delivery {
        let members: Vec<ConnectionId> = self.members_of(site_id).await.into_iter().collect();
        self.deliver(&members, event).await
    }

    /// Deliver an event to every live authenticated connection
    pub async fn deliver_to_all(&self, event: Arc<ServerEvent>) -> Delivery {
        let all: Vec<ConnectionId> = self
            .connections
            .read()
            .await
            .iter()
            .filter(|(_, registration)| registration.authenticated)
            .map(|(id, _)| *id)
            .collect();
        self.deliver(&all, event).await
    }

    /// Deliver an event to one connection
    pub async fn deliver_to(&self, connection: ConnectionId, event: Arc<ServerEvent>) -> Delivery {
        self.deliver(&[connection], event).await
    }

    async fn deliver(&self, targets: &[ConnectionId], event: Arc<ServerEvent>) -> Delivery {
        let senders: Vec<(ConnectionId, Outbound)> = {
            let connections = self.connections.read().await;
            targets
                .iter()
                .filter_map(|id| connections.get(id).map(|r| (*id, r.outbound.clone())))
                .collect()
        };

        let mut delivery = Delivery::default();
        let mut dead = Vec::new();
        for (connection, tx) in senders {
            match tx.try_send(event.clone()) {
                Ok(()) => delivery.delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    delivery.lagged += 1;
                    warn!(%connection, event = event.event_type(), "Outbound queue full, event dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    delivery.closed += 1;
                    dead.push(connection);
                }
            }
        }

        for connection in dead {
            self.disconnect(connection).await;
        }

        delivery
    }
}
