//! Room broadcaster
//!
//! Every mutation runs **authorize → commit → fan-out**. Nothing is broadcast unless the
//! commit succeeded, and a failed step ends the request with a [`RejectReason`] that is
//! reported to the originating connection only.
//!
//! Add and delete are deliberately asymmetric: any authenticated identity may add, but
//! only the record's `added_by` identity or an admin may delete.
//!
//! Concurrent deletes of one record race safely: both may find it, only one commit
//! removes a row, the other sees [`Deletion::NotFound`] and ends without a broadcast.

use sitesync_common::events::{
    AddMaterialRequest, ClientCommand, DeleteMaterialRequest, DeletedItem, RejectReason,
    Rejection, RoomRequest, ServerEvent,
};
use sitesync_common::{time, Site};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::registry::{ConnectionId, Delivery, RoomRegistry};
use crate::gateway::{Deletion, PersistenceGateway};
use crate::identity::IdentityContext;

/// What an accepted command did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Joined { site_id: String },
    Left { site_id: String },
    Broadcast { site_id: String, event: &'static str, delivery: Delivery },
}

#[derive(Clone)]
pub struct RoomBroadcaster {
    registry: Arc<RoomRegistry>,
    gateway: PersistenceGateway,
}

impl RoomBroadcaster {
    pub fn new(registry: Arc<RoomRegistry>, gateway: PersistenceGateway) -> Self {
        Self { registry, gateway }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Handle one text frame from a connection
    ///
    /// Rejections are sent back to `connection` only and also returned.
    pub async fn process_frame(
        &self,
        connection: ConnectionId,
        identity: &IdentityContext,
        text: &str,
    ) -> Result<CommandOutcome, RejectReason> {
        let result = match parse_frame(text) {
            Ok(command) => {
                let name = command.name();
                self.dispatch(connection, identity, command)
                    .await
                    .map_err(|reason| (Some(name), reason))
            }
            Err(request) => {
                debug!(%connection, "Unreadable frame");
                Err((request, RejectReason::Malformed))
            }
        };

        match result {
            Ok(outcome) => Ok(outcome),
            Err((request, reason)) => {
                let rejection = ServerEvent::Rejected(Rejection {
                    request: request.map(str::to_string),
                    reason,
                });
                self.registry.deliver_to(connection, Arc::new(rejection)).await;
                Err(reason)
            }
        }
    }

    /// Route a parsed command to its operation
    pub async fn dispatch(
        &self,
        connection: ConnectionId,
        identity: &IdentityContext,
        command: ClientCommand,
    ) -> Result<CommandOutcome, RejectReason> {
        match command {
            ClientCommand::JoinSite(req) => self.join_site(connection, identity, &req).await,
            ClientCommand::LeaveSite(req) => self.leave_site(connection, identity, &req).await,
            ClientCommand::AddMaterial(req) => self.add_material(identity, &req).await,
            ClientCommand::DeleteMaterial(req) => self.delete_material(identity, &req).await,
        }
    }

    pub async fn join_site(
        &self,
        connection: ConnectionId,
        identity: &IdentityContext,
        req: &RoomRequest,
    ) -> Result<CommandOutcome, RejectReason> {
        authenticated(identity)?;
        let site_id = req.site_id().ok_or(RejectReason::Malformed)?;

        self.registry.join(connection, site_id).await;
        Ok(CommandOutcome::Joined {
            site_id: site_id.to_string(),
        })
    }

    pub async fn leave_site(
        &self,
        connection: ConnectionId,
        identity: &IdentityContext,
        req: &RoomRequest,
    ) -> Result<CommandOutcome, RejectReason> {
        authenticated(identity)?;
        let site_id = req.site_id().ok_or(RejectReason::Malformed)?;

        self.registry.leave(connection, site_id).await;
        Ok(CommandOutcome::Left {
            site_id: site_id.to_string(),
        })
    }

    /// Add a material record and broadcast it to its room, submitter included
    pub async fn add_material(
        &self,
        identity: &IdentityContext,
        req: &AddMaterialRequest,
    ) -> Result<CommandOutcome, RejectReason> {
        let actor = authenticated(identity)?;
        let new = req.validate().ok_or_else(|| {
            debug!(username = %actor.username, "add_material missing site_id, name or quantity");
            RejectReason::Malformed
        })?;

        let record = self
            .gateway
            .insert_material(&new, &actor.username, &time::minute_stamp())
            .await
            .map_err(|e| {
                error!(site_id = %new.site_id, "Failed to commit material: {}", e);
                RejectReason::PersistenceFailure
            })?;

        info!(
            site_id = %record.site_id,
            material_id = %record.id,
            added_by = %record.added_by,
            "Material added"
        );

        let site_id = record.site_id.clone();
        let delivery = self
            .registry
            .deliver_to_room(&site_id, Arc::new(ServerEvent::UpdateList(record)))
            .await;

        Ok(CommandOutcome::Broadcast {
            site_id,
            event: "update_list",
            delivery,
        })
    }

    /// Delete a material record if the identity owns it or is an admin
    pub async fn delete_material(
        &self,
        identity: &IdentityContext,
        req: &DeleteMaterialRequest,
    ) -> Result<CommandOutcome, RejectReason> {
        let actor = authenticated(identity)?;
        let (id, site_id) = req.validate().ok_or(RejectReason::Malformed)?;

        let record = self
            .gateway
            .find_material(id)
            .await
            .map_err(|e| {
                error!(material_id = %id, "Failed to look up material: {}", e);
                RejectReason::PersistenceFailure
            })?
            .ok_or(RejectReason::NotFound)?;

        if !actor.may_delete(&record) {
            warn!(
                material_id = %id,
                username = %actor.username,
                owner = %record.added_by,
                "Delete refused: not owner or admin"
            );
            return Err(RejectReason::Forbidden);
        }

        match self.gateway.delete_material(id).await {
            Ok(Deletion::Deleted) => {}
            Ok(Deletion::NotFound) => {
                debug!(material_id = %id, "Lost delete race, nothing to broadcast");
                return Err(RejectReason::NotFound);
            }
            Err(e) => {
                error!(material_id = %id, "Failed to delete material: {}", e);
                return Err(RejectReason::PersistenceFailure);
            }
        }

        info!(material_id = %id, site_id, username = %actor.username, "Material deleted");

        let delivery = self
            .registry
            .deliver_to_room(
                site_id,
                Arc::new(ServerEvent::ItemDeleted(DeletedItem { id: id.to_string() })),
            )
            .await;

        Ok(CommandOutcome::Broadcast {
            site_id: site_id.to_string(),
            event: "item_deleted",
            delivery,
        })
    }

    /// Announce a newly created site to every live connection, in any room or none
    pub async fn announce_site(&self, site: Site) -> Delivery {
        let delivery = self
            .registry
            .deliver_to_all(Arc::new(ServerEvent::SiteCreated(site)))
            .await;
        debug!(delivered = delivery.delivered, "site_created announced");
        delivery
    }
}

fn authenticated(identity: &IdentityContext) -> Result<&sitesync_common::Identity, RejectReason> {
    identity.identity().ok_or(RejectReason::Unauthenticated)
}

/// Parse a frame; on failure return the event name if one could be read
fn parse_frame(text: &str) -> Result<ClientCommand, Option<&'static str>> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|_| None)?;
    let name = value
        .get("event")
        .and_then(|v| v.as_str())
        .and_then(known_event_name);

    serde_json::from_value(value).map_err(|_| name)
}

fn known_event_name(name: &str) -> Option<&'static str> {
    ["join_site", "leave_site", "add_material", "delete_material"]
        .into_iter()
        .find(|known| *known == name)
}
