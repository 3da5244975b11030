//! Real-time event types
//!
//! Every WebSocket text frame is `{"event": <name>, "data": <payload>}` in both
//! directions. Client payload fields are all optional at the serde layer so that a
//! frame with a missing field still parses and can be rejected as malformed by the
//! hub, rather than failing as an unreadable frame.

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{MaterialRecord, Site};

/// Client → server commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    JoinSite(RoomRequest),
    LeaveSite(RoomRequest),
    AddMaterial(AddMaterialRequest),
    DeleteMaterial(DeleteMaterialRequest),
}

impl ClientCommand {
    /// Get event name as sent on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::JoinSite(_) => "join_site",
            ClientCommand::LeaveSite(_) => "leave_site",
            ClientCommand::AddMaterial(_) => "add_material",
            ClientCommand::DeleteMaterial(_) => "delete_material",
        }
    }
}

/// Payload of `join_site` / `leave_site`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomRequest {
    #[serde(default)]
    pub site_id: Option<String>,
}

impl RoomRequest {
    pub fn site_id(&self) -> Option<&str> {
        non_empty(&self.site_id)
    }
}

/// Payload of `add_material`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddMaterialRequest {
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

/// A validated `add_material` request, ready to commit
#[derive(Debug, Clone, PartialEq)]
pub struct NewMaterial {
    pub site_id: String,
    pub name: String,
    pub quantity: f64,
    /// Empty when the client sent none
    pub unit: String,
}

impl AddMaterialRequest {
    /// `site_id`, `name` and `quantity` are required; empty strings count as absent
    pub fn validate(&self) -> Option<NewMaterial> {
        Some(NewMaterial {
            site_id: non_empty(&self.site_id)?.to_string(),
            name: non_empty(&self.name)?.to_string(),
            quantity: self.quantity.filter(|q| q.is_finite())?,
            unit: self.unit.clone().unwrap_or_default(),
        })
    }
}

/// Payload of `delete_material`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteMaterialRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub site_id: Option<String>,
}

impl DeleteMaterialRequest {
    /// Returns `(id, site_id)` when both are present
    pub fn validate(&self) -> Option<(&str, &str)> {
        Some((non_empty(&self.id)?, non_empty(&self.site_id)?))
    }
}

/// Server → client events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A record was committed; sent to the record's room
    UpdateList(MaterialRecord),
    /// A record was deleted; sent to the record's room
    ItemDeleted(DeletedItem),
    /// A site was created; sent to every live connection
    SiteCreated(Site),
    /// A request from this connection had no effect; sent to the originator only
    Rejected(Rejection),
}

impl ServerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ServerEvent::UpdateList(_) => "update_list",
            ServerEvent::ItemDeleted(_) => "item_deleted",
            ServerEvent::SiteCreated(_) => "site_created",
            ServerEvent::Rejected(_) => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedItem {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    /// Name of the client event that was rejected, if the frame was readable
    pub request: Option<String>,
    pub reason: RejectReason,
}

/// Why a request produced no broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Connection has no verified identity
    Unauthenticated,
    /// Required field missing or unreadable frame
    Malformed,
    /// Delete target absent (already deleted, or never existed)
    NotFound,
    /// Delete by a non-owner, non-admin identity
    Forbidden,
    /// Store unreachable or timed out
    PersistenceFailure,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Quantities arrive as JSON numbers or as numeric strings from form inputs
fn lenient_quantity<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Quantity {
        Number(f64),
        Text(String),
    }

    match Option::<Quantity>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Quantity::Number(n)) => Ok(Some(n)),
        Some(Quantity::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Quantity::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid quantity: {}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<ClientCommand, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn test_parse_add_material() {
        let cmd = parse(json!({
            "event": "add_material",
            "data": {"site_id": "S1", "name": "Cement", "quantity": 50, "unit": "bags"}
        }))
        .unwrap();

        let ClientCommand::AddMaterial(req) = cmd else {
            panic!("expected add_material");
        };
        assert_eq!(
            req.validate(),
            Some(NewMaterial {
                site_id: "S1".to_string(),
                name: "Cement".to_string(),
                quantity: 50.0,
                unit: "bags".to_string(),
            })
        );
    }

    #[test]
    fn test_quantity_accepts_numeric_string() {
        let cmd = parse(json!({
            "event": "add_material",
            "data": {"site_id": "S1", "name": "Sand", "quantity": " 12.5 "}
        }))
        .unwrap();

        let ClientCommand::AddMaterial(req) = cmd else {
            panic!("expected add_material");
        };
        let new = req.validate().unwrap();
        assert_eq!(new.quantity, 12.5);
        assert_eq!(new.unit, "");
    }

    #[test]
    fn test_quantity_rejects_words() {
        assert!(parse(json!({
            "event": "add_material",
            "data": {"site_id": "S1", "name": "Sand", "quantity": "lots"}
        }))
        .is_err());
    }

    #[test]
    fn test_missing_quantity_fails_validation() {
        let req = AddMaterialRequest {
            site_id: Some("S1".to_string()),
            name: Some("Cement".to_string()),
            quantity: None,
            unit: None,
        };
        assert_eq!(req.validate(), None);
    }

    #[test]
    fn test_empty_site_id_counts_as_absent() {
        let join = RoomRequest {
            site_id: Some(String::new()),
        };
        assert_eq!(join.site_id(), None);

        let delete = DeleteMaterialRequest {
            id: Some("m-1".to_string()),
            site_id: Some(String::new()),
        };
        assert_eq!(delete.validate(), None);
    }

    #[test]
    fn test_unknown_event_is_error() {
        assert!(parse(json!({"event": "drop_tables", "data": {}})).is_err());
    }

    #[test]
    fn test_server_event_wire_shape() {
        let event = ServerEvent::ItemDeleted(DeletedItem {
            id: "m-1".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "item_deleted", "data": {"id": "m-1"}})
        );

        let rejected = ServerEvent::Rejected(Rejection {
            request: Some("delete_material".to_string()),
            reason: RejectReason::Forbidden,
        });
        assert_eq!(
            serde_json::to_value(&rejected).unwrap(),
            json!({"event": "rejected", "data": {"request": "delete_material", "reason": "forbidden"}})
        );
        assert_eq!(rejected.event_type(), "rejected");
    }
}
