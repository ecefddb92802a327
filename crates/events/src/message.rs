use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::event::Event;

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityAction {
    Created,
    Updated,
    Deleted,
}

impl EntityAction {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityAction::Created => "created",
            EntityAction::Updated => "updated",
            EntityAction::Deleted => "deleted",
        }
    }
}

/// Message describing one committed entity change.
///
/// `payload` is the JSON form of the entity after the change (or before it,
/// for deletions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMessage {
    message_id: Uuid,
    entity: String,
    entity_id: Uuid,
    action: EntityAction,
    occurred_at: DateTime<Utc>,
    payload: JsonValue,
}

impl EntityMessage {
    pub const ROUTING_PREFIX: &'static str = "accounts";

    pub fn new(
        entity: impl Into<String>,
        entity_id: Uuid,
        action: EntityAction,
        occurred_at: DateTime<Utc>,
        payload: JsonValue,
    ) -> Self {
        Self {
            message_id: Uuid::now_v7(),
            entity: entity.into(),
            entity_id,
            action,
            occurred_at,
            payload,
        }
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn entity_id(&self) -> Uuid {
        self.entity_id
    }

    pub fn action(&self) -> EntityAction {
        self.action
    }

    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    pub fn into_payload(self) -> JsonValue {
        self.payload
    }
}

impl Event for EntityMessage {
    fn routing_key(&self) -> String {
        format!("{}.{}.{}", Self::ROUTING_PREFIX, self.entity, self.action.as_str())
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
