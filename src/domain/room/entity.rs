//! Room entity and its partial update

use serde::{Deserialize, Serialize};

use crate::domain::storage::{Record, RecordPatch};

/// A world location
///
/// Rooms are keyed by a caller-chosen string such as `"room-1"`, so the same
/// key can come back after a delete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Room {
    pub id: String,
    pub title: String,
    pub desc: String,
    /// Exit description
    pub way: String,
    /// Mob ids spawned in the room
    pub mobs: String,
}

impl Room {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Fields to change on a room; `None` leaves the stored value untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub way: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobs: Option<String>,
}

impl RecordPatch for RoomPatch {}

impl Record for Room {
    type Key = String;
    type Patch = RoomPatch;

    const KIND: &'static str = "room";
    const CACHE_PREFIX: &'static str = "room:";
    const COLUMNS: &'static [&'static str] = &["id", "title", "desc", "way", "mobs"];

    fn id(&self) -> &String {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}
