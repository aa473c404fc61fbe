//! Item entity and its partial update

use serde::{Deserialize, Serialize};

use crate::domain::storage::{Record, RecordPatch};

/// An item template with its attribute bonuses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Item {
    pub id: u64,
    #[serde(rename = "itemID")]
    pub item_id: String,
    pub item_name: String,
    pub item_cname: String,
    pub item_desc: String,
    pub hp: i32,
    pub mp: i32,
    pub attack: i32,
    pub defence: i32,
    pub dodge: i32,
    pub str: i32,
    pub cor: i32,
    pub inte: i32,
    pub dex: i32,
    pub con: i32,
    pub kar: i32,
    /// Single-letter category code
    pub classifier: String,
}

impl Item {
    pub fn new(item_id: impl Into<String>, item_name: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            item_name: item_name.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }
}

/// Fields to change on an item; `None` leaves the stored value untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    #[serde(rename = "itemID", skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_cname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mp: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attack: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defence: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dodge: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub str: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cor: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inte: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dex: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub con: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kar: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
}

impl RecordPatch for ItemPatch {}

impl Record for Item {
    type Key = u64;
    type Patch = ItemPatch;

    const KIND: &'static str = "item";
    const CACHE_PREFIX: &'static str = "item:";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "itemID",
        "itemName",
        "itemCname",
        "itemDesc",
        "hp",
        "mp",
        "attack",
        "defence",
        "dodge",
        "str",
        "cor",
        "inte",
        "dex",
        "con",
        "kar",
        "classifier",
    ];

    fn id(&self) -> &u64 {
        &self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}
