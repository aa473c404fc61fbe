//! Mob entity and its partial update

use serde::{Deserialize, Serialize};

use crate::domain::storage::{present_field, Record, RecordPatch};

fn default_pool() -> i32 {
    100
}

fn default_stat() -> i32 {
    1
}

/// A creature template
///
/// The id is assigned by the store on create; a zero id means "not yet stored".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mob {
    #[serde(default)]
    pub id: u64,

    #[serde(rename = "mobID", default)]
    pub mob_id: String,

    #[serde(default)]
    pub mob_name: String,

    #[serde(default)]
    pub mob_cname: String,

    #[serde(default)]
    pub mob_desc: String,

    /// Unknown when `None`
    #[serde(default)]
    pub attackable: Option<bool>,

    #[serde(default = "default_pool")]
    pub hp: i32,

    #[serde(default = "default_pool")]
    pub mp: i32,

    #[serde(default = "default_stat")]
    pub attack: i32,

    #[serde(default = "default_stat")]
    pub defence: i32,

    #[serde(default = "default_stat")]
    pub dodge: i32,
}

impl Default for Mob {
    fn default() -> Self {
        Self {
            id: 0,
            mob_id: String::new(),
            mob_name: String::new(),
            mob_cname: String::new(),
            mob_desc: String::new(),
            attackable: None,
            hp: default_pool(),
            mp: default_pool(),
            attack: default_stat(),
            defence: default_stat(),
            dodge: default_stat(),
        }
    }
}

impl Mob {
    pub fn new(mob_id: impl Into<String>, mob_name: impl Into<String>) -> Self {
        Self {
            mob_id: mob_id.into(),
            mob_name: mob_name.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    pub fn with_hp(mut self, hp: i32) -> Self {
        self.hp = hp;
        self
    }
}

/// Fields to change on a mob; `None` leaves the stored value untouched
///
/// `attackable` is nullable in storage, so `Some(None)` (a JSON `null`)
/// resets it to unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobPatch {
    #[serde(rename = "mobID", skip_serializing_if = "Option::is_none")]
    pub mob_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mob_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mob_cname: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mob_desc: Option<String>,

    #[serde(
        default,
        deserialize_with = "present_field",
        skip_serializing_if = "Option::is_none"
    )]
    pub attackable: Option<Option<bool>>,

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
}

impl RecordPatch for MobPatch {}

impl Record for Mob {
    type Key = u64;
    type Patch = MobPatch;

    const KIND: &'static str = "mob";
    const CACHE_PREFIX: &'static str = "mob:";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "mobID",
        "mobName",
        "mobCname",
        "mobDesc",
        "attackable",
        "hp",
        "mp",
        "attack",
        "defence",
        "dodge",
    ];

    fn id(&self) -> &u64 {
        &self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}
