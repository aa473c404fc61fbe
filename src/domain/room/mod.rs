//! Room domain - world locations keyed by caller-chosen identifiers

mod entity;

pub use entity::{Room, RoomPatch};
