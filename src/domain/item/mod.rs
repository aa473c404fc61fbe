//! Item domain - equipment and consumables

mod entity;

pub use entity::{Item, ItemPatch};
