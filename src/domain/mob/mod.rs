//! Mob domain - hostile and friendly creatures placed in rooms

mod entity;

pub use entity::{Mob, MobPatch};
