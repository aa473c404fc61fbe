//! Domain layer - Core entities, contracts and errors

pub mod cache;
pub mod error;
pub mod item;
pub mod mob;
pub mod room;
pub mod storage;
pub mod traits;

pub use cache::{Cache, CacheExt};
pub use error::DomainError;
pub use item::{Item, ItemPatch};
pub use mob::{Mob, MobPatch};
pub use room::{Room, RoomPatch};
pub use storage::{QueryParams, Record, RecordKey, RecordPatch, Store};
pub use traits::EntityRepository;
