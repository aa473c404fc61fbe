//! Application state shared by the HTTP handlers

use std::sync::Arc;

use crate::domain::storage::Record;
use crate::domain::{EntityRepository, Item, Mob, Room};

/// One repository per entity kind
#[derive(Clone)]
pub struct AppState {
    pub mobs: Arc<dyn EntityRepository<Mob>>,
    pub items: Arc<dyn EntityRepository<Item>>,
    pub rooms: Arc<dyn EntityRepository<Room>>,
}

impl AppState {
    pub fn new(
        mobs: Arc<dyn EntityRepository<Mob>>,
        items: Arc<dyn EntityRepository<Item>>,
        rooms: Arc<dyn EntityRepository<Room>>,
    ) -> Self {
        Self { mobs, items, rooms }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

/// Picks the repository for a kind out of the state
pub trait RepositoryFor<E: Record> {
    fn repository(&self) -> &Arc<dyn EntityRepository<E>>;
}

impl RepositoryFor<Mob> for AppState {
    fn repository(&self) -> &Arc<dyn EntityRepository<Mob>> {
        &self.mobs
    }
}

impl RepositoryFor<Item> for AppState {
    fn repository(&self) -> &Arc<dyn EntityRepository<Item>> {
        &self.items
    }
}

impl RepositoryFor<Room> for AppState {
    fn repository(&self) -> &Arc<dyn EntityRepository<Room>> {
        &self.rooms
    }
}
