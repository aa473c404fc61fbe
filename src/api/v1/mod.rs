//! Versioned entity API

pub mod entities;

use axum::Router;

use crate::domain::{Item, Mob, Room};

use super::state::AppState;

/// Create the v1 API router: `/api/v1/{mob,item,room}`
pub fn create_v1_router() -> Router<AppState> {
    Router::new().nest(
        "/api/v1",
        Router::new()
            .merge(entities::entity_router::<Mob>())
            .merge(entities::entity_router::<Item>())
            .merge(entities::entity_router::<Room>()),
    )
}
