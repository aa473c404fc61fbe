//! Infrastructure layer - cache backends, stores and the read-through repository

pub mod cache;
pub mod coalesce;
pub mod logging;
pub mod observability;
pub mod repository;
pub mod storage;
