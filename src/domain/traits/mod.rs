//! Traits shared between the domain and the outer layers

mod repository;

pub use repository::EntityRepository;

#[cfg(test)]
pub use repository::MockEntityRepository;
