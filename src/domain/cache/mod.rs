//! Cache domain - key/value backend contract with a not-found placeholder

mod key;
mod repository;

pub use key::{is_placeholder_value, namespaced_key, PLACEHOLDER};
pub use repository::{Cache, CacheExt};

#[cfg(test)]
pub use repository::mock::MockCache;
