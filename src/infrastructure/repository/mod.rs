//! Repository infrastructure - read-through repositories over a store and a cache

mod read_through;

pub use read_through::ReadThroughRepository;
