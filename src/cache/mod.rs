//! Process-lifetime memoization substrate.
//!
//! Entries are created on first miss, extended in place with missing derived
//! representations, and dropped only at process exit. There is no eviction
//! and no TTL: the backing files are assumed stable for the life of the
//! process, and a restart is the invalidation mechanism.

pub mod flight;
mod lock;
mod store;

pub use store::{FileStore, TemplateStore};
