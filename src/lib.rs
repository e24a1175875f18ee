//! folia: a read-through render cache for server-rendered sites.
//!
//! Template source and static assets are read from disk, pushed through one
//! or two rendering passes, optionally gzipped, and every derived
//! representation is memoized for the life of the process.

pub mod application;
pub mod cache;
pub mod config;
pub mod infra;
