//! ordinal-state: workload-set store for ordinal.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for `WorkloadSet`s with optimistic concurrency: every write bumps
//! a resource version, and spec updates made against an older version fail
//! with a conflict instead of overwriting.
//!
//! # Architecture
//!
//! Workload sets are JSON-serialized into redb's `&[u8]` value column under
//! `{namespace}/{name}` keys. The `StateStore` is `Clone` + `Send` + `Sync`
//! (backed by `Arc<Database>`) and implements the async [`WorkloadStore`]
//! trait the rollout core depends on.

pub mod client;
pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use client::WorkloadStore;
pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
