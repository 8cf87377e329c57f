//! redb table definitions for the ordinal state store.
//!
//! Keys are `{namespace}/{name}`; values are JSON-serialized `WorkloadSet`s.

use redb::TableDefinition;

/// Workload sets keyed by `{namespace}/{name}`.
pub const WORKLOADS: TableDefinition<&str, &[u8]> = TableDefinition::new("workloads");
