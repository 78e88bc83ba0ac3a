//! Core engine: contract validation, the task and hive ledgers, and the
//! consistency checker, plus the storage/config primitives they share.

pub mod config;
pub mod consistency;
pub mod contract;
pub mod error;
pub mod hive_state;
pub mod output;
pub mod rules;
pub mod store;
pub mod task_state;
pub mod time;
pub mod workspace;
