//! Command groups built on the core engine.
//!
//! Each plugin owns its clap types, a `run_*` entry point, and a `schema()`
//! descriptor surfaced by `omt schema`.

pub mod contracts;
pub mod hive;
pub mod status;
pub mod task;
