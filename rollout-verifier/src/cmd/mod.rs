//! CLI subcommands.

pub mod events;
pub mod pool;
pub mod rollout;
