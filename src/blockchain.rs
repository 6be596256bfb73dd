// Thin re-export module: implementation is in `blockchain/core.rs`, split
// into the block type and its validation.

pub mod core;
pub use self::core::*;
