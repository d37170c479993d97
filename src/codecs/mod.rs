//! Cache Codec Implementations
//!
//! This module provides built-in implementations of the [`CacheCodec`](crate::traits::CacheCodec) trait
//! used by the [`PayloadRegistry`](crate::PayloadRegistry).

mod bincode;
mod json;

pub use self::bincode::BincodeCodec;
pub use self::json::JsonCodec;
