//! Bincode Codec using `bincode`
//!
//! Compact binary encoding; the default for registered payloads and the only
//! encoding used for the entry envelopes written by the file and redis
//! backends.

use crate::error::Result;
use crate::traits::CacheCodec;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Bincode Codec using `bincode`
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeCodec;

impl CacheCodec for BincodeCodec {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(::bincode::serialize(value)?)
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        Ok(::bincode::deserialize(bytes)?)
    }

    fn name(&self) -> &'static str {
        "bincode"
    }
}
