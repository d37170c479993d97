//! Payload Registry
//!
//! Backends that store entries outside the process need to turn a type-erased
//! [`Payload`] into bytes and back. A `PayloadRegistry` maps each registered
//! Rust type to a stable name and a codec. It is an ordinary value handed to
//! the backends that need it, so two backends (or two tests) never share
//! registrations by accident.
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use tiered_cache::{Payload, PayloadRegistry};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Profile {
//!     name: String,
//! }
//!
//! let registry = PayloadRegistry::new().register::<Profile>("profile");
//! let encoded = registry.encode(&Payload::new(Profile { name: "alice".into() })).unwrap();
//! let decoded = registry.decode(&encoded).unwrap();
//! assert_eq!(decoded.downcast_ref::<Profile>().map(|p| p.name.as_str()), Some("alice"));
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::codecs::BincodeCodec;
use crate::entry::Payload;
use crate::error::{CacheError, Result};
use crate::frontends::HttpRecord;
use crate::traits::CacheCodec;

type EncodeFn = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Result<Vec<u8>> + Send + Sync>;
type DecodeFn = Arc<dyn Fn(&[u8]) -> Result<Payload> + Send + Sync>;

/// A payload in its portable form: the registered type name plus the bytes
/// produced by that type's codec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedPayload {
    pub type_name: String,
    #[serde(with = "serde_bytes")]
    pub bytes: Vec<u8>,
}

struct Registration {
    name: String,
    encode: EncodeFn,
}

/// Registry of payload types a backend can encode and decode
pub struct PayloadRegistry {
    by_type: HashMap<TypeId, Registration>,
    by_name: HashMap<String, DecodeFn>,
}

impl PayloadRegistry {
    /// An empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register `T` under `name` using the bincode codec
    #[must_use]
    pub fn register<T>(self, name: impl Into<String>) -> Self
    where
        T: Serialize + DeserializeOwned + Any + Send + Sync,
    {
        self.register_with_codec::<T, _>(name, BincodeCodec)
    }

    /// Register `T` under `name` using a specific codec
    ///
    /// Registering the same type or name again replaces the previous entry.
    #[must_use]
    pub fn register_with_codec<T, C>(mut self, name: impl Into<String>, codec: C) -> Self
    where
        T: Serialize + DeserializeOwned + Any + Send + Sync,
        C: CacheCodec + Clone + 'static,
    {
        let name = name.into();

        let encode_codec = codec.clone();
        let encode_name = name.clone();
        let encode: EncodeFn = Arc::new(move |value| {
            let typed = value.downcast_ref::<T>().ok_or_else(|| {
                CacheError::Codec(format!("payload is not a `{encode_name}`"))
            })?;
            encode_codec.serialize(typed)
        });
        let decode: DecodeFn = Arc::new(move |bytes| {
            let value: T = codec.deserialize(bytes)?;
            Ok(Payload::new(value))
        });

        self.by_type.insert(
            TypeId::of::<T>(),
            Registration {
                name: name.clone(),
                encode,
            },
        );
        self.by_name.insert(name, decode);
        self
    }

    /// `true` if `T` can be encoded
    #[must_use]
    pub fn is_registered<T: Any>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    /// Encode a payload
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::UnregisteredPayload`] for unknown types and
    /// [`CacheError::Codec`] if the codec fails.
    pub fn encode(&self, payload: &Payload) -> Result<EncodedPayload> {
        let registration = self
            .by_type
            .get(&payload.value_type_id())
            .ok_or_else(|| CacheError::UnregisteredPayload(payload.type_name().to_string()))?;

        Ok(EncodedPayload {
            type_name: registration.name.clone(),
            bytes: (registration.encode)(payload.as_any())?,
        })
    }

    /// Decode a payload
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::UnregisteredPayload`] for unknown names and
    /// [`CacheError::Codec`] if the bytes do not decode.
    pub fn decode(&self, encoded: &EncodedPayload) -> Result<Payload> {
        let decode = self
            .by_name
            .get(&encoded.type_name)
            .ok_or_else(|| CacheError::UnregisteredPayload(encoded.type_name.clone()))?;
        decode(&encoded.bytes)
    }
}

/// Registers the payload types produced by the built-in frontends
impl Default for PayloadRegistry {
    fn default() -> Self {
        Self::new()
            .register::<String>("string")
            .register::<HttpRecord>("http-response")
    }
}

impl fmt::Debug for PayloadRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("PayloadRegistry")
            .field("types", &names)
            .finish()
    }
}
