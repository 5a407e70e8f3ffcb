use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One client request to be forwarded upstream.
///
/// Only a JSON object binds. Fields that are missing or `null` take their
/// empty defaults, unknown fields are ignored, and a field of the wrong type
/// rejects the whole request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct RequestEnvelope {
    /// Upstream operation name, e.g. `ListarClientes`.
    pub call: String,

    /// Operation arguments, in order.
    pub param: Vec<Map<String, Value>>,

    /// Path appended to the upstream base URL, e.g. `geral/clientes/`.
    pub url: String,
}

impl TryFrom<Map<String, Value>> for RequestEnvelope {
    type Error = serde_json::Error;

    fn try_from(mut fields: Map<String, Value>) -> Result<Self, Self::Error> {
        fn take<T>(fields: &mut Map<String, Value>, name: &str) -> Result<T, serde_json::Error>
        where
            T: DeserializeOwned + Default,
        {
            match fields.remove(name) {
                None | Some(Value::Null) => Ok(T::default()),
                Some(value) => serde_json::from_value(value),
            }
        }

        Ok(Self {
            call: take(&mut fields, "call")?,
            param: take(&mut fields, "param")?,
            url: take(&mut fields, "url")?,
        })
    }
}

impl RequestEnvelope {
    /// Derives the cache key: the envelope serialized as JSON.
    ///
    /// Field order is `call`, `param`, `url`. Keys inside each `param` object
    /// come out sorted, so the key depends on values alone.
    pub fn cache_key(&self) -> Result<CacheKey, serde_json::Error> {
        serde_json::to_string(self).map(CacheKey)
    }
}

/// Cache index for one envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
