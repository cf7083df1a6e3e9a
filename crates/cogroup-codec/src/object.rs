//! Pluggable codecs for opaque object fields.
//!
//! An object field names its codec (`object<json>`). The blob a codec produces
//! carries no order, so object fields are only sortable through a custom
//! comparator.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cogroup_core::error::{Error, Result};

pub trait ObjectCodec: Send + Sync {
    fn encode(&self, value: &serde_json::Value, out: &mut Vec<u8>) -> Result<()>;
    fn decode(&self, bytes: &[u8]) -> Result<serde_json::Value>;
}

impl fmt::Debug for dyn ObjectCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ObjectCodec")
    }
}

/// Compact JSON text.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonObjectCodec;

impl ObjectCodec for JsonObjectCodec {
    fn encode(&self, value: &serde_json::Value, out: &mut Vec<u8>) -> Result<()> {
        serde_json::to_writer(out, value).map_err(|e| Error::Codec(format!("json encode: {e}")))
    }

    fn decode(&self, bytes: &[u8]) -> Result<serde_json::Value> {
        serde_json::from_slice(bytes).map_err(|e| Error::Codec(format!("json decode: {e}")))
    }
}

/// Name → codec registry. Frozen once shared with a serializer.
#[derive(Clone, Default)]
pub struct ObjectCodecs {
    codecs: HashMap<String, Arc<dyn ObjectCodec>>,
}

impl ObjectCodecs {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in `json` codec.
    pub fn with_defaults() -> Self {
        let mut r = Self::new();
        r.register("json", Arc::new(JsonObjectCodec));
        r
    }

    pub fn register(&mut self, name: impl Into<String>, codec: Arc<dyn ObjectCodec>) {
        self.codecs.insert(name.into(), codec);
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn ObjectCodec>> {
        self.codecs
            .get(name)
            .ok_or_else(|| Error::Config(format!("no object codec registered as '{name}'")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.codecs.contains_key(name)
    }
}

impl fmt::Debug for ObjectCodecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.codecs.keys().collect();
        names.sort();
        f.debug_struct("ObjectCodecs").field("codecs", &names).finish()
    }
}
