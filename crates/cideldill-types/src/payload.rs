use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The two wire encodings a value can travel in, plus the degraded form.
///
/// `Binary` is the host-native encoding (bincode over a canonical JSON
/// value graph); `Json` is for payloads addressed to a non-native peer.
/// `Placeholder` is never chosen directly by a caller — the codec falls
/// back to it when a value can't be encoded at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Binary,
    Json,
    Placeholder,
}

/// `{ cid, format, bytes }` — immutable once constructed. Equal CIDs imply
/// equal bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    pub cid: String,
    pub format: Format,
    #[serde(with = "bytes_as_base64")]
    pub bytes: Vec<u8>,
}

impl Payload {
    pub fn new(cid: String, format: Format, bytes: Vec<u8>) -> Self {
        Self { cid, format, bytes }
    }
}

mod bytes_as_base64 {
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD
            .decode(s.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// A structured stand-in for a value the codec could not encode.
///
/// Carries enough information for a UI to render *something* useful, and a
/// marker field (`__placeholder__`) so consumers can detect it after
/// decoding without inspecting every field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Placeholder {
    #[serde(rename = "__placeholder__")]
    pub marker: bool,
    pub type_name: String,
    pub module: String,
    pub object_name: String,
    pub pickle_error: String,
    pub depth: u32,
    pub attributes: BTreeMap<String, Payload>,
    pub failed_attributes: BTreeMap<String, String>,
}

impl Placeholder {
    pub fn new(type_name: impl Into<String>, module: impl Into<String>, object_name: impl Into<String>, pickle_error: impl Into<String>, depth: u32) -> Self {
        Self {
            marker: true,
            type_name: type_name.into(),
            module: module.into(),
            object_name: object_name.into(),
            pickle_error: pickle_error.into(),
            depth,
            attributes: BTreeMap::new(),
            failed_attributes: BTreeMap::new(),
        }
    }

    /// A placeholder built purely to mark a cycle back-edge.
    pub fn circular(type_name: impl Into<String>, object_name: impl Into<String>) -> Self {
        Self::new(type_name, "unknown", object_name, "circular reference", 0)
    }
}
