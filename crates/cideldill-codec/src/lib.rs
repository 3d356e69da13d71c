//! Content-addressed payload codec: encode/decode with graceful
//! degradation to placeholders for values that don't survive encoding,
//! mirroring the canonical-hash discipline in
//! `sem_os_core::authoring::canonical_hash`.

pub mod cid;
pub mod degrade;
pub mod encode;
pub mod serializable;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use cideldill_types::{Format, Payload};

pub use cid::{compute_cid, verify};
pub use degrade::{degrade, DEFAULT_DEPTH};
pub use encode::{decode, encode_placeholder, encode_value, DecodedValue};
pub use serializable::{Serializable, Unpicklable};

static WARNINGS_ENABLED: AtomicBool = AtomicBool::new(false);

/// Encoder warnings are suppressed by default; this re-enables them at a
/// debug log level.
pub fn set_warnings_enabled(enabled: bool) {
    WARNINGS_ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn warnings_enabled() -> bool {
    WARNINGS_ENABLED.load(Ordering::Relaxed)
}

/// Encodes `value` under `format`, falling back to a placeholder when the
/// value's own `try_to_json` fails. `serialize` is total — it never
/// returns an error, it degrades instead.
pub fn serialize(value: &dyn Serializable, format: Format) -> Payload {
    match value.try_to_json() {
        Ok(json) => encode_value(json, format),
        Err(pickle_error) => {
            if warnings_enabled() {
                tracing::debug!(type_name = %value.type_name(), pickle_error = %pickle_error, "encoder failed, degrading to placeholder");
            }
            let mut visited = HashSet::new();
            let placeholder = degrade(value, pickle_error, DEFAULT_DEPTH, &mut visited);
            encode_placeholder(placeholder)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::DecodedValue;
    use serde_json::json;

    #[derive(serde::Serialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn serialize_encodes_picklable_values_directly() {
        let payload = serialize(&Point { x: 1, y: 2 }, Format::Json);
        assert_eq!(payload.format, Format::Json);
        match decode(&payload).unwrap() {
            DecodedValue::Value(v) => assert_eq!(v, json!({"x": 1, "y": 2})),
            DecodedValue::Placeholder(_) => panic!("Point should encode directly"),
        }
    }

    #[test]
    fn serialize_degrades_unpicklable_values_to_placeholder() {
        let socket = Unpicklable::new("Socket", "<socket fd=3>", "cannot pickle 'socket' object");
        let payload = serialize(&socket, Format::Json);
        assert_eq!(payload.format, Format::Placeholder);
        match decode(&payload).unwrap() {
            DecodedValue::Placeholder(p) => {
                assert!(p.marker);
                assert_eq!(p.type_name, "Socket");
                assert_eq!(p.pickle_error, "cannot pickle 'socket' object");
            }
            DecodedValue::Value(_) => panic!("Unpicklable should degrade"),
        }
    }

    #[test]
    fn warnings_toggle_defaults_to_disabled_and_round_trips() {
        assert!(!warnings_enabled());
        set_warnings_enabled(true);
        assert!(warnings_enabled());
        set_warnings_enabled(false);
        assert!(!warnings_enabled());
    }

    #[test]
    fn serialize_is_deterministic_for_equal_values() {
        let a = serialize(&Point { x: 1, y: 2 }, Format::Json);
        let b = serialize(&Point { x: 1, y: 2 }, Format::Json);
        assert_eq!(a.cid, b.cid);
        assert_eq!(a.bytes, b.bytes);
    }
}
