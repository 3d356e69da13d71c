use cideldill_types::{CideldillError, Format, Payload, Placeholder, Result};

use crate::cid::compute_cid;

/// Encodes an already-successful JSON value into a [`Payload`] under the
/// requested wire format, content-addressing the encoded bytes.
pub fn encode_value(value: serde_json::Value, format: Format) -> Payload {
    let bytes = match format {
        Format::Json | Format::Placeholder => serde_json::to_vec(&value).expect("serde_json::Value always serializes"),
        Format::Binary => bincode::serialize(&value).expect("serde_json::Value always serializes"),
    };
    let cid = compute_cid(&bytes);
    Payload::new(cid, format, bytes)
}

/// Encodes a degraded [`Placeholder`] as a `Format::Placeholder` payload.
/// Placeholders always travel as JSON regardless of the caller's preferred
/// format — there is no binary encoding for a value that never successfully
/// encoded in the first place.
pub fn encode_placeholder(placeholder: Placeholder) -> Payload {
    let bytes = serde_json::to_vec(&placeholder).expect("Placeholder always serializes");
    let cid = compute_cid(&bytes);
    Payload::new(cid, Format::Placeholder, bytes)
}

/// The result of decoding a [`Payload`]'s bytes back into structured data.
#[derive(Debug, Clone)]
pub enum DecodedValue {
    Value(serde_json::Value),
    Placeholder(Placeholder),
}

/// Decodes `payload`, verifying its CID matches its bytes first — equal
/// CIDs must imply equal bytes. A CID mismatch is an integrity error and
/// propagates; a top-level decode failure against an otherwise
/// CID-verified payload instead degrades to a placeholder, the same
/// never-propagate discipline `serialize` follows on the way in.
pub fn decode(payload: &Payload) -> Result<DecodedValue> {
    if !crate::cid::verify(&payload.bytes, &payload.cid) {
        return Err(CideldillError::CidMismatch {
            provided: payload.cid.clone(),
            expected: compute_cid(&payload.bytes),
        });
    }

    match payload.format {
        Format::Json => match serde_json::from_slice(&payload.bytes) {
            Ok(value) => Ok(DecodedValue::Value(value)),
            Err(e) => Ok(DecodedValue::Placeholder(undecodable_placeholder(&payload.cid, "json", &e.to_string()))),
        },
        Format::Binary => match bincode::deserialize::<serde_json::Value>(&payload.bytes) {
            Ok(value) => Ok(DecodedValue::Value(value)),
            Err(e) => Ok(DecodedValue::Placeholder(undecodable_placeholder(&payload.cid, "binary", &e.to_string()))),
        },
        Format::Placeholder => match serde_json::from_slice(&payload.bytes) {
            Ok(placeholder) => Ok(DecodedValue::Placeholder(placeholder)),
            Err(e) => Ok(DecodedValue::Placeholder(undecodable_placeholder(&payload.cid, "placeholder", &e.to_string()))),
        },
    }
}

fn undecodable_placeholder(cid: &str, format: &str, decode_error: &str) -> Placeholder {
    Placeholder::new("Undecodable", "builtins", format!("<payload cid={cid} format={format}>"), decode_error.to_string(), 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encode_then_decode_json_round_trips() {
        let payload = encode_value(json!({"a": 1, "b": "two"}), Format::Json);
        match decode(&payload).unwrap() {
            DecodedValue::Value(v) => assert_eq!(v, json!({"a": 1, "b": "two"})),
            DecodedValue::Placeholder(_) => panic!("expected a value"),
        }
    }

    #[test]
    fn encode_then_decode_binary_round_trips() {
        let payload = encode_value(json!([1, 2, 3]), Format::Binary);
        match decode(&payload).unwrap() {
            DecodedValue::Value(v) => assert_eq!(v, json!([1, 2, 3])),
            DecodedValue::Placeholder(_) => panic!("expected a value"),
        }
    }

    #[test]
    fn decode_rejects_tampered_bytes() {
        let mut payload = encode_value(json!(42), Format::Json);
        payload.bytes = b"41".to_vec();
        assert!(matches!(decode(&payload), Err(CideldillError::CidMismatch { .. })));
    }

    #[test]
    fn decode_degrades_to_placeholder_when_bytes_are_not_valid_json() {
        let bytes = b"not json".to_vec();
        let cid = compute_cid(&bytes);
        let payload = Payload::new(cid, Format::Json, bytes);
        match decode(&payload).unwrap() {
            DecodedValue::Placeholder(p) => {
                assert_eq!(p.type_name, "Undecodable");
                assert!(p.marker);
            }
            DecodedValue::Value(_) => panic!("malformed json should degrade, not decode"),
        }
    }
}
