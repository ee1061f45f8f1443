//! Descriptor serialization
//!
//! Writes are strict: a descriptor that cannot be encoded is a caller error.
//! Reads are tolerant: listings skip records that do not parse, so one
//! truncated or foreign value never hides every other instance.

use crate::descriptor::ServiceDescriptor;
use thiserror::Error;

/// A stored value that could not be turned back into a descriptor
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("value is missing (expired between scan and read)")]
    Missing,
    #[error("invalid descriptor JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize a descriptor to the bytes stored under its lease key
pub fn encode(descriptor: &ServiceDescriptor) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(descriptor)
}

/// Decode a single raw value
pub fn decode(raw: Option<&[u8]>) -> Result<ServiceDescriptor, DecodeError> {
    let raw = raw.ok_or(DecodeError::Missing)?;
    Ok(serde_json::from_slice(raw)?)
}

/// Decode a batch of raw values, dropping the ones that fail.
///
/// `on_error` sees every dropped record with its position in the batch.
pub fn decode_all<F>(raw: &[Option<Vec<u8>>], mut on_error: F) -> Vec<ServiceDescriptor>
where
    F: FnMut(usize, &DecodeError),
{
    raw.iter()
        .enumerate()
        .filter_map(|(idx, value)| match decode(value.as_deref()) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                on_error(idx, &e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorInput;

    fn descriptor(port: u16) -> ServiceDescriptor {
        ServiceDescriptor::resolve("api", DescriptorInput::from(port), || "h".to_string())
    }

    #[test]
    fn test_decode_roundtrip() {
        let desc = descriptor(1);
        let raw = encode(&desc).unwrap();
        assert_eq!(decode(Some(raw.as_slice())).unwrap(), desc);
    }

    #[test]
    fn test_decode_foreign_record() {
        // Record written by another client, with an unknown metadata field
        let raw = br#"{"name":"test","hostname":"10.1.1.1","host":"10.1.1.1:8080","url":"http://10.1.1.1:8080","port":8080,"inserted":1}"#;
        let desc = decode(Some(&raw[..])).unwrap();
        assert_eq!(desc.port, Some(8080));
        assert_eq!(desc.meta("inserted"), Some(&serde_json::json!(1)));
    }

    #[test]
    fn test_decode_all_keeps_string_port_records() {
        let raw = vec![
            Some(br#"{"name":"api","hostname":"10.1.1.1","host":"10.1.1.1:8080","url":"http://10.1.1.1:8080","port":"8080"}"#.to_vec()),
            Some(encode(&descriptor(1)).unwrap()),
        ];

        let list = decode_all(&raw, |idx, e| panic!("record {idx} dropped: {e}"));
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].url, "http://10.1.1.1:8080");
        assert_eq!(list[0].port, None);
        assert_eq!(list[0].meta("port"), Some(&serde_json::json!("8080")));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode(None), Err(DecodeError::Missing)));
        assert!(matches!(decode(Some(&b"{not json"[..])), Err(DecodeError::Json(_))));
        assert!(matches!(decode(Some(&b"null"[..])), Err(DecodeError::Json(_))));
        assert!(matches!(decode(Some(&b"{\"name\":\"x\"}"[..])), Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_decode_all_drops_bad_entries() {
        let raw = vec![
            Some(encode(&descriptor(1)).unwrap()),
            Some(b"{truncated".to_vec()),
            None,
            Some(encode(&descriptor(2)).unwrap()),
        ];

        let mut dropped = Vec::new();
        let list = decode_all(&raw, |idx, _| dropped.push(idx));

        assert_eq!(list.len(), 2);
        assert_eq!(dropped, vec![1, 2]);
        assert_eq!(list[0].port, Some(1));
        assert_eq!(list[1].port, Some(2));
    }
}
