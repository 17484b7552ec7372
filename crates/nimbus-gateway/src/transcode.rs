//! Response transcoding: unwrap the invocation envelope into the plain
//! payload a caller expects.

use nimbus_common::{GatewayError, InvocationEnvelope};
use serde_json::Value;
use tracing::debug;

/// Extract the caller-facing body from a raw envelope.
///
/// A textual payload is returned byte-for-byte, without quoting; anything
/// else is serialized back to JSON. The returned length replaces whatever
/// content length the envelope response carried. Execution metadata is
/// logged here and not surfaced to the caller.
pub fn transcode_envelope(raw: &[u8]) -> nimbus_common::Result<(Vec<u8>, usize)> {
    let envelope: InvocationEnvelope =
        serde_json::from_slice(raw).map_err(|e| GatewayError::Transcode(e.to_string()))?;

    debug!(
        execution_time_ms = envelope.process_metadata.execution_time_ms,
        log_lines = envelope.process_metadata.logs.len(),
        "function execution metadata"
    );

    let body = match envelope.payload {
        Value::String(text) => text.into_bytes(),
        payload => serde_json::to_vec(&payload)
            .map_err(|e| GatewayError::Transcode(e.to_string()))?,
    };

    let content_length = body.len();
    Ok((body, content_length))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_payload_is_returned_verbatim() {
        let raw = br#"{"payload":"hello","process_metadata":{"execution_time_ms":3,"logs":[]}}"#;
        let (body, len) = transcode_envelope(raw).unwrap();
        assert_eq!(body, b"hello");
        assert_eq!(len, 5);
    }

    #[test]
    fn object_payload_is_serialized_as_json() {
        let raw = br#"{"payload":{"a":1},"process_metadata":{"execution_time_ms":3,"logs":[]}}"#;
        let (body, len) = transcode_envelope(raw).unwrap();
        assert_eq!(body, br#"{"a":1}"#);
        assert_eq!(len, body.len());
    }

    #[test]
    fn array_payload_is_serialized_as_json() {
        let raw = br#"{"payload":[1,2,3],"process_metadata":{}}"#;
        let (body, _) = transcode_envelope(raw).unwrap();
        assert_eq!(body, b"[1,2,3]");
    }

    #[test]
    fn malformed_envelope_is_a_transcode_error() {
        let err = transcode_envelope(b"not json at all").unwrap_err();
        assert!(matches!(err, GatewayError::Transcode(_)));
    }

    #[test]
    fn missing_metadata_is_a_transcode_error() {
        let err = transcode_envelope(br#"{"payload":"x"}"#).unwrap_err();
        assert!(matches!(err, GatewayError::Transcode(_)));
    }
}
