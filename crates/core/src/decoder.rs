//! Raw payload decoding

use crate::{DecodeError, DecodeResult, Event};

/// Decode one JSON payload into an [`Event`].
///
/// Structural problems (bad JSON, missing fields, unknown kind, non-numeric
/// price) and semantically unusable values (non-finite price, blank subject)
/// are all reported as [`DecodeError`].
pub fn decode(payload: &[u8]) -> DecodeResult<Event> {
    let event: Event = serde_json::from_slice(payload)
        .map_err(|e| DecodeError::InvalidPayload(e.to_string()))?;

    if !event.price.is_finite() {
        return Err(DecodeError::NonFinitePrice(event.price));
    }
    if event.subject.trim().is_empty() {
        return Err(DecodeError::EmptySubject);
    }

    Ok(event)
}
