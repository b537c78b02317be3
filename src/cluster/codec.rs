//! Wire encoding for notifications on a topic.
//!
//! Payloads are JSON envelopes carrying a format version:
//!
//! ```json
//! {"v":1,"notification":{"path":"styles/foo.sld","kind":"ENTRY_MODIFY",...}}
//! ```

use crate::cluster::TopicMessage;
use crate::core::ResourceNotification;
use crate::error::{NotifyError, Result};
use serde::{Deserialize, Serialize};

/// Envelope version written by [`encode`].
pub const WIRE_VERSION: u8 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    v: u8,
    notification: &'a ResourceNotification,
}

#[derive(Deserialize)]
struct Envelope {
    v: u8,
    notification: ResourceNotification,
}

/// Serialize a notification into a topic message.
///
/// # Errors
///
/// Returns [`NotifyError::Codec`] if serialization fails.
pub fn encode(notification: &ResourceNotification) -> Result<TopicMessage> {
    let payload = serde_json::to_vec(&EnvelopeRef {
        v: WIRE_VERSION,
        notification,
    })?;
    Ok(TopicMessage { payload })
}

/// Deserialize a notification from a topic message.
///
/// Paths are normalized, so a peer sending `/styles/foo.sld` reaches
/// listeners registered on `styles/foo.sld`.
///
/// # Errors
///
/// Returns [`NotifyError::Codec`] for invalid JSON, a missing field or an
/// unsupported envelope version.
pub fn decode(message: &TopicMessage) -> Result<ResourceNotification> {
    let envelope: Envelope = serde_json::from_slice(&message.payload)?;
    if envelope.v != WIRE_VERSION {
        return Err(NotifyError::Codec(format!(
            "unsupported envelope version {}",
            envelope.v
        )));
    }
    Ok(envelope.notification.normalized())
}
