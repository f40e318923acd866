//! Input normalization — classifies a raw inbound message.

use crate::error::CaptureError;
use crate::pipeline::types::{InboundMessage, NormalizedInput};

/// Classify an inbound message into a normalized payload.
///
/// Consumes the message (payload bytes move into the variant). An
/// unrecognized kind tag is fatal for this message only.
pub fn normalize(message: InboundMessage) -> Result<NormalizedInput, CaptureError> {
    match message.kind.as_str() {
        "text" => {
            let body = String::from_utf8(message.payload).map_err(|_| {
                CaptureError::UnsupportedInputKind("text (invalid UTF-8)".into())
            })?;
            Ok(NormalizedInput::Text(body))
        }
        "voice" => Ok(NormalizedInput::Voice(message.payload)),
        "photo" => Ok(NormalizedInput::Photo {
            image: message.payload,
            caption: message.caption,
        }),
        other => Err(CaptureError::UnsupportedInputKind(other.to_string())),
    }
}
