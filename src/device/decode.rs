use log::{debug, warn};

use crate::device::constants::PAYLOAD_SEPARATOR;
use crate::device::types::{LetterEvent, SensorPayload};
use crate::error::DeviceFault;

/// Letters, space and apostrophe are the only symbols a capture accepts.
pub fn is_letter_symbol(symbol: char) -> bool {
    symbol.is_alphabetic() || symbol == ' ' || symbol == '\''
}

/// Decode one notification from the letter characteristic.
///
/// Every notification is self-contained: the first character is the detected letter, optionally
/// followed by PAYLOAD_SEPARATOR and a JSON object with sensor readings. A payload that fails to
/// parse is dropped but the letter is kept.
pub fn decode_notification(value: &[u8]) -> Result<LetterEvent, DeviceFault> {
    let text = String::from_utf8_lossy(value);
    let mut chars = text.chars();

    let letter = match chars.next() {
        Some(symbol) if is_letter_symbol(symbol) => symbol,
        _ => return Err(DeviceFault::DecodeIgnored(value.to_vec())),
    };

    let rest = chars.as_str();
    let payload = match rest.strip_prefix(PAYLOAD_SEPARATOR) {
        Some(json) => match serde_json::from_str::<SensorPayload>(json) {
            Ok(payload) => Some(payload),
            Err(err) => {
                warn!("Failed to decode sensor payload for {:?}: {}", letter, err);
                None
            },
        },
        None => {
            if !rest.is_empty() {
                debug!("Ignoring trailing notification data {:?}", rest);
            }
            None
        },
    };

    Ok(LetterEvent { letter, payload })
}
