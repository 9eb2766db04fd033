use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    error::{Error, Result},
    value::Value,
};

/// Two-field reply returned by every enveloped host function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub value: Option<T>,
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub const fn ok(value: T) -> Self {
        Self {
            value: Some(value),
            error: None,
        }
    }
}

impl Envelope<()> {
    #[must_use]
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            value: None,
            error: Some(message.into()),
        }
    }
}

impl<T: Serialize> Envelope<T> {
    /// # Errors
    /// Returns an error if `T` cannot be serialized.
    pub fn to_value(&self) -> Result<Value> {
        Ok(Value::from_serde(self)?)
    }
}

/// Opens an envelope.
///
/// Returns the payload, or `None` when the host sent a null value.
///
/// # Errors
/// [`Error::Protocol`] unless `raw` is a map carrying both `value` and
/// `error`; [`Error::Delegate`] with the host's message, unaltered, when
/// `error` is a non-empty string.
pub fn decode_envelope(raw: &Value) -> Result<Option<serde_json::Value>> {
    let json = raw
        .to_json_value()
        .map_err(|e| Error::Protocol(format!("unreadable envelope: {e}")))?;
    let serde_json::Value::Object(mut fields) = json else {
        return Err(Error::Protocol(format!("envelope must be a map, got {json}")));
    };
    let (Some(value), Some(error)) = (fields.remove("value"), fields.remove("error")) else {
        return Err(Error::Protocol(
            "envelope must carry both value and error fields".to_owned(),
        ));
    };

    match error {
        serde_json::Value::Null => {}
        serde_json::Value::String(message) if message.is_empty() => {}
        serde_json::Value::String(message) => return Err(Error::Delegate(message)),
        other => {
            return Err(Error::Protocol(format!(
                "envelope error must be a string, got {other}"
            )));
        }
    }

    Ok((!value.is_null()).then_some(value))
}

/// Opens an envelope and parses its payload as `T`.
///
/// # Errors
/// See [`decode_envelope`]; additionally [`Error::Decode`] when the payload
/// does not match `T`.
pub fn decode_payload<T: DeserializeOwned>(raw: &Value) -> Result<Option<T>> {
    decode_envelope(raw)?
        .map(|v| serde_json::from_value(v).map_err(|e| Error::Decode(e.to_string())))
        .transpose()
}

/// Like [`decode_payload`] but a null payload is a decode fault.
///
/// # Errors
/// See [`decode_payload`].
pub fn decode_required<T: DeserializeOwned>(raw: &Value, what: &str) -> Result<T> {
    decode_payload(raw)?.ok_or_else(|| Error::Decode(format!("{what}: missing value")))
}
