//! Envelope Codec: ledger entities to host views and back, plus the
//! success/error envelope spoken by host functions.

pub mod algo;
pub mod envelope;
pub mod wire;

use serde::{Serialize, de::DeserializeOwned};

pub use envelope::{Envelope, decode_envelope, decode_payload, decode_required};
pub use wire::NetworkParameters;

use crate::{
    error::{Error, Result},
    value::Value,
};

/// An entity with a stable host-facing view.
pub trait Wire: Sized {
    type View: Serialize + DeserializeOwned;

    /// # Errors
    /// [`Error::Encoding`] when a field has no wire representation.
    fn to_view(&self) -> Result<Self::View>;

    /// # Errors
    /// [`Error::Decode`] on malformed hex, timestamps, or codes.
    fn from_view(view: Self::View) -> Result<Self>;
}

impl<T: Wire> Wire for Vec<T> {
    type View = Vec<T::View>;

    fn to_view(&self) -> Result<Self::View> {
        self.iter().map(Wire::to_view).collect()
    }

    fn from_view(view: Self::View) -> Result<Self> {
        view.into_iter().map(T::from_view).collect()
    }
}

/// # Errors
/// See [`Wire::to_view`].
pub fn encode<T: Wire>(entity: &T) -> Result<Value> {
    Ok(Value::from_serde(&entity.to_view()?)?)
}

/// # Errors
/// [`Error::Decode`] when `raw` is not a view of `T`.
pub fn decode<T: Wire>(raw: &Value) -> Result<T> {
    let view = raw
        .to_serde::<T::View>()
        .map_err(|e| Error::Decode(e.to_string()))?;
    T::from_view(view)
}

/// Decodes an entity from an already opened envelope payload.
///
/// # Errors
/// [`Error::Decode`] when `json` is not a view of `T`.
pub fn decode_json<T: Wire>(json: serde_json::Value) -> Result<T> {
    let view = serde_json::from_value::<T::View>(json).map_err(|e| Error::Decode(e.to_string()))?;
    T::from_view(view)
}

/// Opens an envelope and decodes the entity inside it.
///
/// # Errors
/// See [`decode_envelope`] and [`decode_json`].
pub fn decode_enveloped<T: Wire>(raw: &Value, what: &str) -> Result<T> {
    let json =
        decode_envelope(raw)?.ok_or_else(|| Error::Decode(format!("{what}: missing value")))?;
    decode_json(json)
}
