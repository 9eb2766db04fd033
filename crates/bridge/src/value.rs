use std::{
    convert::Infallible,
    io::{self, Write},
};

use bytes::{Bytes, BytesMut};
use serde::{Serialize, de::DeserializeOwned};

/// Encoded CBOR `null`.
const NULL: &[u8] = &[0xf6];

/// Value crossing the sandbox/host boundary, held as opaque CBOR bytes.
///
/// Host objects receive their arguments and return their results as `Value`s;
/// the bridge never shares memory with the host beyond these buffers.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Value(Bytes);

impl Default for Value {
    fn default() -> Self {
        Self::null()
    }
}

impl Value {
    #[must_use]
    pub const fn null() -> Self {
        Self(Bytes::from_static(NULL))
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.as_ref() == NULL
    }

    #[must_use]
    pub fn from_cbor(value: impl Into<Bytes>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_cbor(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Serialize a serde value.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn from_serde<T: Serialize + ?Sized>(value: &T) -> Result<Self, Error> {
        let mut serializer = minicbor_serde::Serializer::new(CborBuffer::default());
        value.serialize(serializer.serialize_unit_as_null(true))?;
        Ok(Self(serializer.into_encoder().into_writer().0.freeze()))
    }

    /// Deserialize into a serde value.
    ///
    /// # Errors
    /// Returns an error if the bytes are not CBOR or do not match `T`.
    pub fn to_serde<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let mut deserializer = minicbor_serde::Deserializer::new(self.as_cbor());
        Ok(T::deserialize(&mut deserializer)?)
    }

    /// Transcode a JSON document.
    ///
    /// # Errors
    /// Returns an error if `json` is not valid JSON.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let mut serializer = minicbor_serde::Serializer::new(CborBuffer::default());
        serde_transcode::Transcoder::new(&mut serde_json::Deserializer::from_str(json))
            .serialize(serializer.serialize_unit_as_null(true))?;
        Ok(Self(serializer.into_encoder().into_writer().0.freeze()))
    }

    /// Transcode into a JSON document. Byte strings become base64 strings.
    ///
    /// # Errors
    /// Returns an error if the bytes are not CBOR.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(String::from_utf8(self.to_json_bytes()?)?)
    }

    /// # Errors
    /// Returns an error if the bytes are not CBOR.
    pub fn to_json_value(&self) -> Result<serde_json::Value, Error> {
        serde_json::from_slice(&self.to_json_bytes()?).map_err(Error::from)
    }

    fn to_json_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut o = vec![];
        serde_transcode::Transcoder::new(&mut minicbor_serde::Deserializer::new(self.as_cbor()))
            .serialize(&mut serde_json::Serializer::with_formatter(
                &mut o,
                Base64Formatter,
            ))?;
        Ok(o)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CBOR decode error: {0}")]
    CborDecode(#[from] minicbor_serde::error::DecodeError),
    #[error("CBOR encode error: {0}")]
    CborEncode(#[from] minicbor_serde::error::EncodeError<Infallible>),
    #[error("UTF-8 encoding error")]
    Utf8(#[from] std::string::FromUtf8Error),
}

struct Base64Formatter;

impl serde_json::ser::Formatter for Base64Formatter {
    fn write_byte_array<W>(&mut self, mut writer: &mut W, value: &[u8]) -> io::Result<()>
    where
        W: io::Write + ?Sized,
    {
        writer.write_all(b"\"")?;
        base64::write::EncoderWriter::new(&mut writer, &base64::engine::general_purpose::STANDARD)
            .write_all(value)?;
        writer.write_all(b"\"")
    }
}

#[derive(Default)]
struct CborBuffer(BytesMut);

impl minicbor::encode::Write for CborBuffer {
    type Error = Infallible;

    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        self.0.extend_from_slice(buf);
        Ok(())
    }
}

impl From<Value> for Bytes {
    fn from(value: Value) -> Self {
        value.0
    }
}

impl AsRef<[u8]> for Value {
    fn as_ref(&self) -> &[u8] {
        self.as_cbor()
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        let mut encoder = minicbor::Encoder::new(CborBuffer::default());
        // the buffer is infallible
        let _ = encoder.str(value);
        Self(encoder.into_writer().0.freeze())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        let mut encoder = minicbor::Encoder::new(CborBuffer::default());
        let _ = encoder.u64(value);
        Self(encoder.into_writer().0.freeze())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self(Bytes::from_static(if value { &[0xf5] } else { &[0xf4] }))
    }
}
