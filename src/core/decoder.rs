//! Pluggable conversion from raw backend bytes to typed values.

use crate::error::VarError;
use std::error::Error as StdError;
use std::sync::Arc;

/// Error type returned by decode functions.
pub type DecodeError = Box<dyn StdError + Send + Sync>;

type DecodeFn<T> = Arc<dyn Fn(&[u8]) -> std::result::Result<T, DecodeError> + Send + Sync>;

/// Converts the raw bytes stored in a backend into a typed value.
///
/// Decoders should be pure: the watch loop may call them on every version change
/// and skips them entirely when the version is unchanged.
///
/// # Examples
///
/// ```rust
/// use runtimevar::core::Decoder;
///
/// let decoder = Decoder::new(|bytes: &[u8]| {
///     let text = std::str::from_utf8(bytes)?;
///     Ok(text.trim().parse::<u32>()?)
/// });
///
/// assert_eq!(decoder.decode(b" 42 ").unwrap(), 42);
/// assert!(decoder.decode(b"forty-two").is_err());
/// ```
pub struct Decoder<T> {
    decode: DecodeFn<T>,
}

impl<T> Decoder<T> {
    /// Wrap a decode function.
    pub fn new<F>(decode: F) -> Self
    where
        F: Fn(&[u8]) -> std::result::Result<T, DecodeError> + Send + Sync + 'static,
    {
        Self {
            decode: Arc::new(decode),
        }
    }

    /// Decode `bytes`, mapping failures to [`VarError::Decode`].
    pub fn decode(&self, bytes: &[u8]) -> Result<T, VarError> {
        (self.decode)(bytes).map_err(|e| VarError::Decode(e.to_string()))
    }
}

impl Decoder<Vec<u8>> {
    /// Pass the raw bytes through unchanged.
    pub fn bytes() -> Self {
        Self::new(|bytes| Ok(bytes.to_vec()))
    }
}

impl Decoder<String> {
    /// Decode the bytes as UTF-8 text.
    pub fn string() -> Self {
        Self::new(|bytes| Ok(String::from_utf8(bytes.to_vec())?))
    }
}

#[cfg(feature = "json")]
impl<T: serde::de::DeserializeOwned> Decoder<T> {
    /// Deserialize the bytes as JSON.
    pub fn json() -> Self {
        Self::new(|bytes| Ok(serde_json::from_slice(bytes)?))
    }
}

#[cfg(feature = "yaml")]
impl<T: serde::de::DeserializeOwned> Decoder<T> {
    /// Deserialize the bytes as YAML.
    pub fn yaml() -> Self {
        Self::new(|bytes| Ok(serde_yaml::from_slice(bytes)?))
    }
}

#[cfg(feature = "toml")]
impl<T: serde::de::DeserializeOwned> Decoder<T> {
    /// Deserialize the bytes as TOML.
    pub fn toml() -> Self {
        Self::new(|bytes| {
            let text = std::str::from_utf8(bytes)?;
            Ok(toml::from_str(text)?)
        })
    }
}

impl<T> Clone for Decoder<T> {
    fn clone(&self) -> Self {
        Self {
            decode: Arc::clone(&self.decode),
        }
    }
}
