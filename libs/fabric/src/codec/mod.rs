use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

pub mod bincode;

pub use self::bincode::BincodeCodec;

/// Codec trait for serializing and deserializing payload records
pub trait Codec: Send + Sync {
    /// Encode a value into bytes
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Encode a value directly into a loaned buffer, returning the bytes written
    ///
    /// Fails with `PayloadTooLarge` without touching `buf` if the value does not fit.
    fn encode_into<T: Serialize>(&self, value: &T, buf: &mut [u8]) -> Result<usize>;

    /// Decode bytes into a value
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}
