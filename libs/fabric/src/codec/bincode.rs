use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::Codec;
use crate::error::{Error, Result};

/// Bincode codec with fixed-width integers, so fixed-layout records always
/// occupy the same number of bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(|e| Error::Codec(e.to_string()))
    }

    fn encode_into<T: Serialize>(&self, value: &T, buf: &mut [u8]) -> Result<usize> {
        let size = bincode::serialized_size(value).map_err(|e| Error::Codec(e.to_string()))? as usize;
        if size > buf.len() {
            return Err(Error::PayloadTooLarge {
                size,
                capacity: buf.len(),
            });
        }
        bincode::serialize_into(&mut buf[..size], value).map_err(|e| Error::Codec(e.to_string()))?;
        Ok(size)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes).map_err(|e| Error::Codec(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Pair {
        a: u64,
        b: u64,
    }

    #[test]
    fn encode_into_reports_written_size() {
        let mut buf = [0u8; 64];
        let written = BincodeCodec.encode_into(&Pair { a: 2, b: 4 }, &mut buf).unwrap();
        assert_eq!(written, 16);

        let decoded: Pair = BincodeCodec.decode(&buf[..written]).unwrap();
        assert_eq!(decoded, Pair { a: 2, b: 4 });
    }

    #[test]
    fn encode_into_rejects_small_buffer() {
        let mut buf = [0u8; 8];
        let err = BincodeCodec.encode_into(&Pair { a: 1, b: 1 }, &mut buf).unwrap_err();
        assert_eq!(err, Error::PayloadTooLarge { size: 16, capacity: 8 });
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let bytes = BincodeCodec.encode(&Pair { a: 1, b: 2 }).unwrap();
        let result: Result<Pair> = BincodeCodec.decode(&bytes[..4]);
        assert!(matches!(result, Err(Error::Codec(_))));
    }
}
