//! Conversion from raw bytes to cached values

use bytes::Bytes;

use crate::error::DecodeError;

/// A value the fetcher can build from downloaded or cached bytes
pub trait Resource: Send + Sync + Sized + 'static {
    /// Decode raw bytes into a value
    fn decode(bytes: Bytes) -> Result<Self, DecodeError>;

    /// Weight counted against the memory cache's size limit
    fn weight(&self) -> usize {
        0
    }
}

impl Resource for Bytes {
    fn decode(bytes: Bytes) -> Result<Self, DecodeError> {
        Ok(bytes)
    }

    fn weight(&self) -> usize {
        self.len()
    }
}

impl Resource for String {
    fn decode(bytes: Bytes) -> Result<Self, DecodeError> {
        String::from_utf8(bytes.to_vec()).map_err(|e| DecodeError::new(e.to_string()))
    }

    fn weight(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_identity() {
        let value = Bytes::decode(Bytes::from_static(b"abc")).unwrap();
        assert_eq!(&value[..], b"abc");
        assert_eq!(value.weight(), 3);
    }

    #[test]
    fn test_string_rejects_invalid_utf8() {
        assert!(String::decode(Bytes::from_static(&[0xff, 0xfe])).is_err());
        assert_eq!(String::decode(Bytes::from_static(b"hi")).unwrap(), "hi");
    }
}
