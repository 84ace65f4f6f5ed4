use std::str::Utf8Error;

use bytes::Bytes;

/// One application-level message unit: data bytes plus optional metadata.
///
/// Immutable once built. Cloning is cheap (reference-counted buffers), but
/// each exchange consumes its request payload exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    data: Bytes,
    metadata: Option<Bytes>,
}

impl Payload {
    /// Payload with data only.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            metadata: None,
        }
    }

    /// Payload with data and metadata.
    pub fn with_metadata(data: impl Into<Bytes>, metadata: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            metadata: Some(metadata.into()),
        }
    }

    /// Payload with neither data nor metadata.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn metadata(&self) -> Option<&Bytes> {
        self.metadata.as_ref()
    }

    pub fn has_metadata(&self) -> bool {
        self.metadata.is_some()
    }

    /// Data interpreted as UTF-8 text.
    pub fn data_utf8(&self) -> std::result::Result<&str, Utf8Error> {
        std::str::from_utf8(&self.data)
    }

    /// Consume into `(data, metadata)`.
    pub fn into_parts(self) -> (Bytes, Option<Bytes>) {
        (self.data, self.metadata)
    }
}

impl From<&'static str> for Payload {
    fn from(value: &'static str) -> Self {
        Self::new(Bytes::from_static(value.as_bytes()))
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

impl From<Bytes> for Payload {
    fn from(value: Bytes) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_view_of_data() {
        let payload = Payload::from("%Y-%m-%d");
        assert_eq!(payload.data_utf8().unwrap(), "%Y-%m-%d");
        assert!(!payload.has_metadata());
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let payload = Payload::new(vec![0xff, 0xfe, 0x41]);
        assert!(payload.data_utf8().is_err());
    }

    #[test]
    fn into_parts_keeps_metadata() {
        let payload = Payload::with_metadata("data", Bytes::from_static(b"meta"));
        let (data, metadata) = payload.into_parts();
        assert_eq!(data.as_ref(), b"data");
        assert_eq!(metadata.as_deref(), Some(b"meta".as_ref()));
    }
}
