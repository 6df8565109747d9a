//! Binary payloads and the decoding hook used when casting text to `Binary`.
//!
//! Validation works on [`BinaryValue`], an in-memory mime-typed payload.
//! Other byte sources (files, network bodies) plug in through
//! [`BinarySource`] and are materialized once with
//! [`BinaryValue::read_from`].

use std::fmt;
use std::io::{self, Cursor, Read};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;

/// Mime type assigned to raw bytes and bare base64 input.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Mime type of a data URI that does not declare one.
const DATA_URI_DEFAULT_MIME: &str = "text/plain";

/// A re-readable, mime-typed byte source.
pub trait BinarySource: Send + Sync + fmt::Debug {
    /// Mime type of the content.
    fn mime_type(&self) -> &str;

    /// Byte length, or `None` when unknown until read.
    fn byte_len(&self) -> Option<u64>;

    /// Opens a fresh reader positioned at the start of the content.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the underlying source cannot be opened.
    fn open(&self) -> io::Result<Box<dyn Read + '_>>;
}

/// Mime-typed binary content held in memory.
///
/// Cloning is cheap: the payload is reference-counted [`Bytes`].
#[derive(Clone, PartialEq, Eq)]
pub struct BinaryValue {
    mime_type: String,
    data: Bytes,
}

impl BinaryValue {
    #[must_use]
    pub fn new(mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Wraps raw bytes as `application/octet-stream`.
    #[must_use]
    pub fn octet_stream(data: impl Into<Bytes>) -> Self {
        Self::new(OCTET_STREAM, data)
    }

    /// Reads an arbitrary [`BinarySource`] fully into memory.
    ///
    /// # Errors
    ///
    /// Propagates any I/O error raised while opening or reading the source.
    pub fn read_from(source: &dyn BinarySource) -> io::Result<Self> {
        let capacity = source
            .byte_len()
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or(0);
        let mut buf = Vec::with_capacity(capacity);
        source.open()?.read_to_end(&mut buf)?;
        Ok(Self::new(source.mime_type(), buf))
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Encodes the payload as a base64 `data:` URI.
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }
}

impl fmt::Debug for BinaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryValue")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

impl BinarySource for BinaryValue {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn byte_len(&self) -> Option<u64> {
        u64::try_from(self.data.len()).ok()
    }

    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(Cursor::new(self.data.clone())))
    }
}

/// Decodes a `data:` URI or bare standard base64 into a [`BinaryValue`].
///
/// `data:<mime>;base64,<payload>` keeps the declared mime type; a data URI
/// without the `base64` marker takes its payload bytes verbatim. Bare base64
/// decodes to `application/octet-stream`. Returns `None` when the input is
/// neither.
#[must_use]
pub fn parse_binary(input: &str) -> Option<BinaryValue> {
    let input = input.trim();
    let Some(rest) = input.strip_prefix("data:") else {
        return STANDARD.decode(input).ok().map(BinaryValue::octet_stream);
    };

    let (meta, payload) = rest.split_once(',')?;
    let mut params = meta.split(';');
    let mime = params
        .next()
        .filter(|m| !m.is_empty())
        .unwrap_or(DATA_URI_DEFAULT_MIME)
        .to_owned();
    let is_base64 = params.any(|p| p.eq_ignore_ascii_case("base64"));

    let data = if is_base64 {
        STANDARD.decode(payload).ok()?
    } else {
        payload.as_bytes().to_vec()
    };
    Some(BinaryValue::new(mime, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_base64_data_uri() {
        let binary = parse_binary("data:image/png;base64,AAEC").expect("decodes");
        assert_eq!(binary.mime_type(), "image/png");
        assert_eq!(binary.as_bytes(), &[0, 1, 2]);
    }

    #[test]
    fn parses_bare_base64_as_octet_stream() {
        let binary = parse_binary("aGVsbG8=").expect("decodes");
        assert_eq!(binary.mime_type(), OCTET_STREAM);
        assert_eq!(binary.as_bytes(), b"hello");
    }

    #[test]
    fn plain_data_uri_keeps_payload() {
        let binary = parse_binary("data:,hi").expect("decodes");
        assert_eq!(binary.mime_type(), DATA_URI_DEFAULT_MIME);
        assert_eq!(binary.as_bytes(), b"hi");
    }

    #[test]
    fn rejects_invalid_input() {
        assert!(parse_binary("not base64!").is_none());
        assert!(parse_binary("data:image/png;base64").is_none());
        assert!(parse_binary("data:image/png;base64,@@@").is_none());
    }

    #[test]
    fn data_uri_roundtrip() {
        let binary = BinaryValue::new("application/pdf", b"%PDF".to_vec());
        assert_eq!(parse_binary(&binary.to_data_uri()), Some(binary));
    }

    #[test]
    fn source_is_rereadable() {
        let binary = BinaryValue::octet_stream(b"abc".to_vec());
        for _ in 0..2 {
            let mut out = Vec::new();
            binary.open().expect("open").read_to_end(&mut out).expect("read");
            assert_eq!(out, b"abc");
        }
        assert_eq!(binary.byte_len(), Some(3));
    }

    #[test]
    fn read_from_copies_source() {
        let source = BinaryValue::new("text/csv", b"a,b".to_vec());
        let copy = BinaryValue::read_from(&source).expect("read");
        assert_eq!(copy, source);
    }
}
