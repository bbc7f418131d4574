//! Opaque pagination cursors.
//!
//! A cursor is the store's "last evaluated key" serialized to JSON, gzipped
//! and Base58 (Bitcoin alphabet) encoded. Changing any of these steps breaks
//! cursors already handed out to clients.

use {
    crate::attribute::AttributeMap,
    flate2::{read::GzDecoder, write::GzEncoder, Compression},
    serde::Deserialize as _,
    std::io::{self, Write as _},
    tap::TapFallible as _,
};

/// Error of encoding or decoding a cursor.
#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    #[error("Invalid base58 encoding: {0}")]
    Encoding(#[from] bs58::decode::Error),

    #[error("Invalid compression stream: {0}")]
    Compression(#[from] io::Error),

    #[error("Invalid key structure: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Encodes a key into an opaque cursor.
pub fn encode(key: &AttributeMap) -> Result<String, CursorError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());

    serde_json::to_writer(&mut encoder, key)?;
    encoder.write_all(b"\n")?;

    Ok(bs58::encode(encoder.finish()?).into_string())
}

/// Decodes a cursor produced by [`encode`].
///
/// The gzip stream is only read as far as the JSON document extends, so
/// cursors whose stream was flushed without a trailer are accepted too.
pub fn decode(cursor: &str) -> Result<AttributeMap, CursorError> {
    let data = bs58::decode(cursor)
        .into_vec()
        .tap_err(|err| tracing::debug!(?err, "cursor is not valid base58"))?;

    let mut de = serde_json::Deserializer::from_reader(GzDecoder::new(data.as_slice()));

    AttributeMap::deserialize(&mut de)
        .tap_err(|err| tracing::debug!(?err, "failed to decode cursor"))
        .map_err(|err| match err.classify() {
            serde_json::error::Category::Io => CursorError::Compression(err.into()),
            _ => CursorError::Serialization(err),
        })
}

#[cfg(test)]
mod tests {
    use {super::*, crate::attribute::AttributeValue};

    /// Cursor handed out by earlier releases, which never closed the gzip stream.
    const LEGACY_CURSOR: &str = "43hq9ZEtH5MmQ4HqcunoWHkJBoQUnu22Dsa1L9xdfG7ReiUJqPULC8AqoQxYg3jswJH4gGSncjrachbipBHxxmvTAryjUCj2sTomdzs8";

    fn key(attrs: &[(&str, AttributeValue)]) -> AttributeMap {
        attrs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn decodes_legacy_cursor() {
        assert_eq!(
            decode(LEGACY_CURSOR).unwrap(),
            key(&[("id", "welcome".into())])
        );
    }

    #[test]
    fn round_trip() {
        let keys = [
            key(&[]),
            key(&[("id", "agent".into()), ("name", "a/b/c".into())]),
            key(&[
                ("id", "agent".into()),
                ("name", "k".into()),
                ("created", AttributeValue::number(20200103)),
                ("blob", AttributeValue::B(vec![0, 255, 7])),
            ]),
        ];

        for k in keys {
            let cursor = encode(&k).unwrap();
            assert_eq!(decode(&cursor).unwrap(), k);
        }
    }

    #[test]
    fn encoding_is_stable_and_opaque() {
        let k = key(&[("id", "agent".into()), ("name", "secret-key".into())]);

        let cursor = encode(&k).unwrap();
        assert_eq!(cursor, encode(&k).unwrap());
        assert!(!cursor.contains("secret"));
        assert!(cursor.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn malformed_cursors_are_rejected() {
        // '0', 'O', 'I' and 'l' are not in the base58 alphabet.
        assert!(matches!(decode("0OIl"), Err(CursorError::Encoding(_))));

        // Valid base58 but not a gzip stream.
        let not_gzip = bs58::encode(b"definitely not gzip").into_string();
        assert!(matches!(decode(&not_gzip), Err(CursorError::Compression(_))));

        // Valid gzip but not an attribute map.
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(br#"["not", "a", "map"]"#).unwrap();
        let not_map = bs58::encode(encoder.finish().unwrap()).into_string();
        assert!(matches!(decode(&not_map), Err(CursorError::Serialization(_))));
    }
}
