//! Mapping between store items and [`KvPair`]s.

use {
    crate::attribute::{self, AttributeMap, AttributeValue, ValueError},
    base64::{engine::general_purpose::STANDARD as BASE64, Engine as _},
    serde::de::DeserializeOwned,
};

/// Name of the partition (hash) key attribute.
pub const PARTITION_KEY_ATTRIBUTE: &str = "id";

/// Name of the sort (range) key attribute.
pub const SORT_KEY_ATTRIBUTE: &str = "name";

/// Name of the optimistic locking version attribute.
pub const VERSION_ATTRIBUTE: &str = "version";

/// Name of the expiry (Unix seconds) attribute.
pub const EXPIRES_ATTRIBUTE: &str = "expires";

/// Name of the attribute holding the record value.
pub const PAYLOAD_ATTRIBUTE: &str = "payload";

/// Attribute names callers can't use as extra fields.
pub const RESERVED_FIELDS: [&str; 5] = [
    PARTITION_KEY_ATTRIBUTE,
    SORT_KEY_ATTRIBUTE,
    VERSION_ATTRIBUTE,
    EXPIRES_ATTRIBUTE,
    PAYLOAD_ATTRIBUTE,
];

/// Indicates whether `name` is one of the [`RESERVED_FIELDS`].
pub fn is_reserved_field(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}

/// Stored record: `{partition, key, version, expires}` plus the payload and
/// the extra fields stored alongside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KvPair {
    pub partition: String,
    pub key: String,

    /// Number of successful writes of this record.
    pub version: i64,

    /// Unix timestamp (seconds) after which this record is considered
    /// deleted. `0` means it never expires.
    pub expires: i64,

    value: Option<AttributeValue>,
    fields: AttributeMap,
}

impl KvPair {
    /// Creates a [`KvPair`] without a value or fields.
    pub fn new(partition: impl Into<String>, key: impl Into<String>, version: i64) -> Self {
        Self {
            partition: partition.into(),
            key: key.into(),
            version,
            expires: 0,
            value: None,
            fields: AttributeMap::new(),
        }
    }

    /// Returns the raw payload attribute.
    pub fn value(&self) -> Option<&AttributeValue> {
        self.value.as_ref()
    }

    /// Returns the payload as a string, if it is a string attribute.
    pub fn string_value(&self) -> Option<&str> {
        self.value.as_ref()?.as_s()
    }

    /// Returns the payload as bytes.
    ///
    /// Binary attributes are returned as is, string attributes are expected
    /// to be base64 encoded (which is how
    /// [`WriteOptions::with_bytes`](crate::WriteOptions::with_bytes) stores
    /// them).
    pub fn bytes_value(&self) -> Option<Vec<u8>> {
        match self.value.as_ref()? {
            AttributeValue::B(bytes) => Some(bytes.clone()),
            AttributeValue::S(s) => BASE64.decode(s).ok(),
            _ => None,
        }
    }

    /// Deserializes the payload into `T`.
    pub fn decode_value<T: DeserializeOwned>(&self) -> Result<T, ValueError> {
        self.value
            .as_ref()
            .unwrap_or(&AttributeValue::Null)
            .deserialize_into()
    }

    /// Returns the extra (non-reserved) attributes of this record.
    pub fn fields(&self) -> &AttributeMap {
        &self.fields
    }

    /// Deserializes the extra fields into `T`.
    pub fn decode_fields<T: DeserializeOwned>(&self) -> Result<T, ValueError> {
        attribute::from_attribute_map(&self.fields)
    }

    /// Indicates whether this record is expired at `now` (Unix seconds).
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires != 0 && self.expires <= now
    }
}

/// Error of decoding a store item into a [`KvPair`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Missing attribute: {0}")]
    MissingAttribute(&'static str),

    #[error("Attribute {name} has type {actual}, expected {expected}")]
    InvalidType {
        name: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Attribute {name} is not an integer: {value}")]
    InvalidNumber { name: &'static str, value: String },
}

/// Decodes a store item into a [`KvPair`].
pub fn decode(item: &AttributeMap) -> Result<KvPair, DecodeError> {
    let mut fields = AttributeMap::new();
    for (name, value) in item {
        if !is_reserved_field(name) {
            fields.insert(name.clone(), value.clone());
        }
    }

    Ok(KvPair {
        partition: string_attribute(item, PARTITION_KEY_ATTRIBUTE)?,
        key: string_attribute(item, SORT_KEY_ATTRIBUTE)?,
        version: number_attribute(item, VERSION_ATTRIBUTE)?.unwrap_or_default(),
        expires: number_attribute(item, EXPIRES_ATTRIBUTE)?.unwrap_or_default(),
        value: item.get(PAYLOAD_ATTRIBUTE).cloned(),
        fields,
    })
}

/// Indicates whether the item's `expires` attribute is set and not in the
/// future at `now` (Unix seconds).
///
/// An unreadable `expires` attribute is treated as "never expires".
pub fn is_item_expired(item: &AttributeMap, now: i64) -> bool {
    match number_attribute(item, EXPIRES_ATTRIBUTE) {
        Ok(Some(expires)) => expires != 0 && expires <= now,
        _ => false,
    }
}

/// Builds the primary key of an item.
pub fn build_key(partition: &str, key: &str) -> AttributeMap {
    AttributeMap::from([
        (PARTITION_KEY_ATTRIBUTE.to_owned(), partition.into()),
        (SORT_KEY_ATTRIBUTE.to_owned(), key.into()),
    ])
}

fn string_attribute(item: &AttributeMap, name: &'static str) -> Result<String, DecodeError> {
    match item.get(name) {
        Some(AttributeValue::S(s)) => Ok(s.clone()),
        Some(other) => Err(DecodeError::InvalidType {
            name,
            expected: "S",
            actual: other.type_name(),
        }),
        None => Err(DecodeError::MissingAttribute(name)),
    }
}

fn number_attribute(item: &AttributeMap, name: &'static str) -> Result<Option<i64>, DecodeError> {
    match item.get(name) {
        Some(AttributeValue::N(n)) => {
            n.parse()
                .map(Some)
                .map_err(|_| DecodeError::InvalidNumber {
                    name,
                    value: n.clone(),
                })
        }
        Some(other) => Err(DecodeError::InvalidType {
            name,
            expected: "N",
            actual: other.type_name(),
        }),
        None => Ok(None),
    }
}
