//! Typed attribute values of the remote store.
//!
//! The JSON form of an [`AttributeValue`] lists every type key of the store's
//! wire representation (`B`, `BOOL`, `BS`, `L`, `M`, `N`, `NS`, `NULL`, `S`,
//! `SS`) with `null` for all but the one in use. Persisted pagination cursors
//! depend on this exact shape, see [`crate::cursor`].

use {
    base64::engine::general_purpose::STANDARD as BASE64,
    serde::{de::DeserializeOwned, Deserialize, Serialize},
    std::{collections::BTreeMap, str::FromStr},
};

/// Attribute map of a single item, keyed by attribute name.
///
/// Ordered, so that the serialized form of a map is deterministic.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// Value of a single attribute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireAttributeValue", try_from = "WireAttributeValue")]
pub enum AttributeValue {
    /// String.
    S(String),

    /// Number, kept in its decimal string form.
    N(String),

    /// Binary.
    B(Vec<u8>),

    /// Boolean.
    Bool(bool),

    /// Null.
    Null,

    /// Map of attributes.
    M(AttributeMap),

    /// List of attributes.
    L(Vec<AttributeValue>),

    /// String set.
    Ss(Vec<String>),

    /// Number set.
    Ns(Vec<String>),

    /// Binary set.
    Bs(Vec<Vec<u8>>),
}

impl AttributeValue {
    /// Creates a number attribute.
    pub fn number(n: impl Into<i64>) -> Self {
        Self::N(n.into().to_string())
    }

    /// Returns the wire type tag of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::B(_) => "B",
            Self::Bool(_) => "BOOL",
            Self::Null => "NULL",
            Self::M(_) => "M",
            Self::L(_) => "L",
            Self::Ss(_) => "SS",
            Self::Ns(_) => "NS",
            Self::Bs(_) => "BS",
        }
    }

    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the value of a number attribute holding an integer.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_n()?.parse().ok()
    }

    pub fn as_b(&self) -> Option<&[u8]> {
        match self {
            Self::B(b) => Some(b),
            _ => None,
        }
    }

    /// Converts any [`Serialize`] type into an [`AttributeValue`].
    ///
    /// Structs and maps become [`AttributeValue::M`], sequences become
    /// [`AttributeValue::L`].
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, ValueError> {
        serde_json::to_value(value)
            .map(Self::from_json)
            .map_err(ValueError::Serialize)
    }

    /// Deserializes this [`AttributeValue`] into `T`.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, ValueError> {
        serde_json::from_value(self.to_json()?).map_err(ValueError::Deserialize)
    }

    fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match value {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => Self::N(n.to_string()),
            Json::String(s) => Self::S(s),
            Json::Array(list) => Self::L(list.into_iter().map(Self::from_json).collect()),
            Json::Object(map) => Self::M(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    fn to_json(&self) -> Result<serde_json::Value, ValueError> {
        use serde_json::Value as Json;

        fn number(n: &str) -> Result<Json, ValueError> {
            serde_json::Number::from_str(n)
                .map(Json::Number)
                .map_err(|_| ValueError::InvalidNumber(n.to_owned()))
        }

        fn bytes(b: &[u8]) -> Json {
            Json::Array(b.iter().map(|byte| Json::from(*byte)).collect())
        }

        Ok(match self {
            Self::S(s) => Json::String(s.clone()),
            Self::N(n) => number(n)?,
            Self::B(b) => bytes(b),
            Self::Bool(b) => Json::Bool(*b),
            Self::Null => Json::Null,
            Self::M(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), v.to_json()?)))
                    .collect::<Result<_, ValueError>>()?,
            ),
            Self::L(list) => Json::Array(
                list.iter()
                    .map(Self::to_json)
                    .collect::<Result<_, _>>()?,
            ),
            Self::Ss(set) => Json::Array(set.iter().cloned().map(Json::String).collect()),
            Self::Ns(set) => Json::Array(
                set.iter()
                    .map(|n| number(n))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Bs(set) => Json::Array(set.iter().map(|b| bytes(b)).collect()),
        })
    }
}

/// Converts a [`Serialize`] struct or map into an [`AttributeMap`].
pub fn to_attribute_map<T: Serialize + ?Sized>(value: &T) -> Result<AttributeMap, ValueError> {
    match AttributeValue::from_serialize(value)? {
        AttributeValue::M(map) => Ok(map),
        other => Err(ValueError::NotAMap(other.type_name())),
    }
}

/// Deserializes an [`AttributeMap`] into `T`.
pub fn from_attribute_map<T: DeserializeOwned>(map: &AttributeMap) -> Result<T, ValueError> {
    AttributeValue::M(map.clone()).deserialize_into()
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::S(s.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::S(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        Self::N(n.to_string())
    }
}

impl From<i32> for AttributeValue {
    fn from(n: i32) -> Self {
        Self::N(n.to_string())
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(b: Vec<u8>) -> Self {
        Self::B(b)
    }
}

impl From<AttributeMap> for AttributeValue {
    fn from(map: AttributeMap) -> Self {
        Self::M(map)
    }
}

/// Error of converting between [`AttributeValue`]s and Rust types.
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    #[error("Failed to serialize value: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to deserialize value: {0}")]
    Deserialize(#[source] serde_json::Error),

    #[error("Expected a map, got {0}")]
    NotAMap(&'static str),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),
}

/// JSON shape of an [`AttributeValue`]: one nullable key per wire type.
#[derive(Default, Serialize, Deserialize)]
struct WireAttributeValue {
    #[serde(rename = "B", default, with = "base64_opt")]
    b: Option<Vec<u8>>,

    #[serde(rename = "BOOL", default)]
    bool: Option<bool>,

    #[serde(rename = "BS", default, with = "base64_list_opt")]
    bs: Option<Vec<Vec<u8>>>,

    #[serde(rename = "L", default)]
    l: Option<Vec<AttributeValue>>,

    #[serde(rename = "M", default)]
    m: Option<AttributeMap>,

    #[serde(rename = "N", default)]
    n: Option<String>,

    #[serde(rename = "NS", default)]
    ns: Option<Vec<String>>,

    #[serde(rename = "NULL", default)]
    null: Option<bool>,

    #[serde(rename = "S", default)]
    s: Option<String>,

    #[serde(rename = "SS", default)]
    ss: Option<Vec<String>>,
}

impl From<AttributeValue> for WireAttributeValue {
    fn from(value: AttributeValue) -> Self {
        let mut wire = Self::default();

        match value {
            AttributeValue::S(s) => wire.s = Some(s),
            AttributeValue::N(n) => wire.n = Some(n),
            AttributeValue::B(b) => wire.b = Some(b),
            AttributeValue::Bool(b) => wire.bool = Some(b),
            AttributeValue::Null => wire.null = Some(true),
            AttributeValue::M(m) => wire.m = Some(m),
            AttributeValue::L(l) => wire.l = Some(l),
            AttributeValue::Ss(ss) => wire.ss = Some(ss),
            AttributeValue::Ns(ns) => wire.ns = Some(ns),
            AttributeValue::Bs(bs) => wire.bs = Some(bs),
        }

        wire
    }
}

impl TryFrom<WireAttributeValue> for AttributeValue {
    type Error = String;

    fn try_from(wire: WireAttributeValue) -> Result<Self, Self::Error> {
        let WireAttributeValue {
            b,
            bool,
            bs,
            l,
            m,
            n,
            ns,
            null,
            s,
            ss,
        } = wire;

        let candidates = [
            b.map(Self::B),
            bool.map(Self::Bool),
            bs.map(Self::Bs),
            l.map(Self::L),
            m.map(Self::M),
            n.map(Self::N),
            ns.map(Self::Ns),
            null.filter(|null| *null).map(|_| Self::Null),
            s.map(Self::S),
            ss.map(Self::Ss),
        ];

        let mut values = candidates.into_iter().flatten();

        match (values.next(), values.next()) {
            (Some(value), None) => Ok(value),
            (None, _) => Err("attribute value has no type".to_owned()),
            (Some(_), Some(_)) => Err("attribute value has more than one type".to_owned()),
        }
    }
}

mod base64_opt {
    use {
        super::BASE64,
        base64::Engine as _,
        serde::{de::Error as _, Deserialize, Deserializer, Serializer},
    };

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_some(&BASE64.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|s| BASE64.decode(s).map_err(D::Error::custom))
            .transpose()
    }
}

mod base64_list_opt {
    use {
        super::BASE64,
        base64::Engine as _,
        serde::{de::Error as _, Deserialize, Deserializer, Serializer},
    };

    pub fn serialize<S: Serializer>(
        value: &Option<Vec<Vec<u8>>>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(list) => s.serialize_some(
                &list
                    .iter()
                    .map(|bytes| BASE64.encode(bytes))
                    .collect::<Vec<_>>(),
            ),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<Vec<Vec<u8>>>, D::Error> {
        Option::<Vec<String>>::deserialize(d)?
            .map(|list| {
                list.into_iter()
                    .map(|s| BASE64.decode(s).map_err(D::Error::custom))
                    .collect()
            })
            .transpose()
    }
}
