//! Per-call read and write options.
//!
//! Options can be assembled either with the chained `with_*` setters or by
//! folding an ordered list of [`WriteOption`]s / [`ReadOption`]s over the
//! defaults. In both cases later options override earlier ones, except for
//! fields, which are merged key by key.

use {
    crate::{
        attribute::{AttributeMap, AttributeValue},
        codec::{self, KvPair},
        Error,
        Result,
    },
    base64::{engine::general_purpose::STANDARD as BASE64, Engine as _},
    std::time::Duration,
};

/// Expiry update applied by a write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Ttl {
    /// Leave the stored expiry as it is.
    #[default]
    Keep,

    /// Expire the record after the given duration, counted from the moment
    /// the write is executed.
    After(Duration),

    /// Remove the expiry, the record never expires.
    Never,
}

/// Options of a write operation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteOptions {
    pub(crate) value: Option<AttributeValue>,
    pub(crate) fields: AttributeMap,
    pub(crate) ttl: Ttl,
    pub(crate) previous: Option<KvPair>,
}

/// Single [`WriteOptions`] override.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOption {
    /// See [`WriteOptions::with_value`].
    Value(AttributeValue),

    /// See [`WriteOptions::with_fields`].
    Fields(AttributeMap),

    /// See [`WriteOptions::with_ttl`].
    Ttl(Duration),

    /// See [`WriteOptions::with_no_expires`].
    NoExpires,

    /// See [`WriteOptions::with_previous`].
    Previous(KvPair),
}

impl WriteOptions {
    /// Creates [`WriteOptions`] with no value, an untouched TTL and no
    /// previous record (create semantics).
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the provided options in order.
    pub fn append(&mut self, options: impl IntoIterator<Item = WriteOption>) {
        for opt in options {
            self.apply(opt);
        }
    }

    fn apply(&mut self, option: WriteOption) {
        match option {
            WriteOption::Value(value) => self.value = Some(value),
            WriteOption::Fields(fields) => self.fields.extend(fields),
            WriteOption::Ttl(ttl) => self.ttl = Ttl::After(ttl),
            WriteOption::NoExpires => self.ttl = Ttl::Never,
            WriteOption::Previous(previous) => self.previous = Some(previous),
        }
    }

    /// Stores `value` as a string payload.
    pub fn with_string(self, value: impl Into<String>) -> Self {
        self.with_value(AttributeValue::S(value.into()))
    }

    /// Stores `value` as a base64 encoded string payload.
    pub fn with_bytes(self, value: impl AsRef<[u8]>) -> Self {
        self.with_value(AttributeValue::S(BASE64.encode(value)))
    }

    /// Stores an arbitrary attribute as the payload.
    pub fn with_value(mut self, value: AttributeValue) -> Self {
        self.apply(WriteOption::Value(value));
        self
    }

    /// Adds top level attributes to the record, typically the key attributes
    /// of secondary indexes.
    pub fn with_fields<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        self.apply(WriteOption::Fields(fields));
        self
    }

    /// Sets the time to live of the record.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.apply(WriteOption::Ttl(ttl));
        self
    }

    /// Removes the time to live of the record.
    pub fn with_no_expires(mut self) -> Self {
        self.apply(WriteOption::NoExpires);
        self
    }

    /// Sets the record previously read, which the write asserts is still
    /// the current one.
    pub fn with_previous(mut self, previous: KvPair) -> Self {
        self.apply(WriteOption::Previous(previous));
        self
    }

    pub fn value(&self) -> Option<&AttributeValue> {
        self.value.as_ref()
    }

    pub fn fields(&self) -> &AttributeMap {
        &self.fields
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    pub fn previous(&self) -> Option<&KvPair> {
        self.previous.as_ref()
    }

    /// Checks that none of the fields use a reserved attribute name.
    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.fields)
    }
}

impl FromIterator<WriteOption> for WriteOptions {
    fn from_iter<T: IntoIterator<Item = WriteOption>>(iter: T) -> Self {
        let mut opts = Self::default();
        opts.append(iter);
        opts
    }
}

pub(crate) fn validate_fields(fields: &AttributeMap) -> Result<()> {
    match fields.keys().find(|name| codec::is_reserved_field(name)) {
        Some(name) => Err(Error::ReservedField(name.clone())),
        None => Ok(()),
    }
}

/// Secondary index to read from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Index {
    /// Local secondary index, sharing the partition key of the table.
    Local { name: String, sort_key: String },

    /// Global secondary index, with its own partition and sort keys.
    Global {
        name: String,
        partition_key: String,
        sort_key: String,
    },
}

impl Index {
    pub fn name(&self) -> &str {
        match self {
            Self::Local { name, .. } | Self::Global { name, .. } => name,
        }
    }

    /// Returns the partition key attribute used by this index.
    pub fn partition_key(&self) -> &str {
        match self {
            Self::Local { .. } => codec::PARTITION_KEY_ATTRIBUTE,
            Self::Global { partition_key, .. } => partition_key,
        }
    }

    /// Returns the sort key attribute used by this index.
    pub fn sort_key(&self) -> &str {
        match self {
            Self::Local { sort_key, .. } | Self::Global { sort_key, .. } => sort_key,
        }
    }
}

/// Options of a read operation.
///
/// Reads are strongly consistent unless configured otherwise, either via
/// [`Config::consistent_read`](crate::Config) or per call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub(crate) consistent: Option<bool>,
    pub(crate) limit: Option<u32>,
    pub(crate) cursor: Option<String>,
    pub(crate) scan_forward: Option<bool>,
    pub(crate) index: Option<Index>,
}

/// Single [`ReadOptions`] override.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadOption {
    /// See [`ReadOptions::with_consistent`].
    Consistent(bool),

    /// See [`ReadOptions::with_limit`].
    Limit(u32),

    /// See [`ReadOptions::with_cursor`].
    Cursor(String),

    /// See [`ReadOptions::with_scan_forward`].
    ScanForward(bool),

    /// See [`ReadOptions::with_local_index`] and
    /// [`ReadOptions::with_global_index`].
    Index(Index),
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the provided options in order.
    pub fn append(&mut self, options: impl IntoIterator<Item = ReadOption>) {
        for opt in options {
            self.apply(opt);
        }
    }

    fn apply(&mut self, option: ReadOption) {
        match option {
            ReadOption::Consistent(consistent) => self.consistent = Some(consistent),
            ReadOption::Limit(limit) => self.limit = Some(limit),
            ReadOption::Cursor(cursor) => self.cursor = Some(cursor),
            ReadOption::ScanForward(forward) => self.scan_forward = Some(forward),
            ReadOption::Index(index) => self.index = Some(index),
        }
    }

    /// Overrides the read consistency.
    pub fn with_consistent(mut self, consistent: bool) -> Self {
        self.apply(ReadOption::Consistent(consistent));
        self
    }

    /// Limits the number of records read by a list operation.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.apply(ReadOption::Limit(limit));
        self
    }

    /// Resumes a list operation from a cursor returned in a previous
    /// [`Page`](crate::Page). An empty cursor starts from the beginning.
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.apply(ReadOption::Cursor(cursor.into()));
        self
    }

    /// Sets the direction of a list operation, ascending by default.
    pub fn with_scan_forward(mut self, forward: bool) -> Self {
        self.apply(ReadOption::ScanForward(forward));
        self
    }

    /// Reads from the local secondary index `name`, sorted by `sort_key`.
    pub fn with_local_index(mut self, name: impl Into<String>, sort_key: impl Into<String>) -> Self {
        self.apply(ReadOption::Index(Index::Local {
            name: name.into(),
            sort_key: sort_key.into(),
        }));
        self
    }

    /// Reads from the global secondary index `name`.
    pub fn with_global_index(
        mut self,
        name: impl Into<String>,
        partition_key: impl Into<String>,
        sort_key: impl Into<String>,
    ) -> Self {
        self.apply(ReadOption::Index(Index::Global {
            name: name.into(),
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
        }));
        self
    }

    /// Resolves the read consistency against the provided default.
    pub fn consistent_or(&self, default: bool) -> bool {
        self.consistent.unwrap_or(default)
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    /// Returns the cursor to resume from, ignoring empty ones.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref().filter(|cursor| !cursor.is_empty())
    }

    pub fn scan_forward(&self) -> bool {
        self.scan_forward.unwrap_or(true)
    }

    pub fn index(&self) -> Option<&Index> {
        self.index.as_ref()
    }

    /// Fails with [`Error::IndexNotSupported`] if an index is selected.
    pub(crate) fn require_primary_key(&self) -> Result<()> {
        match self.index {
            Some(_) => Err(Error::IndexNotSupported),
            None => Ok(()),
        }
    }
}

impl FromIterator<ReadOption> for ReadOptions {
    fn from_iter<T: IntoIterator<Item = ReadOption>>(iter: T) -> Self {
        let mut opts = Self::default();
        opts.append(iter);
        opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_defaults() {
        let opts = WriteOptions::new();

        assert_eq!(opts.value(), None);
        assert!(opts.fields().is_empty());
        assert_eq!(opts.ttl(), Ttl::Keep);
        assert_eq!(opts.previous(), None);
    }

    #[test]
    fn last_value_wins() {
        let opts = WriteOptions::new()
            .with_string("first")
            .with_bytes(b"world");
        assert_eq!(opts.value(), Some(&AttributeValue::from("d29ybGQ=")));

        let opts: WriteOptions = [
            WriteOption::Value("a".into()),
            WriteOption::Ttl(Duration::from_secs(5)),
            WriteOption::NoExpires,
            WriteOption::Value("b".into()),
        ]
        .into_iter()
        .collect();

        assert_eq!(opts.value(), Some(&AttributeValue::from("b")));
        assert_eq!(opts.ttl(), Ttl::Never);
    }

    #[test]
    fn fields_are_merged() {
        let opts = WriteOptions::new()
            .with_fields([("created", "1"), ("owner", "bob")])
            .with_fields([("created", "2")]);

        assert_eq!(opts.fields().len(), 2);
        assert_eq!(opts.fields()["created"], AttributeValue::from("2"));
        assert_eq!(opts.fields()["owner"], AttributeValue::from("bob"));
    }

    #[test]
    fn reserved_fields_fail_validation() {
        let opts = WriteOptions::new().with_fields([("version", "x")]);
        assert!(matches!(opts.validate(), Err(Error::ReservedField(name)) if name == "version"));

        assert!(WriteOptions::new()
            .with_fields([("created", "x")])
            .validate()
            .is_ok());
    }

    #[test]
    fn previous_is_kept() {
        let prev = KvPair::new("p", "k", 7);
        let opts = WriteOptions::new().with_previous(prev.clone());
        assert_eq!(opts.previous(), Some(&prev));
    }

    #[test]
    fn read_defaults() {
        let opts = ReadOptions::new();

        assert!(opts.consistent_or(true));
        assert!(!opts.consistent_or(false));
        assert_eq!(opts.limit(), None);
        assert_eq!(opts.cursor(), None);
        assert!(opts.scan_forward());
        assert_eq!(opts.index(), None);
        assert!(opts.require_primary_key().is_ok());
    }

    #[test]
    fn read_overrides() {
        let opts: ReadOptions = [
            ReadOption::Limit(5),
            ReadOption::Consistent(false),
            ReadOption::ScanForward(false),
            ReadOption::Limit(10),
            ReadOption::Cursor(String::new()),
        ]
        .into_iter()
        .collect();

        assert_eq!(opts.limit(), Some(10));
        assert!(!opts.consistent_or(true));
        assert!(!opts.scan_forward());
        assert_eq!(opts.cursor(), None);
    }

    #[test]
    fn index_selection() {
        let local = ReadOptions::new().with_local_index("idx_created", "created");
        let index = local.index().unwrap();
        assert_eq!(index.name(), "idx_created");
        assert_eq!(index.partition_key(), "id");
        assert_eq!(index.sort_key(), "created");
        assert!(matches!(
            local.require_primary_key(),
            Err(Error::IndexNotSupported)
        ));

        let global = local.with_global_index("idx_global_1", "pk1", "sk1");
        let index = global.index().unwrap();
        assert_eq!(index.name(), "idx_global_1");
        assert_eq!(index.partition_key(), "pk1");
        assert_eq!(index.sort_key(), "sk1");
    }
}
