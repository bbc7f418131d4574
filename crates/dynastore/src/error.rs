use crate::{codec::DecodeError, cursor::CursorError, store::StoreError, ValueError};

/// Public operation of a [`Table`](crate::Table).
#[derive(Clone, Copy, Debug, derive_more::Display, PartialEq, Eq, Hash)]
pub enum Operation {
    #[display("put")]
    Put,

    #[display("get")]
    Get,

    #[display("exists")]
    Exists,

    #[display("delete")]
    Delete,

    #[display("list")]
    List,

    #[display("list_page")]
    ListPage,

    #[display("atomic_put")]
    AtomicPut,

    #[display("atomic_delete")]
    AtomicDelete,
}

impl Operation {
    /// Returns the name of the operation, as used in metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Put => "put",
            Self::Get => "get",
            Self::Exists => "exists",
            Self::Delete => "delete",
            Self::List => "list",
            Self::ListPage => "list_page",
            Self::AtomicPut => "atomic_put",
            Self::AtomicDelete => "atomic_delete",
        }
    }
}

/// Result of a [`Table`](crate::Table) operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error of a [`Table`](crate::Table) operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The record doesn't exist (or is expired).
    #[error("Key not found")]
    KeyNotFound,

    /// An atomic write without a previous record found a live record.
    #[error("Key already exists")]
    KeyExists,

    /// An atomic write found a different version than the previous record
    /// it was given.
    #[error("Key has been modified")]
    KeyModified,

    /// A write tried to set one of the reserved attributes as a field.
    #[error("Field name is reserved: {0}")]
    ReservedField(String),

    /// Single record reads can't use secondary indexes.
    #[error("Index is not supported for this operation")]
    IndexNotSupported,

    #[error("Failed to decode item: {0}")]
    Decode(#[from] DecodeError),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(#[from] CursorError),

    #[error("Invalid value: {0}")]
    Value(#[from] ValueError),

    #[error("{operation} failed: {source}")]
    Store {
        operation: Operation,
        source: StoreError,
    },

    #[error("{0} cancelled")]
    Cancelled(Operation),

    #[error("{0} deadline exceeded")]
    DeadlineExceeded(Operation),
}

impl Error {
    /// Indicates whether this error means that the record is missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound)
    }

    /// Indicates whether this error is an optimistic concurrency conflict,
    /// after which the caller is expected to re-read and retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::KeyExists | Self::KeyModified)
    }

    /// Returns the kind of this error, as used in metric labels. Store
    /// errors are labeled by their [`StoreErrorKind`](crate::StoreErrorKind).
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::KeyNotFound => "key_not_found",
            Self::KeyExists => "key_exists",
            Self::KeyModified => "key_modified",
            Self::ReservedField(_) => "reserved_field",
            Self::IndexNotSupported => "index_not_supported",
            Self::Decode(_) => "decode",
            Self::InvalidCursor(_) => "invalid_cursor",
            Self::Value(_) => "value",
            Self::Store { source, .. } => source.kind().as_str(),
            Self::Cancelled(_) => "cancelled",
            Self::DeadlineExceeded(_) => "deadline_exceeded",
        }
    }

    /// Returns the [`StoreError`] that caused this error, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store { source, .. } => Some(source),
            _ => None,
        }
    }
}
