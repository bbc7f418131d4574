//! Key-value store with optimistic concurrency control on top of a remote
//! store with conditional writes and ordered range queries.
//!
//! Records are addressed by a partition and a key within the partition.
//! Every write increments the version of a record, and the atomic operations
//! use that version to detect concurrent modifications:
//!
//! ```
//! use dynastore::{Error, MemoryStore, Session, TableSchema, WriteOptions};
//!
//! # #[tokio::main]
//! # async fn main() -> dynastore::Result<()> {
//! let store = MemoryStore::new().with_table("agents", TableSchema::new());
//! let partition = Session::new(store).table("agents").partition("agent");
//!
//! let kv = partition
//!     .atomic_put("config", WriteOptions::new().with_string("v1"))
//!     .await?;
//! assert_eq!(kv.version, 1);
//!
//! let res = partition.atomic_put("config", WriteOptions::new()).await;
//! assert!(matches!(res, Err(Error::KeyExists)));
//!
//! let opts = WriteOptions::new().with_string("v2").with_previous(kv);
//! let kv = partition.atomic_put("config", opts).await?;
//! assert_eq!(kv.string_value(), Some("v2"));
//! # Ok(())
//! # }
//! ```

#![allow(clippy::manual_async_fn)]

pub use {
    attribute::{from_attribute_map, to_attribute_map, AttributeMap, AttributeValue, ValueError},
    codec::{DecodeError, KvPair},
    config::Config,
    context::Context,
    cursor::CursorError,
    error::{Error, Operation, Result},
    hooks::{NoopHooks, StoreHooks, TracingHooks},
    options::{Index, ReadOption, ReadOptions, Ttl, WriteOption, WriteOptions},
    partition::Partition,
    session::Session,
    store::{Request, Store, StoreError, StoreErrorKind},
    table::{Page, Table},
    tokio_util::sync::CancellationToken,
};

pub mod attribute;
pub mod codec;
pub mod config;
mod context;
pub mod cursor;
mod error;
pub mod expression;
pub mod hooks;
pub mod occ;
pub mod options;
mod partition;
mod session;
pub mod store;
mod table;

#[cfg(feature = "testing")]
pub mod memory;
#[cfg(feature = "testing")]
pub use memory::{MemoryStore, TableSchema};
