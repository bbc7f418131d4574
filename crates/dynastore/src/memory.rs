//! In-memory [`Store`] for tests.
//!
//! Evaluates the same [expressions](crate::expression) a remote store would,
//! including secondary index queries, pagination and scan direction.

use {
    crate::{
        attribute::{AttributeMap, AttributeValue},
        codec::{self, PARTITION_KEY_ATTRIBUTE, SORT_KEY_ATTRIBUTE},
        expression,
        store::{
            DeleteItem,
            GetItem,
            Query,
            QueryOutput,
            Store,
            StoreError,
            StoreErrorKind,
            StoreResult,
            UpdateItem,
        },
    },
    parking_lot::Mutex,
    std::{
        cmp::Ordering,
        collections::{BTreeMap, HashMap},
        sync::Arc,
        time::Duration,
    },
    tap::TapFallible as _,
};

/// Maximum number of items returned by a query without a limit.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Secondary indexes of a table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableSchema {
    indexes: Vec<IndexSchema>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct IndexSchema {
    name: String,
    partition_key: String,
    sort_key: String,
    global: bool,
}

impl TableSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a local secondary index sorted by `sort_key`.
    pub fn with_local_index(mut self, name: impl Into<String>, sort_key: impl Into<String>) -> Self {
        self.indexes.push(IndexSchema {
            name: name.into(),
            partition_key: PARTITION_KEY_ATTRIBUTE.to_owned(),
            sort_key: sort_key.into(),
            global: false,
        });
        self
    }

    /// Adds a global secondary index.
    pub fn with_global_index(
        mut self,
        name: impl Into<String>,
        partition_key: impl Into<String>,
        sort_key: impl Into<String>,
    ) -> Self {
        self.indexes.push(IndexSchema {
            name: name.into(),
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
            global: true,
        });
        self
    }

    fn index(&self, name: &str) -> Option<&IndexSchema> {
        self.indexes.iter().find(|idx| idx.name == name)
    }
}

/// In-memory [`Store`].
///
/// Cloning is cheap, clones share the same tables.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    broken: bool,
    latency: Duration,
    requests: usize,
    tables: HashMap<String, Table>,
}

#[derive(Debug, Default)]
struct Table {
    schema: TableSchema,
    items: BTreeMap<(String, String), AttributeMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table, see [`MemoryStore::create_table`].
    pub fn with_table(self, name: impl Into<String>, schema: TableSchema) -> Self {
        self.create_table(name, schema);
        self
    }

    /// Creates a table, dropping the existing one with the same name.
    pub fn create_table(&self, name: impl Into<String>, schema: TableSchema) {
        let table = Table {
            schema,
            items: BTreeMap::new(),
        };

        self.inner.lock().tables.insert(name.into(), table);
    }

    /// Makes every following request fail with [`StoreErrorKind::Internal`].
    pub fn break_(&self) {
        self.inner.lock().broken = true;
    }

    /// Delays every following request by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.inner.lock().latency = latency;
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    /// Returns the number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.inner.lock().requests
    }

    /// Returns the raw stored item, expired or not.
    pub fn item(&self, table: &str, partition: &str, key: &str) -> Option<AttributeMap> {
        let inner = self.inner.lock();
        let table = inner.tables.get(table)?;
        table
            .items
            .get(&(partition.to_owned(), key.to_owned()))
            .cloned()
    }

    /// Physically deletes the items expired at `now` (Unix seconds),
    /// returning their number.
    pub fn sweep_expired(&self, now: i64) -> usize {
        let mut inner = self.inner.lock();

        inner
            .tables
            .values_mut()
            .map(|table| {
                let before = table.items.len();
                table
                    .items
                    .retain(|_, item| !codec::is_item_expired(item, now));
                before - table.items.len()
            })
            .sum()
    }

    async fn enter(&self) -> StoreResult<()> {
        let latency = {
            let mut inner = self.inner.lock();
            inner.requests += 1;

            if inner.broken {
                return Err(StoreErrorKind::Internal.into());
            }

            inner.latency
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        Ok(())
    }
}

impl Store for MemoryStore {
    async fn get_item(&self, req: &GetItem) -> StoreResult<Option<AttributeMap>> {
        self.enter().await?;

        let inner = self.inner.lock();
        let table = inner.table(&req.table)?;
        let key = primary_key(&req.key)?;

        Ok(table.items.get(&key).cloned())
    }

    async fn update_item(&self, req: &UpdateItem) -> StoreResult<AttributeMap> {
        self.enter().await?;

        let mut inner = self.inner.lock();
        let table = inner.table_mut(&req.table)?;
        let key = primary_key(&req.key)?;

        let current = table.items.get(&key);
        check_condition(req.condition.as_ref(), current)?;

        if let Some(action) = req
            .update
            .actions
            .iter()
            .find(|action| req.key.contains_key(action.name()))
        {
            return Err(StoreError::new(
                StoreErrorKind::Validation,
                format!("Cannot update key attribute: {}", action.name()),
            ));
        }

        let mut item = current.cloned().unwrap_or_else(|| req.key.clone());
        req.update
            .apply(&mut item)
            .map_err(|err| StoreError::new(StoreErrorKind::Validation, err.to_string()))?;

        table.items.insert(key, item.clone());

        Ok(item)
    }

    async fn delete_item(&self, req: &DeleteItem) -> StoreResult<()> {
        self.enter().await?;

        let mut inner = self.inner.lock();
        let table = inner.table_mut(&req.table)?;
        let key = primary_key(&req.key)?;

        check_condition(req.condition.as_ref(), table.items.get(&key))?;
        table.items.remove(&key);

        Ok(())
    }

    async fn query(&self, req: &Query) -> StoreResult<QueryOutput> {
        self.enter().await?;

        let inner = self.inner.lock();
        inner
            .table(&req.table)?
            .query(req)
            .tap_err(|err| tracing::debug!(?err, table = %req.table, "query failed"))
    }
}

impl Inner {
    fn table(&self, name: &str) -> StoreResult<&Table> {
        self.tables.get(name).ok_or_else(|| table_not_found(name))
    }

    fn table_mut(&mut self, name: &str) -> StoreResult<&mut Table> {
        self.tables.get_mut(name).ok_or_else(|| table_not_found(name))
    }
}

impl Table {
    fn query(&self, req: &Query) -> StoreResult<QueryOutput> {
        let (partition_key, sort_key, global) = match &req.index {
            None => (PARTITION_KEY_ATTRIBUTE, SORT_KEY_ATTRIBUTE, false),
            Some(name) => {
                let idx = self.schema.index(name).ok_or_else(|| {
                    StoreError::new(StoreErrorKind::Validation, format!("Unknown index: {name}"))
                })?;
                (idx.partition_key.as_str(), idx.sort_key.as_str(), idx.global)
            }
        };

        if global && req.consistent_read {
            return Err(StoreError::new(
                StoreErrorKind::Validation,
                "Consistent reads are not supported on global secondary indexes",
            ));
        }

        let cond = &req.key_condition;
        if cond.partition_key != partition_key
            || cond
                .sort_prefix
                .as_ref()
                .is_some_and(|(name, _)| name != sort_key)
        {
            return Err(StoreError::new(
                StoreErrorKind::Validation,
                "Key condition doesn't match the key schema",
            ));
        }

        let order = |a: &AttributeMap, b: &AttributeMap| {
            let ord = item_order(a, b, sort_key);
            if req.scan_forward {
                ord
            } else {
                ord.reverse()
            }
        };

        let mut items: Vec<_> = self
            .items
            .values()
            .filter(|item| item.contains_key(sort_key) && cond.matches(item))
            .filter(|item| match &req.exclusive_start_key {
                Some(start) => order(*item, start).is_gt(),
                None => true,
            })
            .collect();

        items.sort_by(|a, b| order(*a, *b));

        let limit = req
            .limit
            .map_or(DEFAULT_PAGE_SIZE, |limit| limit as usize)
            .max(1);

        let last_evaluated_key = (items.len() > limit)
            .then(|| items.get(limit - 1))
            .flatten()
            .map(|item| evaluated_key(item, partition_key, sort_key));

        Ok(QueryOutput {
            items: items.into_iter().take(limit).cloned().collect(),
            last_evaluated_key,
        })
    }
}

fn item_order(a: &AttributeMap, b: &AttributeMap, sort_key: &str) -> Ordering {
    let by_sort_key = match (a.get(sort_key), b.get(sort_key)) {
        (Some(a), Some(b)) => expression::compare(a, b).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    };

    by_sort_key
        .then_with(|| attr_str(a, PARTITION_KEY_ATTRIBUTE).cmp(attr_str(b, PARTITION_KEY_ATTRIBUTE)))
        .then_with(|| attr_str(a, SORT_KEY_ATTRIBUTE).cmp(attr_str(b, SORT_KEY_ATTRIBUTE)))
}

fn attr_str<'a>(item: &'a AttributeMap, name: &str) -> &'a str {
    item.get(name).and_then(AttributeValue::as_s).unwrap_or_default()
}

/// Key attributes of an item as returned in `last_evaluated_key`: the primary
/// key plus the key of the index being queried.
fn evaluated_key(item: &AttributeMap, partition_key: &str, sort_key: &str) -> AttributeMap {
    [PARTITION_KEY_ATTRIBUTE, SORT_KEY_ATTRIBUTE, partition_key, sort_key]
        .into_iter()
        .filter_map(|name| Some((name.to_owned(), item.get(name)?.clone())))
        .collect()
}

fn primary_key(key: &AttributeMap) -> StoreResult<(String, String)> {
    let get = |name: &str| {
        key.get(name)
            .and_then(AttributeValue::as_s)
            .map(ToOwned::to_owned)
            .ok_or_else(|| {
                StoreError::new(
                    StoreErrorKind::Validation,
                    format!("Missing string key attribute: {name}"),
                )
            })
    };

    if key.len() != 2 {
        return Err(StoreError::new(
            StoreErrorKind::Validation,
            "Key must consist of the partition and sort key attributes",
        ));
    }

    Ok((get(PARTITION_KEY_ATTRIBUTE)?, get(SORT_KEY_ATTRIBUTE)?))
}

fn check_condition(
    cond: Option<&expression::Condition>,
    current: Option<&AttributeMap>,
) -> StoreResult<()> {
    let Some(cond) = cond else {
        return Ok(());
    };

    let empty = AttributeMap::new();
    if cond.evaluate(current.unwrap_or(&empty)) {
        return Ok(());
    }

    tracing::debug!("conditional check failed");
    Err(StoreErrorKind::ConditionalCheckFailed.into())
}

fn table_not_found(name: &str) -> StoreError {
    StoreError::new(
        StoreErrorKind::ResourceNotFound,
        format!("Table not found: {name}"),
    )
}
