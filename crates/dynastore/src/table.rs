use {
    crate::{
        attribute::AttributeMap,
        codec::{self, KvPair, PARTITION_KEY_ATTRIBUTE, SORT_KEY_ATTRIBUTE},
        cursor,
        expression::KeyCondition,
        occ,
        store::{DeleteItem, GetItem, Query, Request, Store, StoreResult, UpdateItem},
        Context,
        Error,
        Index,
        Operation,
        Partition,
        ReadOptions,
        Result,
        Session,
        WriteOptions,
    },
    derivative::Derivative,
    std::{future::Future, sync::Arc, time::Instant},
    tap::TapFallible as _,
    time::OffsetDateTime,
};

/// Page of records returned by [`Table::list_page`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<KvPair>,

    /// Cursor to pass to [`ReadOptions::with_cursor`] to read the next page,
    /// `None` if there are no more records.
    pub cursor: Option<String>,
}

/// Handle of a single table.
///
/// Operations take the partition explicitly, see [`Table::partition`] for a
/// handle bound to a partition.
#[derive(Derivative)]
#[derivative(Clone(bound = ""), Debug(bound = ""))]
pub struct Table<S> {
    #[derivative(Debug = "ignore")]
    session: Session<S>,
    name: Arc<str>,
}

impl<S: Store> Table<S> {
    pub(crate) fn new(session: Session<S>, name: &str) -> Self {
        Self {
            session,
            name: name.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.name
    }

    /// Returns a handle of the partition `name` of this table.
    pub fn partition(&self, name: impl Into<String>) -> Partition<S> {
        Partition::new(self.clone(), name.into())
    }

    /// Creates or overwrites a record, incrementing its version.
    pub async fn put(&self, partition: &str, key: &str, opts: WriteOptions) -> Result<()> {
        self.put_with_context(Context::background(), partition, key, opts)
            .await
    }

    /// [`Table::put`] bound to a [`Context`].
    pub async fn put_with_context(
        &self,
        ctx: Context,
        partition: &str,
        key: &str,
        opts: WriteOptions,
    ) -> Result<()> {
        let op = Operation::Put;

        let req = UpdateItem {
            table: self.name.to_string(),
            key: codec::build_key(partition, key),
            condition: None,
            update: occ::build_update(&opts, OffsetDateTime::now_utc())?,
        };

        self.send(ctx, op, Request::UpdateItem(&req), self.store().update_item(&req))
            .await
            .map(drop)
    }

    /// Reads a live record.
    ///
    /// Fails with [`Error::KeyNotFound`] if the record doesn't exist or is
    /// expired, and with [`Error::IndexNotSupported`] if an index is
    /// selected.
    pub async fn get(&self, partition: &str, key: &str, opts: ReadOptions) -> Result<KvPair> {
        self.get_with_context(Context::background(), partition, key, opts)
            .await
    }

    /// [`Table::get`] bound to a [`Context`].
    pub async fn get_with_context(
        &self,
        ctx: Context,
        partition: &str,
        key: &str,
        opts: ReadOptions,
    ) -> Result<KvPair> {
        let item = self
            .get_item(ctx, Operation::Get, partition, key, &opts)
            .await?
            .filter(|item| !codec::is_item_expired(item, unix_now()))
            .ok_or(Error::KeyNotFound)?;

        Ok(codec::decode(&item)?)
    }

    /// Indicates whether a live record exists.
    pub async fn exists(&self, partition: &str, key: &str, opts: ReadOptions) -> Result<bool> {
        self.exists_with_context(Context::background(), partition, key, opts)
            .await
    }

    /// [`Table::exists`] bound to a [`Context`].
    pub async fn exists_with_context(
        &self,
        ctx: Context,
        partition: &str,
        key: &str,
        opts: ReadOptions,
    ) -> Result<bool> {
        let item = self
            .get_item(ctx, Operation::Exists, partition, key, &opts)
            .await?;

        Ok(item.is_some_and(|item| !codec::is_item_expired(&item, unix_now())))
    }

    /// Deletes a record. Deleting a missing record succeeds.
    pub async fn delete(&self, partition: &str, key: &str) -> Result<()> {
        self.delete_with_context(Context::background(), partition, key)
            .await
    }

    /// [`Table::delete`] bound to a [`Context`].
    pub async fn delete_with_context(&self, ctx: Context, partition: &str, key: &str) -> Result<()> {
        let req = DeleteItem {
            table: self.name.to_string(),
            key: codec::build_key(partition, key),
            condition: None,
        };

        self.send(
            ctx,
            Operation::Delete,
            Request::DeleteItem(&req),
            self.store().delete_item(&req),
        )
        .await
    }

    /// Reads every live record with a key starting with `prefix`, following
    /// the pages for at most [`Config::list_timeout`](crate::Config).
    ///
    /// Fails with [`Error::KeyNotFound`] if nothing matches.
    #[deprecated(note = "reading every page under a deadline doesn't scale, use `list_page`")]
    #[allow(deprecated)]
    pub async fn list(&self, partition: &str, prefix: &str, opts: ReadOptions) -> Result<Vec<KvPair>> {
        self.list_with_context(Context::background(), partition, prefix, opts)
            .await
    }

    /// [`Table::list`] bound to a [`Context`].
    #[deprecated(note = "reading every page under a deadline doesn't scale, use `list_page_with_context`")]
    pub async fn list_with_context(
        &self,
        ctx: Context,
        partition: &str,
        prefix: &str,
        opts: ReadOptions,
    ) -> Result<Vec<KvPair>> {
        let op = Operation::List;
        let ctx = ctx.with_timeout(self.session.config().list_timeout);
        let mut query = self.build_query(partition, prefix, &opts)?;

        let mut items = Vec::new();
        loop {
            let out = self
                .send(ctx.clone(), op, Request::Query(&query), self.store().query(&query))
                .await?;

            items.extend(out.items);

            match out.last_evaluated_key {
                Some(key) if !key.is_empty() => query.exclusive_start_key = Some(key),
                _ => break,
            }
        }

        if items.is_empty() {
            return Err(Error::KeyNotFound);
        }

        let now = unix_now();
        items
            .iter()
            .filter(|item| !codec::is_item_expired(item, now))
            .map(|item| codec::decode(item).map_err(Error::from))
            .collect()
    }

    /// Reads a single page of records with a key starting with `prefix`.
    ///
    /// Unlike [`Table::get`], expired records which haven't been deleted by
    /// the store yet are returned as well.
    pub async fn list_page(&self, partition: &str, prefix: &str, opts: ReadOptions) -> Result<Page> {
        self.list_page_with_context(Context::background(), partition, prefix, opts)
            .await
    }

    /// [`Table::list_page`] bound to a [`Context`].
    pub async fn list_page_with_context(
        &self,
        ctx: Context,
        partition: &str,
        prefix: &str,
        opts: ReadOptions,
    ) -> Result<Page> {
        let query = self.build_query(partition, prefix, &opts)?;

        let out = self
            .send(
                ctx,
                Operation::ListPage,
                Request::Query(&query),
                self.store().query(&query),
            )
            .await?;

        let records: Vec<KvPair> = out
            .items
            .iter()
            .map(codec::decode)
            .collect::<Result<_, _>>()?;

        let cursor = match out.last_evaluated_key {
            Some(key) if !key.is_empty() => Some(cursor::encode(&key)?),
            _ => None,
        };

        Ok(Page { records, cursor })
    }

    /// Writes a record, asserting that it wasn't modified since it was read.
    ///
    /// Without [`WriteOptions::with_previous`] the record must not exist (or
    /// be expired), otherwise fails with [`Error::KeyExists`]. With it, the
    /// stored record must be live and have the version of the previous one,
    /// otherwise fails with [`Error::KeyModified`].
    ///
    /// Returns the record as it is after the write.
    pub async fn atomic_put(&self, partition: &str, key: &str, opts: WriteOptions) -> Result<KvPair> {
        self.atomic_put_with_context(Context::background(), partition, key, opts)
            .await
    }

    /// [`Table::atomic_put`] bound to a [`Context`].
    pub async fn atomic_put_with_context(
        &self,
        ctx: Context,
        partition: &str,
        key: &str,
        opts: WriteOptions,
    ) -> Result<KvPair> {
        let now = OffsetDateTime::now_utc();

        let req = UpdateItem {
            table: self.name.to_string(),
            key: codec::build_key(partition, key),
            condition: Some(occ::put_condition(opts.previous(), now.unix_timestamp())),
            update: occ::build_update(&opts, now)?,
        };

        let res = self
            .send(
                ctx,
                Operation::AtomicPut,
                Request::UpdateItem(&req),
                self.store().update_item(&req),
            )
            .await;

        match res {
            Ok(item) => Ok(codec::decode(&item)?),
            Err(err) if is_condition_failure(&err) => Err(match opts.previous() {
                Some(_) => Error::KeyModified,
                None => Error::KeyExists,
            }),
            Err(err) => Err(err),
        }
    }

    /// Deletes a record, asserting that it wasn't modified since it was
    /// read.
    ///
    /// With a previous record, the stored one must have its version,
    /// otherwise fails with [`Error::KeyNotFound`]. Without one, fails with
    /// [`Error::KeyExists`] if a live record exists and with
    /// [`Error::KeyNotFound`] otherwise, deleting nothing in both cases.
    pub async fn atomic_delete(&self, partition: &str, key: &str, previous: Option<&KvPair>) -> Result<()> {
        self.atomic_delete_with_context(Context::background(), partition, key, previous)
            .await
    }

    /// [`Table::atomic_delete`] bound to a [`Context`].
    pub async fn atomic_delete_with_context(
        &self,
        ctx: Context,
        partition: &str,
        key: &str,
        previous: Option<&KvPair>,
    ) -> Result<()> {
        let op = Operation::AtomicDelete;
        let opts = ReadOptions::new().with_consistent(true);

        let current = self
            .get_item(ctx.clone(), op, partition, key, &opts)
            .await?
            .filter(|item| !codec::is_item_expired(item, unix_now()));

        let Some(previous) = previous else {
            return Err(match current {
                Some(_) => Error::KeyExists,
                None => Error::KeyNotFound,
            });
        };

        let req = DeleteItem {
            table: self.name.to_string(),
            key: codec::build_key(partition, key),
            condition: Some(occ::delete_condition(previous)),
        };

        match self
            .send(ctx, op, Request::DeleteItem(&req), self.store().delete_item(&req))
            .await
        {
            Err(err) if is_condition_failure(&err) => Err(Error::KeyNotFound),
            res => res,
        }
    }

    fn store(&self) -> &S {
        self.session.store()
    }

    async fn get_item(
        &self,
        ctx: Context,
        op: Operation,
        partition: &str,
        key: &str,
        opts: &ReadOptions,
    ) -> Result<Option<AttributeMap>> {
        opts.require_primary_key()?;

        let req = GetItem {
            table: self.name.to_string(),
            key: codec::build_key(partition, key),
            consistent_read: opts.consistent_or(self.session.config().consistent_read),
        };

        self.send(ctx, op, Request::GetItem(&req), self.store().get_item(&req))
            .await
    }

    fn build_query(&self, partition: &str, prefix: &str, opts: &ReadOptions) -> Result<Query> {
        let (partition_key, sort_key) = match opts.index() {
            Some(index) => (index.partition_key(), index.sort_key()),
            None => (PARTITION_KEY_ATTRIBUTE, SORT_KEY_ATTRIBUTE),
        };

        let mut key_condition = KeyCondition::new(partition_key, partition);
        if !prefix.is_empty() {
            key_condition = key_condition.with_sort_prefix(sort_key, prefix);
        }

        let consistent_read = match opts.index() {
            // Global indexes only support eventually consistent reads.
            Some(Index::Global { .. }) => false,
            _ => opts.consistent_or(self.session.config().consistent_read),
        };

        Ok(Query {
            table: self.name.to_string(),
            index: opts.index().map(|idx| idx.name().to_owned()),
            key_condition,
            consistent_read,
            limit: opts.limit(),
            scan_forward: opts.scan_forward(),
            exclusive_start_key: opts.cursor().map(cursor::decode).transpose()?,
        })
    }

    /// Runs hooks and sends a request to the store, bound to the [`Context`].
    async fn send<T>(
        &self,
        ctx: Context,
        op: Operation,
        request: Request<'_>,
        call: impl Future<Output = StoreResult<T>>,
    ) -> Result<T> {
        ctx.check(op)?;

        let ctx = self
            .session
            .config()
            .hooks
            .request_built(ctx.with_operation(op), request);

        let started_at = Instant::now();
        let res = ctx.run(op, call).await;

        metrics::histogram!("dynastore_request_duration",
            "operation" => op.as_str(),
            "request" => request.name()
        )
        .record(started_at.elapsed().as_secs_f64());

        res.tap_err(|err| {
            metrics::counter!("dynastore_request_errors",
                "operation" => op.as_str(),
                "request" => request.name(),
                "error" => err.kind_name()
            )
            .increment(1);

            tracing::debug!(?err, table = %self.name, request = request.name(), "request failed")
        })
    }
}

fn is_condition_failure(err: &Error) -> bool {
    err.store_error()
        .is_some_and(|err| err.is_conditional_check_failed())
}

fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}
