use {
    crate::{store::Store, Context, KvPair, Page, ReadOptions, Result, Table, WriteOptions},
    derivative::Derivative,
    std::sync::Arc,
};

/// Handle of a single partition of a [`Table`].
///
/// Every operation delegates to the same [`Table`] operation with the bound
/// partition name.
#[derive(Derivative)]
#[derivative(Clone(bound = ""), Debug(bound = ""))]
pub struct Partition<S> {
    table: Table<S>,
    name: Arc<str>,
}

impl<S: Store> Partition<S> {
    pub(crate) fn new(table: Table<S>, name: String) -> Self {
        Self {
            table,
            name: name.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        self.table.table_name()
    }

    pub fn partition_name(&self) -> &str {
        &self.name
    }

    /// See [`Table::put`].
    pub async fn put(&self, key: &str, opts: WriteOptions) -> Result<()> {
        self.table.put(&self.name, key, opts).await
    }

    pub async fn put_with_context(&self, ctx: Context, key: &str, opts: WriteOptions) -> Result<()> {
        self.table.put_with_context(ctx, &self.name, key, opts).await
    }

    /// See [`Table::get`].
    pub async fn get(&self, key: &str, opts: ReadOptions) -> Result<KvPair> {
        self.table.get(&self.name, key, opts).await
    }

    pub async fn get_with_context(&self, ctx: Context, key: &str, opts: ReadOptions) -> Result<KvPair> {
        self.table.get_with_context(ctx, &self.name, key, opts).await
    }

    /// See [`Table::exists`].
    pub async fn exists(&self, key: &str, opts: ReadOptions) -> Result<bool> {
        self.table.exists(&self.name, key, opts).await
    }

    pub async fn exists_with_context(&self, ctx: Context, key: &str, opts: ReadOptions) -> Result<bool> {
        self.table
            .exists_with_context(ctx, &self.name, key, opts)
            .await
    }

    /// See [`Table::delete`].
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.table.delete(&self.name, key).await
    }

    pub async fn delete_with_context(&self, ctx: Context, key: &str) -> Result<()> {
        self.table.delete_with_context(ctx, &self.name, key).await
    }

    /// See [`Table::list`].
    #[deprecated(note = "reading every page under a deadline doesn't scale, use `list_page`")]
    #[allow(deprecated)]
    pub async fn list(&self, prefix: &str, opts: ReadOptions) -> Result<Vec<KvPair>> {
        self.table.list(&self.name, prefix, opts).await
    }

    #[deprecated(note = "reading every page under a deadline doesn't scale, use `list_page_with_context`")]
    #[allow(deprecated)]
    pub async fn list_with_context(&self, ctx: Context, prefix: &str, opts: ReadOptions) -> Result<Vec<KvPair>> {
        self.table
            .list_with_context(ctx, &self.name, prefix, opts)
            .await
    }

    /// See [`Table::list_page`].
    pub async fn list_page(&self, prefix: &str, opts: ReadOptions) -> Result<Page> {
        self.table.list_page(&self.name, prefix, opts).await
    }

    pub async fn list_page_with_context(&self, ctx: Context, prefix: &str, opts: ReadOptions) -> Result<Page> {
        self.table
            .list_page_with_context(ctx, &self.name, prefix, opts)
            .await
    }

    /// See [`Table::atomic_put`].
    pub async fn atomic_put(&self, key: &str, opts: WriteOptions) -> Result<KvPair> {
        self.table.atomic_put(&self.name, key, opts).await
    }

    pub async fn atomic_put_with_context(&self, ctx: Context, key: &str, opts: WriteOptions) -> Result<KvPair> {
        self.table
            .atomic_put_with_context(ctx, &self.name, key, opts)
            .await
    }

    /// See [`Table::atomic_delete`].
    pub async fn atomic_delete(&self, key: &str, previous: Option<&KvPair>) -> Result<()> {
        self.table.atomic_delete(&self.name, key, previous).await
    }

    pub async fn atomic_delete_with_context(
        &self,
        ctx: Context,
        key: &str,
        previous: Option<&KvPair>,
    ) -> Result<()> {
        self.table
            .atomic_delete_with_context(ctx, &self.name, key, previous)
            .await
    }
}
