use {
    crate::{store::Store, Config, Table},
    derivative::Derivative,
    std::sync::Arc,
};

/// Entry point of the library: a [`Store`] together with its [`Config`].
///
/// Cloning is cheap, clones share the store.
#[derive(Derivative)]
#[derivative(Clone(bound = ""), Debug(bound = ""))]
pub struct Session<S> {
    #[derivative(Debug = "ignore")]
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    store: S,
    config: Config,
}

impl<S: Store> Session<S> {
    /// Creates a [`Session`] using the default [`Config`].
    pub fn new(store: S) -> Self {
        Self::with_config(store, Config::default())
    }

    pub fn with_config(store: S, config: Config) -> Self {
        tracing::debug!(?config, "creating session");

        Self {
            inner: Arc::new(Inner { store, config }),
        }
    }

    /// Returns a handle of the table `name`.
    pub fn table(&self, name: &str) -> Table<S> {
        Table::new(self.clone(), name)
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}
