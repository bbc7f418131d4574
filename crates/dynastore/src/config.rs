use {
    crate::hooks::{NoopHooks, StoreHooks},
    derivative::Derivative,
    serde::Deserialize,
    std::{sync::Arc, time::Duration},
    tap::Pipe as _,
};

/// Prefix of the environment variables read by [`Config::from_env`].
pub const ENV_PREFIX: &str = "DYNASTORE_";

const DEFAULT_LIST_TIMEOUT_MS: u64 = 10_000;

/// [`Session`](crate::Session) configuration.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Config {
    /// Upper bound of the time the deprecated `list` operation spends
    /// paging through results.
    ///
    /// Default: 10s
    pub list_timeout: Duration,

    /// Whether reads are strongly consistent unless requested otherwise.
    ///
    /// Default: `true`
    pub consistent_read: bool,

    /// Hooks invoked before every remote call.
    ///
    /// Default: [`NoopHooks`]
    #[derivative(Debug = "ignore")]
    pub hooks: Arc<dyn StoreHooks>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            list_timeout: Duration::from_millis(DEFAULT_LIST_TIMEOUT_MS),
            consistent_read: true,
            hooks: Arc::new(NoopHooks),
        }
    }

    /// Overwrites [`Config::list_timeout`].
    pub fn with_list_timeout(mut self, timeout: Duration) -> Self {
        self.list_timeout = timeout;
        self
    }

    /// Overwrites [`Config::consistent_read`].
    pub fn with_consistent_read(mut self, consistent: bool) -> Self {
        self.consistent_read = consistent;
        self
    }

    /// Overwrites [`Config::hooks`].
    pub fn with_hooks(mut self, hooks: impl StoreHooks) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Builds [`Config`] from `DYNASTORE_` prefixed environment variables,
    /// using the defaults for the missing ones.
    pub fn from_env() -> envy::Result<Self> {
        Self::from_vars(std::env::vars())
    }

    fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> envy::Result<Self> {
        let raw = envy::prefixed(ENV_PREFIX).from_iter::<_, RawConfig>(vars)?;

        let config = Self {
            list_timeout: raw
                .list_timeout_ms
                .unwrap_or(DEFAULT_LIST_TIMEOUT_MS)
                .pipe(Duration::from_millis),
            consistent_read: raw.consistent_read.unwrap_or(true),
            hooks: Arc::new(NoopHooks),
        };

        tracing::debug!(?config, "dynastore configuration");

        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    list_timeout_ms: Option<u64>,
    consistent_read: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn defaults() {
        let config = Config::from_vars(vars(&[("UNRELATED", "1")])).unwrap();

        assert_eq!(config.list_timeout, Duration::from_secs(10));
        assert!(config.consistent_read);
    }

    #[test]
    fn reads_prefixed_variables() {
        let config = Config::from_vars(vars(&[
            ("DYNASTORE_LIST_TIMEOUT_MS", "2500"),
            ("DYNASTORE_CONSISTENT_READ", "false"),
            ("LIST_TIMEOUT_MS", "1"),
        ]))
        .unwrap();

        assert_eq!(config.list_timeout, Duration::from_millis(2500));
        assert!(!config.consistent_read);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(Config::from_vars(vars(&[("DYNASTORE_LIST_TIMEOUT_MS", "soon")])).is_err());
    }

    #[test]
    fn builder_and_debug() {
        let config = Config::new()
            .with_list_timeout(Duration::from_secs(1))
            .with_consistent_read(false)
            .with_hooks(crate::TracingHooks);

        assert_eq!(config.list_timeout, Duration::from_secs(1));
        assert!(!config.consistent_read);

        let debug = format!("{config:?}");
        assert!(debug.contains("list_timeout"));
        assert!(!debug.contains("hooks"));
    }
}
