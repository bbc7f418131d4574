use {
    dynastore::{MemoryStore, ReadOptions, Session, TableSchema, WriteOptions},
    metrics_exporter_prometheus::PrometheusBuilder,
};

/// Returns the value of the first sample of `name` carrying all `labels`.
fn sample<'a>(rendered: &'a str, name: &str, labels: &[(&str, &str)]) -> Option<&'a str> {
    let prefix = format!("{name}{{");

    rendered
        .lines()
        .find(|line| {
            line.starts_with(&prefix)
                && labels
                    .iter()
                    .all(|(key, value)| line.contains(&format!("{key}=\"{value}\"")))
        })
        .and_then(|line| line.rsplit(' ').next())
}

#[test]
fn requests_are_metered() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    metrics::with_local_recorder(&recorder, || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        rt.block_on(async {
            let store = MemoryStore::new().with_table("kv", TableSchema::new());
            let kv = Session::new(store.clone()).table("kv").partition("agent");

            kv.put("k", WriteOptions::new()).await.unwrap();
            kv.atomic_put("k", WriteOptions::new()).await.unwrap_err();

            store.break_();
            kv.get("k", ReadOptions::new()).await.unwrap_err();
        });
    });

    let rendered = handle.render();

    assert_eq!(
        sample(&rendered, "dynastore_request_duration_count", &[
            ("operation", "put"),
            ("request", "UpdateItem"),
        ]),
        Some("1")
    );
    assert_eq!(
        sample(&rendered, "dynastore_request_errors", &[
            ("operation", "atomic_put"),
            ("error", "conditional_check_failed"),
        ]),
        Some("1")
    );
    assert_eq!(
        sample(&rendered, "dynastore_request_errors", &[
            ("operation", "get"),
            ("request", "GetItem"),
            ("error", "internal"),
        ]),
        Some("1")
    );
    assert_eq!(
        sample(&rendered, "dynastore_request_errors", &[("operation", "put")]),
        None
    );
}
