use {
    dynastore::{
        Error,
        KvPair,
        MemoryStore,
        Operation,
        Partition,
        ReadOptions,
        Session,
        StoreErrorKind,
        TableSchema,
        WriteOptions,
    },
    rstest::rstest,
    serde::{Deserialize, Serialize},
    std::time::Duration,
    time::OffsetDateTime,
};

const TABLE: &str = "kv";

fn setup() -> (MemoryStore, Partition<MemoryStore>) {
    let store = MemoryStore::new().with_table(
        TABLE,
        TableSchema::new().with_local_index("idx_created", "created"),
    );
    let partition = Session::new(store.clone()).table(TABLE).partition("agent");

    (store, partition)
}

fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[test_log::test(tokio::test)]
async fn put_increments_version() {
    let (_, kv) = setup();

    kv.put("config", WriteOptions::new().with_string("v1"))
        .await
        .unwrap();

    let rec = kv.get("config", ReadOptions::new()).await.unwrap();
    assert_eq!(rec.partition, "agent");
    assert_eq!(rec.key, "config");
    assert_eq!(rec.version, 1);
    assert_eq!(rec.expires, 0);
    assert_eq!(rec.string_value(), Some("v1"));

    // A put without a value keeps the stored one.
    kv.put("config", WriteOptions::new()).await.unwrap();
    let rec = kv.get("config", ReadOptions::new()).await.unwrap();
    assert_eq!(rec.version, 2);
    assert_eq!(rec.string_value(), Some("v1"));

    kv.put("config", WriteOptions::new().with_string("v3"))
        .await
        .unwrap();
    let rec = kv.get("config", ReadOptions::new()).await.unwrap();
    assert_eq!(rec.version, 3);
    assert_eq!(rec.string_value(), Some("v3"));
}

#[test_log::test(tokio::test)]
async fn get_exists_and_delete() {
    let (_, kv) = setup();

    assert!(matches!(
        kv.get("missing", ReadOptions::new()).await,
        Err(Error::KeyNotFound)
    ));
    assert!(!kv.exists("missing", ReadOptions::new()).await.unwrap());

    kv.put("k", WriteOptions::new()).await.unwrap();
    assert!(kv.exists("k", ReadOptions::new()).await.unwrap());

    kv.delete("k").await.unwrap();
    assert!(!kv.exists("k", ReadOptions::new()).await.unwrap());
    assert!(kv.get("k", ReadOptions::new()).await.unwrap_err().is_not_found());

    // Deleting a missing record succeeds.
    kv.delete("k").await.unwrap();
}

#[test_log::test(tokio::test)]
async fn single_record_reads_reject_indexes() {
    let (store, kv) = setup();
    let opts = ReadOptions::new().with_local_index("idx_created", "created");

    assert!(matches!(
        kv.get("k", opts.clone()).await,
        Err(Error::IndexNotSupported)
    ));
    assert!(matches!(
        kv.exists("k", opts).await,
        Err(Error::IndexNotSupported)
    ));
    assert_eq!(store.request_count(), 0);
}

#[test_log::test(tokio::test)]
async fn atomic_put_create_and_update() {
    let (_, kv) = setup();

    let v1 = kv
        .atomic_put("k", WriteOptions::new().with_string("one"))
        .await
        .unwrap();
    assert_eq!(v1.version, 1);
    assert_eq!(v1.string_value(), Some("one"));

    // Creating an existing record fails.
    let err = kv
        .atomic_put("k", WriteOptions::new().with_string("dup"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::KeyExists));
    assert!(err.is_conflict());

    let v2 = kv
        .atomic_put(
            "k",
            WriteOptions::new()
                .with_string("two")
                .with_previous(v1.clone()),
        )
        .await
        .unwrap();
    assert_eq!(v2.version, 2);
    assert_eq!(v2.string_value(), Some("two"));

    // Updating from a stale version fails and leaves the record untouched.
    let err = kv
        .atomic_put(
            "k",
            WriteOptions::new().with_string("three").with_previous(v1),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::KeyModified));

    assert_eq!(kv.get("k", ReadOptions::new()).await.unwrap(), v2);
}

#[test_log::test(tokio::test)]
async fn expired_records_are_absent() {
    let (store, kv) = setup();

    kv.put("k", WriteOptions::new().with_ttl(Duration::ZERO))
        .await
        .unwrap();

    // Still physically stored.
    assert!(store.item(TABLE, "agent", "k").is_some());

    assert!(matches!(
        kv.get("k", ReadOptions::new()).await,
        Err(Error::KeyNotFound)
    ));
    assert!(!kv.exists("k", ReadOptions::new()).await.unwrap());

    // An expired record can't be updated, but can be created over.
    let stale = KvPair::new("agent", "k", 1);
    assert!(matches!(
        kv.atomic_put("k", WriteOptions::new().with_previous(stale))
            .await,
        Err(Error::KeyModified)
    ));

    let rec = kv
        .atomic_put("k", WriteOptions::new().with_no_expires())
        .await
        .unwrap();
    assert_eq!(rec.version, 2);
    assert_eq!(rec.expires, 0);
}

#[test_log::test(tokio::test)]
async fn ttl_is_set_kept_and_cleared() {
    let (_, kv) = setup();
    let hour = Duration::from_secs(3600);

    let before = unix_now();
    kv.put("k", WriteOptions::new().with_ttl(hour))
        .await
        .unwrap();
    let expires = kv.get("k", ReadOptions::new()).await.unwrap().expires;
    assert!(expires >= before + 3600);
    assert!(expires <= unix_now() + 3600);

    kv.put("k", WriteOptions::new().with_string("v"))
        .await
        .unwrap();
    assert_eq!(
        kv.get("k", ReadOptions::new()).await.unwrap().expires,
        expires
    );

    kv.put("k", WriteOptions::new().with_no_expires())
        .await
        .unwrap();
    assert_eq!(kv.get("k", ReadOptions::new()).await.unwrap().expires, 0);
}

#[test_log::test(tokio::test)]
async fn ttl_keeps_sub_second_precision() {
    let (_, kv) = setup();
    let ttl = Duration::from_millis(1500);

    let before = OffsetDateTime::now_utc();
    kv.put("k", WriteOptions::new().with_ttl(ttl))
        .await
        .unwrap();
    let after = OffsetDateTime::now_utc();

    let rec = kv.get("k", ReadOptions::new()).await.unwrap();
    assert!(rec.expires >= (before + ttl).unix_timestamp());
    assert!(rec.expires <= (after + ttl).unix_timestamp());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_of_the_same_version() {
    let (_, kv) = setup();
    let v1 = kv.atomic_put("k", WriteOptions::new()).await.unwrap();

    let writers: Vec<_> = (0..16)
        .map(|i| {
            let kv = kv.clone();
            let opts = WriteOptions::new()
                .with_string(format!("writer-{i}"))
                .with_previous(v1.clone());

            tokio::spawn(async move { kv.atomic_put("k", opts).await })
        })
        .collect();

    let mut written = Vec::new();
    let mut modified = 0;
    for writer in writers {
        match writer.await.unwrap() {
            Ok(rec) => written.push(rec),
            Err(Error::KeyModified) => modified += 1,
            Err(err) => panic!("unexpected error: {err}"),
        }
    }

    assert_eq!(written.len(), 1);
    assert_eq!(modified, 15);
    assert_eq!(written[0].version, 2);
    assert_eq!(kv.get("k", ReadOptions::new()).await.unwrap(), written[0]);
}

#[rstest]
#[case::id("id")]
#[case::name("name")]
#[case::version("version")]
#[case::expires("expires")]
#[case::payload("payload")]
#[tokio::test]
async fn reserved_fields_are_rejected_before_any_request(#[case] field: &str) {
    let (store, kv) = setup();
    let opts = WriteOptions::new().with_fields([(field, "x")]);

    let err = kv.put("k", opts.clone()).await.unwrap_err();
    assert!(matches!(err, Error::ReservedField(name) if name == field));

    let err = kv.atomic_put("k", opts).await.unwrap_err();
    assert!(matches!(err, Error::ReservedField(name) if name == field));

    assert_eq!(store.request_count(), 0);
}

#[test_log::test(tokio::test)]
async fn atomic_delete() {
    let (store, kv) = setup();

    let rec = kv.atomic_put("k", WriteOptions::new()).await.unwrap();

    // Without a previous record a live record can't be deleted.
    assert!(matches!(
        kv.atomic_delete("k", None).await,
        Err(Error::KeyExists)
    ));
    assert!(kv.exists("k", ReadOptions::new()).await.unwrap());

    // A stale previous record doesn't delete anything.
    let stale = KvPair::new("agent", "k", rec.version + 1);
    assert!(matches!(
        kv.atomic_delete("k", Some(&stale)).await,
        Err(Error::KeyNotFound)
    ));

    kv.atomic_delete("k", Some(&rec)).await.unwrap();
    assert!(!kv.exists("k", ReadOptions::new()).await.unwrap());

    // Deleting again finds nothing.
    assert!(matches!(
        kv.atomic_delete("k", Some(&rec)).await,
        Err(Error::KeyNotFound)
    ));

    // Without a previous record and nothing stored only the read is sent.
    let requests = store.request_count();
    assert!(matches!(
        kv.atomic_delete("k", None).await,
        Err(Error::KeyNotFound)
    ));
    assert_eq!(store.request_count(), requests + 1);
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Settings {
    enabled: bool,
    retries: u32,
    tags: Vec<String>,
}

#[derive(Debug, PartialEq, Deserialize)]
struct IndexFields {
    created: String,
}

#[test_log::test(tokio::test)]
async fn payload_kinds() {
    let (_, kv) = setup();

    kv.put("bytes", WriteOptions::new().with_bytes([0u8, 1, 2, 255]))
        .await
        .unwrap();
    let rec = kv.get("bytes", ReadOptions::new()).await.unwrap();
    assert_eq!(rec.bytes_value(), Some(vec![0, 1, 2, 255]));

    let settings = Settings {
        enabled: true,
        retries: 3,
        tags: vec!["a".into(), "b".into()],
    };
    let value = dynastore::AttributeValue::from_serialize(&settings).unwrap();

    kv.put(
        "struct",
        WriteOptions::new()
            .with_value(value)
            .with_fields([("created", "20200103T1100Z")]),
    )
    .await
    .unwrap();

    let rec = kv.get("struct", ReadOptions::new()).await.unwrap();
    assert_eq!(rec.decode_value::<Settings>().unwrap(), settings);
    assert_eq!(rec.decode_fields::<IndexFields>().unwrap(), IndexFields {
        created: "20200103T1100Z".into()
    });
}

#[test_log::test(tokio::test)]
async fn store_errors_are_wrapped() {
    let (store, kv) = setup();
    store.break_();

    let err = kv.get("k", ReadOptions::new()).await.unwrap_err();
    assert!(matches!(
        &err,
        Error::Store { operation: Operation::Get, source } if source.kind() == StoreErrorKind::Internal
    ));

    // Store failures of atomic writes are not mistaken for conflicts.
    let err = kv.atomic_put("k", WriteOptions::new()).await.unwrap_err();
    assert!(matches!(err, Error::Store { operation: Operation::AtomicPut, .. }));
}

#[test_log::test(tokio::test)]
async fn unknown_table() {
    let session = Session::new(MemoryStore::new());
    let kv = session.table("missing").partition("p");

    assert_eq!(kv.table_name(), "missing");
    assert_eq!(kv.partition_name(), "p");

    let err = kv.put("k", WriteOptions::new()).await.unwrap_err();
    assert_eq!(
        err.store_error().map(|err| err.kind()),
        Some(StoreErrorKind::ResourceNotFound)
    );
}
