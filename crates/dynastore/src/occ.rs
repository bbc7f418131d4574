//! Optimistic concurrency control.
//!
//! Every write increments the `version` attribute of a record. Atomic writes
//! additionally assert what the caller last observed:
//!
//! - without a previous record, that the key is free: either it was never
//!   written or its record is expired;
//! - with a previous record, that the stored version is still the one of the
//!   previous record and that the stored record is not expired.

use {
    crate::{
        codec::{
            EXPIRES_ATTRIBUTE,
            PARTITION_KEY_ATTRIBUTE,
            PAYLOAD_ATTRIBUTE,
            SORT_KEY_ATTRIBUTE,
            VERSION_ATTRIBUTE,
        },
        expression::{Comparator, Condition, Update},
        options::{self, Ttl, WriteOptions},
        KvPair,
        Result,
    },
    time::OffsetDateTime,
};

/// Builds the update of a write executed at `now`.
///
/// A TTL is added to `now` before truncating to Unix seconds, so the stored
/// `expires` is the second the record expires in.
///
/// Fails if one of the fields uses a reserved attribute name.
pub fn build_update(opts: &WriteOptions, now: OffsetDateTime) -> Result<Update> {
    options::validate_fields(&opts.fields)?;

    let mut update = Update::new().add(VERSION_ATTRIBUTE, 1);

    if let Some(value) = &opts.value {
        update = update.set(PAYLOAD_ATTRIBUTE, value.clone());
    }

    for (name, value) in &opts.fields {
        update = update.set(name.clone(), value.clone());
    }

    match opts.ttl {
        Ttl::Keep => {}
        Ttl::After(ttl) => {
            let expires = time::Duration::try_from(ttl)
                .ok()
                .and_then(|ttl| now.checked_add(ttl))
                .map_or(i64::MAX, OffsetDateTime::unix_timestamp);
            update = update.set(EXPIRES_ATTRIBUTE, expires);
        }
        Ttl::Never => update = update.remove(EXPIRES_ATTRIBUTE),
    }

    Ok(update)
}

/// Builds the condition of an atomic put at `now` (Unix seconds).
///
/// A record with `expires == now` is expired: it can be created over
/// (`expires <= now`) and can't be updated (`expires > now`).
pub fn put_condition(previous: Option<&KvPair>, now: i64) -> Condition {
    match previous {
        None => Condition::not_exists(PARTITION_KEY_ATTRIBUTE)
            .and(Condition::not_exists(SORT_KEY_ATTRIBUTE))
            .or(Condition::exists(EXPIRES_ATTRIBUTE)
                .and(Condition::compare(EXPIRES_ATTRIBUTE, Comparator::Le, now))),
        Some(prev) => version_condition(prev).and(
            Condition::not_exists(EXPIRES_ATTRIBUTE)
                .or(Condition::compare(EXPIRES_ATTRIBUTE, Comparator::Gt, now)),
        ),
    }
}

/// Builds the condition of an atomic delete of `previous`.
pub fn delete_condition(previous: &KvPair) -> Condition {
    version_condition(previous)
}

fn version_condition(prev: &KvPair) -> Condition {
    Condition::compare(VERSION_ATTRIBUTE, Comparator::Eq, prev.version)
}
