//! Remote key-value store abstraction.
//!
//! [`Store`] is the seam between the [`Table`](crate::Table) facade and the
//! service actually persisting the items. Requests carry typed
//! [expressions](crate::expression), which a network backed implementation
//! renders via [`Request::expression`].

use {
    crate::{
        attribute::AttributeMap,
        expression::{Condition, Expression, KeyCondition, Update},
    },
    std::future::Future,
};

/// Result of a [`Store`] request.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Remote store with conditional writes and ordered range queries.
pub trait Store: Send + Sync + 'static {
    /// Reads a single item by its primary key.
    fn get_item<'a>(
        &'a self,
        req: &'a GetItem,
    ) -> impl Future<Output = StoreResult<Option<AttributeMap>>> + Send + 'a;

    /// Creates or updates a single item if the condition holds, returning
    /// the item as it is after the update.
    fn update_item<'a>(
        &'a self,
        req: &'a UpdateItem,
    ) -> impl Future<Output = StoreResult<AttributeMap>> + Send + 'a;

    /// Deletes a single item if the condition holds. Deleting a missing item
    /// without a condition succeeds.
    fn delete_item<'a>(
        &'a self,
        req: &'a DeleteItem,
    ) -> impl Future<Output = StoreResult<()>> + Send + 'a;

    /// Reads a page of items matching a key condition.
    fn query<'a>(
        &'a self,
        req: &'a Query,
    ) -> impl Future<Output = StoreResult<QueryOutput>> + Send + 'a;
}

#[derive(Clone, Debug, PartialEq)]
pub struct GetItem {
    pub table: String,
    pub key: AttributeMap,
    pub consistent_read: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateItem {
    pub table: String,
    pub key: AttributeMap,
    pub condition: Option<Condition>,
    pub update: Update,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeleteItem {
    pub table: String,
    pub key: AttributeMap,
    pub condition: Option<Condition>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub table: String,

    /// Name of the secondary index to query, the table itself if `None`.
    pub index: Option<String>,

    pub key_condition: KeyCondition,
    pub consistent_read: bool,

    /// Maximum number of items to evaluate, store defined if `None`.
    pub limit: Option<u32>,

    /// Ascending sort key order if `true`.
    pub scan_forward: bool,

    /// Key of the last item of the previous page.
    pub exclusive_start_key: Option<AttributeMap>,
}

/// Page of items returned by [`Store::query`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryOutput {
    pub items: Vec<AttributeMap>,

    /// Key to resume from, `None` if there are no more items.
    pub last_evaluated_key: Option<AttributeMap>,
}

/// Reference to a [`Store`] request about to be sent.
#[derive(Clone, Copy, Debug)]
pub enum Request<'a> {
    GetItem(&'a GetItem),
    UpdateItem(&'a UpdateItem),
    DeleteItem(&'a DeleteItem),
    Query(&'a Query),
}

impl Request<'_> {
    /// Returns the name of the store API call.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetItem(_) => "GetItem",
            Self::UpdateItem(_) => "UpdateItem",
            Self::DeleteItem(_) => "DeleteItem",
            Self::Query(_) => "Query",
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Self::GetItem(req) => &req.table,
            Self::UpdateItem(req) => &req.table,
            Self::DeleteItem(req) => &req.table,
            Self::Query(req) => &req.table,
        }
    }

    /// Renders the expressions of this request.
    pub fn expression(&self) -> Expression {
        let builder = Expression::builder();

        match self {
            Self::GetItem(_) => builder,
            Self::UpdateItem(req) => match &req.condition {
                Some(cond) => builder.condition(cond),
                None => builder,
            }
            .update(&req.update),
            Self::DeleteItem(req) => match &req.condition {
                Some(cond) => builder.condition(cond),
                None => builder,
            },
            Self::Query(req) => builder.key_condition(&req.key_condition),
        }
        .build()
    }
}

/// [`Store`] error.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
#[error("{kind:?}({details:?})")]
pub struct StoreError {
    kind: StoreErrorKind,
    details: Option<String>,
}

/// [`StoreError`] kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Condition of a conditional write evaluated to false.
    ConditionalCheckFailed,

    /// The table or index doesn't exist.
    ResourceNotFound,

    /// The request is malformed.
    Validation,

    /// Request rate is too high.
    Throttled,

    /// Transport error.
    Transport,

    /// Internal error.
    Internal,

    /// Unable to determine [`StoreErrorKind`] of a [`StoreError`].
    Unknown,
}

impl StoreErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConditionalCheckFailed => "conditional_check_failed",
            Self::ResourceNotFound => "resource_not_found",
            Self::Validation => "validation",
            Self::Throttled => "throttled",
            Self::Transport => "transport",
            Self::Internal => "internal",
            Self::Unknown => "unknown",
        }
    }
}

impl StoreError {
    /// Creates a new [`StoreError`].
    pub fn new(kind: StoreErrorKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            details: Some(details.into()),
        }
    }

    /// Returns [`StoreErrorKind`] of this [`StoreError`].
    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn is_conditional_check_failed(&self) -> bool {
        self.kind == StoreErrorKind::ConditionalCheckFailed
    }
}

impl From<StoreErrorKind> for StoreError {
    fn from(kind: StoreErrorKind) -> Self {
        Self {
            kind,
            details: None,
        }
    }
}
