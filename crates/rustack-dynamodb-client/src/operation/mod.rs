//! Operation builders.
//!
//! One builder per operation kind. A builder is a plain value owned by the
//! call chain that created it: every method takes `self` and returns it, and
//! nothing is sent until a terminal (`send()`, `all()`, `.await`, ...) runs.
//! `to_input()` / `to_json()` render the exact request the transport would
//! receive, and may be called any number of times.

mod batch_get;
mod batch_write;
mod clause;
mod delete;
mod get;
mod put;
mod query;
mod scan;
mod update;

use futures::future::BoxFuture;
use rustack_dynamodb_model::Item;
use rustack_dynamodb_model::types::ReturnValue;

pub use self::batch_get::BatchGet;
pub use self::batch_write::BatchWrite;
pub use self::clause::{Clause, Group, KeyClause, ScopeOwner, SizeClause};
pub use self::delete::Delete;
pub use self::get::Get;
pub use self::put::Put;
pub use self::query::Query;
pub use self::scan::Scan;
pub use self::update::{SetClause, Update};

use crate::error::{ClientError, ClientResult, SchemaError};
use crate::expression::{Bucket, LogicScope, Operator};

/// Boxed future returned by the builders' `IntoFuture` impls.
pub type OperationFuture<T> = BoxFuture<'static, ClientResult<T>>;

/// Result order of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Ascending range key order.
    #[default]
    Ascending,
    /// Descending range key order.
    Descending,
}

/// A builder-level error recorded by a fluent call and reported when the
/// request is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Deferred {
    Schema(SchemaError),
    Invalid(String),
}

impl Deferred {
    pub(crate) fn to_error(&self) -> ClientError {
        match self {
            Self::Schema(e) => ClientError::Schema(e.clone()),
            Self::Invalid(message) => ClientError::invalid_parameter(message.clone()),
        }
    }
}

/// Keep the first deferred error.
pub(crate) fn defer(slot: &mut Option<Deferred>, error: Deferred) {
    slot.get_or_insert(error);
}

/// Report a deferred error, if any.
pub(crate) fn check_deferred(slot: Option<&Deferred>) -> ClientResult<()> {
    slot.map_or(Ok(()), |e| Err(e.to_error()))
}

/// Register every whitespace-separated path of `paths` in the projection.
pub(crate) fn project(scope: &mut LogicScope, paths: &str) {
    for path in paths.split_whitespace() {
        scope.push(Bucket::Projection, path, &Operator::Name);
    }
}

/// The attributes returned by a write or read, absent when the store sent none.
pub(crate) fn non_empty(item: Option<Item>) -> Option<Item> {
    item.filter(|item| !item.is_empty())
}

/// Typed terminals hydrate whole items only. `UPDATED_OLD` / `UPDATED_NEW`
/// return the touched attributes alone and must go through `send_item()`.
pub(crate) fn check_whole_item(return_values: ReturnValue) -> ClientResult<()> {
    match return_values {
        ReturnValue::UpdatedOld | ReturnValue::UpdatedNew => {
            Err(ClientError::invalid_parameter(format!(
                "ReturnValues={} returns a partial item, use send_item()",
                return_values.as_str()
            )))
        }
        _ => Ok(()),
    }
}
