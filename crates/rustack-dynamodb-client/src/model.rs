//! The record trait connecting typed values to attribute maps.

use std::str::FromStr;

use rustack_dynamodb_model::{AttributeValue, Item, Key};

use crate::error::{ClientError, ClientResult, SchemaError};
use crate::schema::TableSchema;

/// A record type stored in one table.
///
/// Implementors own (de)hydration; the client never inspects fields beyond the
/// key and timestamp attributes named by [`Model::schema`].
pub trait Model: Sized + Send + 'static {
    /// The table descriptor, built once per type.
    fn schema() -> &'static TableSchema;

    /// Hydrate a record from an attribute map returned by the store.
    fn from_item(item: Item) -> ClientResult<Self>;

    /// Dehydrate into an attribute map.
    fn to_item(&self) -> Item;

    /// The record's primary key.
    fn primary_key(&self) -> Result<Key, SchemaError> {
        Self::schema().extract_key(&self.to_item())
    }
}

/// Hydrate a page of items.
pub(crate) fn hydrate<M: Model>(items: Vec<Item>) -> ClientResult<Vec<M>> {
    items.into_iter().map(M::from_item).collect()
}

/// Remove a string attribute from `item`.
pub fn take_string(item: &mut Item, field: &str) -> ClientResult<String> {
    match item.remove(field) {
        Some(AttributeValue::S(value)) => Ok(value),
        Some(other) => Err(ClientError::hydration(format!(
            "{field}: expected S, got {}",
            other.type_descriptor()
        ))),
        None => Err(ClientError::hydration(format!("{field}: missing"))),
    }
}

/// Remove a number attribute from `item` and parse it.
pub fn take_number<T: FromStr>(item: &mut Item, field: &str) -> ClientResult<T> {
    match item.remove(field) {
        Some(AttributeValue::N(value)) => value
            .parse()
            .map_err(|_| ClientError::hydration(format!("{field}: invalid number {value}"))),
        Some(other) => Err(ClientError::hydration(format!(
            "{field}: expected N, got {}",
            other.type_descriptor()
        ))),
        None => Err(ClientError::hydration(format!("{field}: missing"))),
    }
}
