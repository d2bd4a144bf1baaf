use std::future::IntoFuture;
use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use rustack_dynamodb_model::input::BatchWriteItemInput;
use rustack_dynamodb_model::types::WriteRequest;
use rustack_dynamodb_model::{Item, Key};

use super::put::stamp_item;
use super::{Deferred, OperationFuture, check_deferred, defer};
use crate::client::Client;
use crate::error::ClientResult;
use crate::model::Model;
use crate::pagination::BatchWritePager;

/// Put and delete many items, in chunks of at most
/// [`BATCH_WRITE_MAX_ITEMS`](crate::pagination::BATCH_WRITE_MAX_ITEMS).
///
/// Puts and deletes go into one request list, puts first. Requests the store
/// leaves unprocessed are retried before the next chunk is sent. Resolves to
/// the number of requests written.
#[derive(Debug)]
pub struct BatchWrite<M> {
    client: Client,
    puts: Vec<Item>,
    deletes: Vec<Key>,
    quiet: bool,
    now: DateTime<Utc>,
    deferred: Option<Deferred>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> BatchWrite<M> {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            puts: Vec::new(),
            deletes: Vec::new(),
            quiet: false,
            now: Utc::now(),
            deferred: None,
            _model: PhantomData,
        }
    }

    /// Put `record`.
    #[must_use]
    pub fn put(self, record: &M) -> Self {
        self.put_item(record.to_item())
    }

    /// Put every record of `records`.
    #[must_use]
    pub fn put_all<'a>(self, records: impl IntoIterator<Item = &'a M>) -> Self {
        records.into_iter().fold(self, Self::put)
    }

    /// Put a raw attribute map.
    #[must_use]
    pub fn put_item(mut self, mut item: Item) -> Self {
        stamp_item(self.client.config(), M::schema(), &mut item, self.now);
        self.puts.push(item);
        self
    }

    /// Delete the item stored under `key`.
    #[must_use]
    pub fn delete(mut self, key: Key) -> Self {
        self.deletes.push(key);
        self
    }

    /// Delete the items stored under every key of `keys`.
    #[must_use]
    pub fn delete_all(mut self, keys: impl IntoIterator<Item = Key>) -> Self {
        self.deletes.extend(keys);
        self
    }

    /// Delete the item `record` is stored under.
    #[must_use]
    pub fn delete_record(mut self, record: &M) -> Self {
        match record.primary_key() {
            Ok(key) => self.deletes.push(key),
            Err(e) => defer(&mut self.deferred, Deferred::Schema(e)),
        }
        self
    }

    /// Request no capacity or metrics.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    fn requests(&self) -> Vec<WriteRequest> {
        self.puts
            .iter()
            .cloned()
            .map(WriteRequest::put)
            .chain(self.deletes.iter().cloned().map(WriteRequest::delete))
            .collect()
    }

    /// A pager that sends the chunks in order.
    pub fn pager(&self) -> ClientResult<BatchWritePager> {
        check_deferred(self.deferred.as_ref())?;
        Ok(BatchWritePager::new(
            self.client.transport().clone(),
            self.client.table_name::<M>(),
            self.requests(),
            self.client.consumed_capacity(self.quiet),
            self.client.collection_metrics(self.quiet),
        ))
    }

    /// One request per chunk, before any unprocessed retry.
    pub fn to_inputs(&self) -> ClientResult<Vec<BatchWriteItemInput>> {
        Ok(self.pager()?.inputs())
    }

    /// The requests as DynamoDB JSON.
    pub fn to_json(&self) -> ClientResult<serde_json::Value> {
        Ok(serde_json::to_value(self.to_inputs()?)?)
    }

    /// Send every chunk and return the number of requests written.
    pub async fn send(self) -> ClientResult<usize> {
        let mut pager = self.pager()?;
        let mut written = 0;
        while let Some(accepted) = pager.next_page().await? {
            written += accepted;
        }
        Ok(written)
    }

    /// Finish the write, then read `keys` back.
    pub async fn then_get(self, keys: impl IntoIterator<Item = Key>) -> ClientResult<Vec<M>> {
        let keys: Vec<Key> = keys.into_iter().collect();
        let client = self.client.clone();
        self.send().await?;
        client.batch_get::<M>(keys).all().await
    }
}

impl<M: Model> IntoFuture for BatchWrite<M> {
    type Output = ClientResult<usize>;
    type IntoFuture = OperationFuture<usize>;

    fn into_future(self) -> Self::IntoFuture {
        self.send().boxed()
    }
}
