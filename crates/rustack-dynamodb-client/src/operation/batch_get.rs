use std::future::IntoFuture;
use std::marker::PhantomData;

use futures::future::{self, FutureExt};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use rustack_dynamodb_model::Key;
use rustack_dynamodb_model::input::BatchGetItemInput;
use rustack_dynamodb_model::types::KeysAndAttributes;

use super::{OperationFuture, project};
use crate::client::Client;
use crate::error::ClientResult;
use crate::expression::{Bucket, LogicScope};
use crate::model::{Model, hydrate};
use crate::pagination::BatchGetPager;

/// Read many items by key, in chunks of at most
/// [`BATCH_GET_MAX_KEYS`](crate::pagination::BATCH_GET_MAX_KEYS).
///
/// Keys the store leaves unprocessed are retried before the next chunk is
/// sent. Record order follows the store's responses, not the key order.
#[derive(Debug)]
pub struct BatchGet<M> {
    client: Client,
    keys: Vec<Key>,
    scope: LogicScope,
    consistent: bool,
    quiet: bool,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> BatchGet<M> {
    pub(crate) fn new(client: Client, keys: Vec<Key>) -> Self {
        Self {
            client,
            keys,
            scope: LogicScope::new(),
            consistent: false,
            quiet: false,
            _model: PhantomData,
        }
    }

    /// Only return the given attribute paths, separated by whitespace.
    #[must_use]
    pub fn select(mut self, paths: &str) -> Self {
        project(&mut self.scope, paths);
        self
    }

    /// Use strongly consistent reads.
    #[must_use]
    pub fn consistent(mut self) -> Self {
        self.consistent = true;
        self
    }

    /// Do not request consumed capacity.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// A pager that sends the chunks in order.
    pub fn pager(&self) -> ClientResult<BatchGetPager> {
        let compiled = self.scope.compile()?;
        let names = compiled.names();
        let template = KeysAndAttributes {
            keys: Vec::new(),
            projection_expression: compiled.expression(Bucket::Projection),
            expression_attribute_names: (!names.is_empty()).then_some(names),
            consistent_read: self.consistent.then_some(true),
        };
        Ok(BatchGetPager::new(
            self.client.transport().clone(),
            self.client.table_name::<M>(),
            self.keys.clone(),
            template,
            self.client.consumed_capacity(self.quiet),
        ))
    }

    /// One request per chunk, before any unprocessed retry.
    pub fn to_inputs(&self) -> ClientResult<Vec<BatchGetItemInput>> {
        Ok(self.pager()?.inputs())
    }

    /// The requests as DynamoDB JSON.
    pub fn to_json(&self) -> ClientResult<serde_json::Value> {
        Ok(serde_json::to_value(self.to_inputs()?)?)
    }

    /// Lazily yield the records read by each round.
    pub fn pages(self) -> BoxStream<'static, ClientResult<Vec<M>>> {
        match self.pager() {
            Ok(pager) => pager
                .into_stream()
                .and_then(|items| future::ready(hydrate::<M>(items)))
                .boxed(),
            Err(e) => stream::once(future::ready(Err(e))).boxed(),
        }
    }

    /// Collect every record.
    pub async fn all(self) -> ClientResult<Vec<M>> {
        self.pages().try_concat().await
    }
}

impl<M: Model> IntoFuture for BatchGet<M> {
    type Output = ClientResult<Vec<M>>;
    type IntoFuture = OperationFuture<Vec<M>>;

    fn into_future(self) -> Self::IntoFuture {
        self.all().boxed()
    }
}
