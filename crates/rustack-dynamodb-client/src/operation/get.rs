use std::future::IntoFuture;
use std::marker::PhantomData;

use futures::FutureExt;
use rustack_dynamodb_model::input::GetItemInput;
use rustack_dynamodb_model::{DynamoDBOperation, Item, Key};

use super::{OperationFuture, non_empty, project};
use crate::client::{Client, log_consumed_capacity};
use crate::error::{ClientError, ClientResult};
use crate::expression::{Bucket, LogicScope};
use crate::model::Model;

/// Point read by primary key. Resolves to `None` when no item has the key.
#[derive(Debug)]
pub struct Get<M> {
    client: Client,
    key: Key,
    scope: LogicScope,
    consistent: bool,
    quiet: bool,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Get<M> {
    pub(crate) fn new(client: Client, key: Key) -> Self {
        Self {
            client,
            key,
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

    /// Use a strongly consistent read.
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

    /// The request this builder sends.
    pub fn to_input(&self) -> ClientResult<GetItemInput> {
        let compiled = self.scope.compile()?;
        Ok(GetItemInput {
            table_name: self.client.table_name::<M>(),
            key: self.key.clone(),
            consistent_read: self.consistent.then_some(true),
            projection_expression: compiled.expression(Bucket::Projection),
            expression_attribute_names: compiled.names(),
            return_consumed_capacity: self.client.consumed_capacity(self.quiet),
        })
    }

    /// The request as DynamoDB JSON.
    pub fn to_json(&self) -> ClientResult<serde_json::Value> {
        Ok(serde_json::to_value(self.to_input()?)?)
    }

    /// Send the request and hydrate the item.
    ///
    /// A projected read returns a partial item, so with [`Self::select`] set
    /// this fails with [`ClientError::InvalidParameter`] before sending; use
    /// [`Self::send_item`] instead.
    pub async fn send(self) -> ClientResult<Option<M>> {
        if !self.scope.is_empty(Bucket::Projection) {
            return Err(ClientError::invalid_parameter(
                "a projected read returns a partial item, use send_item()",
            ));
        }
        self.send_item().await?.map(M::from_item).transpose()
    }

    /// Send the request and return the raw item, projected or not.
    pub async fn send_item(self) -> ClientResult<Option<Item>> {
        let input = self.to_input()?;
        let output = self.client.transport().get_item(input).await?;
        log_consumed_capacity(
            DynamoDBOperation::GetItem,
            output.consumed_capacity.as_ref(),
        );
        Ok(non_empty(output.item))
    }
}

impl<M: Model> IntoFuture for Get<M> {
    type Output = ClientResult<Option<M>>;
    type IntoFuture = OperationFuture<Option<M>>;

    fn into_future(self) -> Self::IntoFuture {
        self.send().boxed()
    }
}
