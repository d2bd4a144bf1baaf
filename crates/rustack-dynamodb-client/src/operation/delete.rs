use std::future::IntoFuture;
use std::marker::PhantomData;

use futures::FutureExt;
use rustack_dynamodb_model::input::DeleteItemInput;
use rustack_dynamodb_model::types::ReturnValue;
use rustack_dynamodb_model::{DynamoDBOperation, Item, Key};

use super::{
    Clause, Group, OperationFuture, ScopeOwner, check_whole_item, clause::nest, non_empty,
};
use crate::client::{Client, log_collection_metrics, log_consumed_capacity};
use crate::error::ClientResult;
use crate::expression::{Bucket, Logic, LogicScope};
use crate::model::Model;

/// Conditional delete of one item.
///
/// Resolves to the deleted item (`ReturnValues=ALL_OLD`), `None` when nothing
/// was stored under the key.
#[derive(Debug)]
pub struct Delete<M> {
    client: Client,
    key: Key,
    scope: LogicScope,
    return_values: ReturnValue,
    quiet: bool,
    _model: PhantomData<fn() -> M>,
}

impl<M> ScopeOwner for Delete<M> {
    fn scope_mut(&mut self) -> &mut LogicScope {
        &mut self.scope
    }
}

impl<M: Model> Delete<M> {
    pub(crate) fn new(client: Client, key: Key) -> Self {
        Self {
            client,
            key,
            scope: LogicScope::new(),
            return_values: ReturnValue::AllOld,
            quiet: false,
            _model: PhantomData,
        }
    }

    /// Add a write condition on `path`, combined with `AND`.
    pub fn condition(self, path: impl Into<String>) -> Clause<Self> {
        Clause::new(self, Bucket::Condition, path)
    }

    /// Add a nested `AND` condition group.
    #[must_use]
    pub fn condition_and(mut self, build: impl FnOnce(Group) -> Group) -> Self {
        nest(&mut self.scope, Bucket::Condition, Logic::And, build);
        self
    }

    /// Add a nested `OR` condition group.
    #[must_use]
    pub fn condition_or(mut self, build: impl FnOnce(Group) -> Group) -> Self {
        nest(&mut self.scope, Bucket::Condition, Logic::Or, build);
        self
    }

    /// Add a nested `NOT (...)` condition group.
    #[must_use]
    pub fn condition_not(mut self, build: impl FnOnce(Group) -> Group) -> Self {
        nest(&mut self.scope, Bucket::Condition, Logic::Not, build);
        self
    }

    /// Choose what the store returns.
    #[must_use]
    pub fn return_values(mut self, return_values: ReturnValue) -> Self {
        self.return_values = return_values;
        self
    }

    /// Return nothing and request no capacity or metrics.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self.return_values = ReturnValue::None;
        self
    }

    /// The request this builder sends.
    pub fn to_input(&self) -> ClientResult<DeleteItemInput> {
        let compiled = self.scope.compile()?;
        Ok(DeleteItemInput {
            table_name: self.client.table_name::<M>(),
            key: self.key.clone(),
            condition_expression: compiled.expression(Bucket::Condition),
            expression_attribute_names: compiled.names(),
            expression_attribute_values: compiled.values(),
            return_values: (self.return_values != ReturnValue::None).then_some(self.return_values),
            return_consumed_capacity: self.client.consumed_capacity(self.quiet),
            return_item_collection_metrics: self.client.collection_metrics(self.quiet),
        })
    }

    /// The request as DynamoDB JSON.
    pub fn to_json(&self) -> ClientResult<serde_json::Value> {
        Ok(serde_json::to_value(self.to_input()?)?)
    }

    /// Send the request and hydrate the returned item.
    ///
    /// Fails with [`crate::ClientError::InvalidParameter`] before sending when the
    /// return policy yields a partial item; use [`Self::send_item`] for those.
    pub async fn send(self) -> ClientResult<Option<M>> {
        check_whole_item(self.return_values)?;
        self.send_item().await?.map(M::from_item).transpose()
    }

    /// Send the request and return the raw attributes, whatever the return
    /// policy.
    pub async fn send_item(self) -> ClientResult<Option<Item>> {
        let input = self.to_input()?;
        let output = self.client.transport().delete_item(input).await?;
        log_consumed_capacity(
            DynamoDBOperation::DeleteItem,
            output.consumed_capacity.as_ref(),
        );
        log_collection_metrics(
            DynamoDBOperation::DeleteItem,
            output.item_collection_metrics.as_ref(),
        );
        Ok(non_empty(Some(output.attributes)))
    }
}

impl<M: Model> IntoFuture for Delete<M> {
    type Output = ClientResult<Option<M>>;
    type IntoFuture = OperationFuture<Option<M>>;

    fn into_future(self) -> Self::IntoFuture {
        self.send().boxed()
    }
}
